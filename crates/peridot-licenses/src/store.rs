//! Persisted leaf and node records and the stores that hold them.
//!
//! Node records are content addressed: a [`NodeKey`] identifies at most one
//! record, so equal subexpressions share a single [`NodeId`]. Id 0 is the
//! sentinel standing in for "no child" and "no leaf".

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Stable identifier of a node record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// The reserved "not applicable" id used for absent children.
    pub const SENTINEL: Self = Self(0);

    /// Wrap a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Whether this is the sentinel.
    #[must_use]
    pub const fn is_sentinel(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier of a leaf record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeafId(u64);

impl LeafId {
    /// The reserved id carried by non-leaf node records.
    pub const NONE: Self = Self(0);

    /// Wrap a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LeafId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a node record, persisted as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum NodeKind {
    /// The id-0 placeholder record.
    Sentinel,
    /// A single license or exception leaf.
    Leaf,
    /// Conjunction.
    And,
    /// Disjunction.
    Or,
    /// License with exception.
    With,
    /// "Or later" applied to a leaf node.
    Plus,
}

impl NodeKind {
    /// The persisted integer code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Sentinel => 0,
            Self::Leaf => 1,
            Self::And => 2,
            Self::Or => 3,
            Self::With => 4,
            Self::Plus => 5,
        }
    }

    /// Lower-case name used in listings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sentinel => "sentinel",
            Self::Leaf => "leaf",
            Self::And => "and",
            Self::Or => "or",
            Self::With => "with",
            Self::Plus => "plus",
        }
    }
}

impl From<NodeKind> for u8 {
    fn from(kind: NodeKind) -> Self {
        kind.code()
    }
}

impl TryFrom<u8> for NodeKind {
    type Error = StoreError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Sentinel),
            1 => Ok(Self::Leaf),
            2 => Ok(Self::And),
            3 => Ok(Self::Or),
            4 => Ok(Self::With),
            5 => Ok(Self::Plus),
            other => Err(StoreError::UnknownNodeKind(other)),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a leaf identifier names, persisted as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum LeafKind {
    /// A license.
    License,
    /// A license exception, used on the right of `WITH`.
    Exception,
    /// An ad hoc identifier such as `LicenseRef-foo`.
    Custom,
}

impl LeafKind {
    /// The persisted integer code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::License => 1,
            Self::Exception => 2,
            Self::Custom => 3,
        }
    }
}

impl From<LeafKind> for u8 {
    fn from(kind: LeafKind) -> Self {
        kind.code()
    }
}

impl TryFrom<u8> for LeafKind {
    type Error = StoreError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::License),
            2 => Ok(Self::Exception),
            3 => Ok(Self::Custom),
            other => Err(StoreError::UnknownLeafKind(other)),
        }
    }
}

/// The structural contents that identify a node record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey {
    /// Record kind.
    pub kind: NodeKind,
    /// Left child, or the sentinel.
    pub left: NodeId,
    /// Right child, or the sentinel.
    pub right: NodeId,
    /// Referenced leaf, or [`LeafId::NONE`].
    pub leaf: LeafId,
}

impl NodeKey {
    const SENTINEL: Self = Self {
        kind: NodeKind::Sentinel,
        left: NodeId::SENTINEL,
        right: NodeId::SENTINEL,
        leaf: LeafId::NONE,
    };

    /// Key of the node wrapping `leaf`.
    #[must_use]
    pub const fn leaf(leaf: LeafId) -> Self {
        Self {
            kind: NodeKind::Leaf,
            left: NodeId::SENTINEL,
            right: NodeId::SENTINEL,
            leaf,
        }
    }

    /// Key of the "or later" node over `base`.
    #[must_use]
    pub const fn plus(base: NodeId) -> Self {
        Self {
            kind: NodeKind::Plus,
            left: base,
            right: NodeId::SENTINEL,
            leaf: LeafId::NONE,
        }
    }

    /// Key of a binary node.
    #[must_use]
    pub const fn compound(kind: NodeKind, left: NodeId, right: NodeId) -> Self {
        Self {
            kind,
            left,
            right,
            leaf: LeafId::NONE,
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(left {}, right {}, leaf {})",
            self.kind, self.left, self.right, self.leaf
        )
    }
}

/// A stored node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Stable id.
    pub id: NodeId,
    /// Record kind.
    pub kind: NodeKind,
    /// Left child, or the sentinel.
    pub left: NodeId,
    /// Right child, or the sentinel.
    pub right: NodeId,
    /// Referenced leaf, or [`LeafId::NONE`].
    pub leaf: LeafId,
}

impl NodeRecord {
    /// Pair `key` with its id.
    #[must_use]
    pub const fn new(id: NodeId, key: NodeKey) -> Self {
        Self {
            id,
            kind: key.kind,
            left: key.left,
            right: key.right,
            leaf: key.leaf,
        }
    }

    /// The content key of the record.
    #[must_use]
    pub const fn key(&self) -> NodeKey {
        NodeKey {
            kind: self.kind,
            left: self.left,
            right: self.right,
            leaf: self.leaf,
        }
    }
}

/// A stored license, exception or custom identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafRecord {
    /// Stable id.
    pub id: LeafId,
    /// Exact identifier as written in expressions.
    pub identifier: String,
    /// Full name.
    pub name: String,
    /// Whether the identifier comes from the SPDX lists.
    pub is_spdx: bool,
    /// What the identifier names.
    pub kind: LeafKind,
}

/// A leaf awaiting an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLeaf {
    /// Exact identifier as written in expressions.
    pub identifier: String,
    /// Full name.
    pub name: String,
    /// Whether the identifier comes from the SPDX lists.
    pub is_spdx: bool,
    /// What the identifier names.
    pub kind: LeafKind,
}

impl NewLeaf {
    /// An ad hoc, non-SPDX identifier named after itself.
    #[must_use]
    pub fn custom(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self {
            name: identifier.clone(),
            identifier,
            is_spdx: false,
            kind: LeafKind::Custom,
        }
    }
}

/// Errors raised by a [`LicenseStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the snapshot file failed.
    #[error("failed to access store file {path}: {source}")]
    Io {
        /// File being accessed.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The snapshot file could not be encoded or decoded.
    #[error("malformed store snapshot {path}: {source}")]
    Json {
        /// File being accessed.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// The snapshot is well-formed JSON but breaks a store invariant.
    #[error("invalid store snapshot: {0}")]
    InvalidSnapshot(String),
    /// A leaf with the same identifier already exists.
    #[error("leaf {identifier:?} already exists with id {existing}")]
    DuplicateLeaf {
        /// The repeated identifier.
        identifier: String,
        /// Id of the existing leaf.
        existing: LeafId,
    },
    /// A node with the same contents already exists.
    #[error("node {key} already exists with id {existing}")]
    DuplicateNode {
        /// The repeated contents.
        key: NodeKey,
        /// Id of the existing node.
        existing: NodeId,
    },
    /// The sentinel kind was offered for insertion.
    #[error("node kind {0} cannot be stored")]
    ReservedKind(NodeKind),
    /// A persisted node kind code is not known.
    #[error("unknown node kind code {0}")]
    UnknownNodeKind(u8),
    /// A persisted leaf kind code is not known.
    #[error("unknown leaf kind code {0}")]
    UnknownLeafKind(u8),
    /// Another thread panicked while holding the store.
    #[error("store lock poisoned by a panicking thread")]
    Poisoned,
}

/// Leaf and node storage used by the interner.
///
/// Implementations must give each [`NodeKey`] at most one record and must
/// never hand out id 0 for a real node or leaf.
pub trait LicenseStore {
    /// Id of the leaf with exactly this identifier.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the backing storage fails.
    fn leaf_id(&self, identifier: &str) -> Result<Option<LeafId>, StoreError>;

    /// The leaf stored under `id`.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the backing storage fails.
    fn leaf(&self, id: LeafId) -> Result<Option<LeafRecord>, StoreError>;

    /// Every leaf, in id order.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the backing storage fails.
    fn leaves(&self) -> Result<Vec<LeafRecord>, StoreError>;

    /// Store a new leaf and return its id.
    ///
    /// # Errors
    /// Returns [`StoreError::DuplicateLeaf`] when the identifier is taken.
    fn insert_leaf(&mut self, leaf: NewLeaf) -> Result<LeafId, StoreError>;

    /// Id of the node with these contents.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the backing storage fails.
    fn find_node(&self, key: &NodeKey) -> Result<Option<NodeId>, StoreError>;

    /// The node stored under `id`, including the sentinel.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the backing storage fails.
    fn node(&self, id: NodeId) -> Result<Option<NodeRecord>, StoreError>;

    /// Every real node, in id order.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the backing storage fails.
    fn nodes(&self) -> Result<Vec<NodeRecord>, StoreError>;

    /// Store a new node and return its id.
    ///
    /// # Errors
    /// Returns [`StoreError::DuplicateNode`] when a node with the same key
    /// exists, or [`StoreError::ReservedKind`] for the sentinel kind.
    fn insert_node(&mut self, key: NodeKey) -> Result<NodeId, StoreError>;

    /// Remove every leaf and node, keeping only the sentinel.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the backing storage fails.
    fn reset(&mut self) -> Result<(), StoreError>;
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    leaves: Vec<&'a LeafRecord>,
    nodes: Vec<&'a NodeRecord>,
}

#[derive(Deserialize)]
struct Snapshot {
    #[serde(default)]
    leaves: Vec<LeafRecord>,
    #[serde(default)]
    nodes: Vec<NodeRecord>,
}

/// In-memory [`LicenseStore`] with optional JSON snapshot persistence.
///
/// # Examples
/// ```
/// use peridot_licenses::{LicenseStore, MemoryStore, NewLeaf, NodeKey};
///
/// let mut store = MemoryStore::new();
/// let leaf = store.insert_leaf(NewLeaf::custom("LicenseRef-demo")).unwrap_or_else(|e| panic!("{e}"));
/// let node = store.insert_node(NodeKey::leaf(leaf)).unwrap_or_else(|e| panic!("{e}"));
/// assert_eq!(node.get(), 1);
/// assert!(store.insert_node(NodeKey::leaf(leaf)).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStore {
    leaves: BTreeMap<LeafId, LeafRecord>,
    leaf_index: HashMap<String, LeafId>,
    nodes: BTreeMap<NodeId, NodeRecord>,
    node_index: HashMap<NodeKey, NodeId>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a store holding only the sentinel node.
    #[must_use]
    pub fn new() -> Self {
        let sentinel = NodeRecord::new(NodeId::SENTINEL, NodeKey::SENTINEL);
        Self {
            leaves: BTreeMap::new(),
            leaf_index: HashMap::new(),
            nodes: BTreeMap::from([(NodeId::SENTINEL, sentinel)]),
            node_index: HashMap::from([(NodeKey::SENTINEL, NodeId::SENTINEL)]),
        }
    }

    /// Load the snapshot at `path`, or start empty when the file is absent.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the file exists but cannot be read or
    /// holds an invalid snapshot.
    pub fn open(path: &Utf8Path) -> Result<Self, StoreError> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_json(path, &text),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("no store snapshot at {path}; starting empty");
                Ok(Self::new())
            }
            Err(source) => Err(StoreError::Io {
                path: path.to_owned(),
                source,
            }),
        }
    }

    /// Load the snapshot at `path`.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the file cannot be read or holds an
    /// invalid snapshot.
    pub fn load(path: &Utf8Path) -> Result<Self, StoreError> {
        let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json(path, &text)
    }

    /// Atomically replace the snapshot at `path` with the current contents.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the temporary file cannot be written or
    /// moved into place.
    pub fn save(&self, path: &Utf8Path) -> Result<(), StoreError> {
        let io_error = |source: io::Error| StoreError::Io {
            path: path.to_owned(),
            source,
        };
        let dir = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let mut file = NamedTempFile::new_in(dir).map_err(io_error)?;
        serde_json::to_writer_pretty(&mut file, &self.snapshot()).map_err(|source| {
            StoreError::Json {
                path: path.to_owned(),
                source,
            }
        })?;
        file.write_all(b"\n").map_err(io_error)?;
        file.as_file().sync_all().map_err(io_error)?;
        file.persist(path).map_err(|err| io_error(err.error))?;
        log::debug!(
            "saved {} leaves and {} nodes to {path}",
            self.leaves.len(),
            self.nodes.len() - 1
        );
        Ok(())
    }

    fn snapshot(&self) -> SnapshotRef<'_> {
        SnapshotRef {
            leaves: self.leaves.values().collect(),
            nodes: self
                .nodes
                .values()
                .filter(|node| !node.id.is_sentinel())
                .collect(),
        }
    }

    fn from_json(path: &Utf8Path, text: &str) -> Result<Self, StoreError> {
        let snapshot: Snapshot = serde_json::from_str(text).map_err(|source| StoreError::Json {
            path: path.to_owned(),
            source,
        })?;
        Self::restore(snapshot)
    }

    fn restore(snapshot: Snapshot) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for leaf in snapshot.leaves {
            if leaf.id == LeafId::NONE || store.leaves.contains_key(&leaf.id) {
                return Err(StoreError::InvalidSnapshot(format!(
                    "leaf id {} is reserved or repeated",
                    leaf.id
                )));
            }
            store.add_leaf(leaf)?;
        }
        for node in snapshot.nodes {
            if node.id.is_sentinel() || store.nodes.contains_key(&node.id) {
                return Err(StoreError::InvalidSnapshot(format!(
                    "node id {} is reserved or repeated",
                    node.id
                )));
            }
            // Children always predate their parent, which rules out cycles.
            if node.left >= node.id || node.right >= node.id {
                return Err(StoreError::InvalidSnapshot(format!(
                    "node {} references a child that is not older than itself",
                    node.id
                )));
            }
            store.add_node(node)?;
        }
        Ok(store)
    }

    fn next_leaf_id(&self) -> LeafId {
        LeafId(self.leaves.last_key_value().map_or(1, |(id, _)| id.0 + 1))
    }

    fn next_node_id(&self) -> NodeId {
        NodeId(self.nodes.last_key_value().map_or(1, |(id, _)| id.0 + 1))
    }

    fn add_leaf(&mut self, leaf: LeafRecord) -> Result<(), StoreError> {
        if let Some(&existing) = self.leaf_index.get(&leaf.identifier) {
            return Err(StoreError::DuplicateLeaf {
                identifier: leaf.identifier,
                existing,
            });
        }
        self.leaf_index.insert(leaf.identifier.clone(), leaf.id);
        self.leaves.insert(leaf.id, leaf);
        Ok(())
    }

    fn add_node(&mut self, node: NodeRecord) -> Result<(), StoreError> {
        let key = node.key();
        if key.kind == NodeKind::Sentinel {
            return Err(StoreError::ReservedKind(key.kind));
        }
        if let Some(&existing) = self.node_index.get(&key) {
            return Err(StoreError::DuplicateNode { key, existing });
        }
        self.node_index.insert(key, node.id);
        self.nodes.insert(node.id, node);
        Ok(())
    }
}

impl LicenseStore for MemoryStore {
    fn leaf_id(&self, identifier: &str) -> Result<Option<LeafId>, StoreError> {
        Ok(self.leaf_index.get(identifier).copied())
    }

    fn leaf(&self, id: LeafId) -> Result<Option<LeafRecord>, StoreError> {
        Ok(self.leaves.get(&id).cloned())
    }

    fn leaves(&self) -> Result<Vec<LeafRecord>, StoreError> {
        Ok(self.leaves.values().cloned().collect())
    }

    fn insert_leaf(&mut self, leaf: NewLeaf) -> Result<LeafId, StoreError> {
        let id = self.next_leaf_id();
        self.add_leaf(LeafRecord {
            id,
            identifier: leaf.identifier,
            name: leaf.name,
            is_spdx: leaf.is_spdx,
            kind: leaf.kind,
        })?;
        Ok(id)
    }

    fn find_node(&self, key: &NodeKey) -> Result<Option<NodeId>, StoreError> {
        Ok(self.node_index.get(key).copied())
    }

    fn node(&self, id: NodeId) -> Result<Option<NodeRecord>, StoreError> {
        Ok(self.nodes.get(&id).copied())
    }

    fn nodes(&self) -> Result<Vec<NodeRecord>, StoreError> {
        Ok(self
            .nodes
            .values()
            .filter(|node| !node.id.is_sentinel())
            .copied()
            .collect())
    }

    fn insert_node(&mut self, key: NodeKey) -> Result<NodeId, StoreError> {
        let id = self.next_node_id();
        self.add_node(NodeRecord::new(id, key))?;
        log::debug!("stored node {id} as {key}");
        Ok(id)
    }

    fn reset(&mut self) -> Result<(), StoreError> {
        log::info!(
            "resetting store holding {} leaves and {} nodes",
            self.leaves.len(),
            self.nodes.len() - 1
        );
        *self = Self::new();
        Ok(())
    }
}
