//! Mapping expression trees onto shared, content-addressed node records.
//!
//! Interning resolves children before their parent and reuses any record
//! with matching contents, so every distinct subexpression is stored once
//! no matter how many expressions mention it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use peridot_expr::{ExprNode, MAX_DEPTH, NodeType, Operator};
use thiserror::Error;

use crate::store::{LeafId, LicenseStore, NewLeaf, NodeId, NodeKey, NodeKind, StoreError};

/// Errors raised while interning or rebuilding expressions.
#[derive(Debug, Error)]
pub enum InternError {
    /// An identifier has no leaf; provision it and retry.
    #[error("no leaf provisioned for license identifier {identifier:?}")]
    LeafNotFound {
        /// The unresolved identifier.
        identifier: String,
    },
    /// No record exists under the requested id.
    #[error("no node stored under id {id}")]
    NodeNotFound {
        /// The requested id.
        id: NodeId,
    },
    /// A stored record does not describe a valid expression.
    #[error("node {id} is malformed: {reason}")]
    MalformedNode {
        /// The offending record.
        id: NodeId,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Intern `node` and all its subexpressions, returning the root's id.
///
/// Every identifier is resolved to a leaf before anything is inserted, so a
/// missing leaf leaves the store untouched.
///
/// # Errors
/// Returns [`InternError::LeafNotFound`] for the first identifier, in sorted
/// order, that has no leaf, or [`InternError::Store`] when the store fails.
///
/// # Examples
/// ```
/// use peridot_licenses::{intern_node, LicenseStore, MemoryStore, NewLeaf};
///
/// let mut store = MemoryStore::new();
/// for id in ["MIT", "Zlib"] {
///     store.insert_leaf(NewLeaf::custom(id)).unwrap_or_else(|e| panic!("{e}"));
/// }
/// let node: peridot_expr::ExprNode = "MIT OR Zlib".parse().unwrap_or_else(|e| panic!("{e}"));
/// let first = intern_node(&mut store, &node).unwrap_or_else(|e| panic!("{e}"));
/// let again = intern_node(&mut store, &node).unwrap_or_else(|e| panic!("{e}"));
/// assert_eq!(first, again);
/// ```
pub fn intern_node<S>(store: &mut S, node: &ExprNode) -> Result<NodeId, InternError>
where
    S: LicenseStore + ?Sized,
{
    let mut leaves = BTreeMap::new();
    for identifier in node.identifiers() {
        let leaf = store
            .leaf_id(identifier)?
            .ok_or_else(|| InternError::LeafNotFound {
                identifier: identifier.to_owned(),
            })?;
        leaves.insert(identifier, leaf);
    }
    intern_resolved(store, node, &leaves)
}

fn intern_resolved<S>(
    store: &mut S,
    node: &ExprNode,
    leaves: &BTreeMap<&str, LeafId>,
) -> Result<NodeId, InternError>
where
    S: LicenseStore + ?Sized,
{
    let key = match node.node_type() {
        NodeType::Identifier => {
            let leaf = leaves
                .get(node.expression())
                .copied()
                .ok_or_else(|| InternError::LeafNotFound {
                    identifier: node.expression().to_owned(),
                })?;
            NodeKey::leaf(leaf)
        }
        NodeType::Plus => NodeKey::plus(intern_resolved(store, operand(node.left()), leaves)?),
        NodeType::And | NodeType::Or | NodeType::With => {
            let left = intern_resolved(store, operand(node.left()), leaves)?;
            let right = intern_resolved(store, operand(node.right()), leaves)?;
            NodeKey::compound(kind_for(node.node_type()), left, right)
        }
    };
    match store.find_node(&key)? {
        Some(id) => Ok(id),
        None => Ok(store.insert_node(key)?),
    }
}

fn operand(child: Option<&ExprNode>) -> &ExprNode {
    child.unwrap_or_else(|| unreachable!("ExprNode constructors always supply operands"))
}

fn kind_for(node_type: NodeType) -> NodeKind {
    match node_type {
        NodeType::Identifier => NodeKind::Leaf,
        NodeType::And => NodeKind::And,
        NodeType::Or => NodeKind::Or,
        NodeType::With => NodeKind::With,
        NodeType::Plus => NodeKind::Plus,
    }
}

/// Identifiers in `node` that have no leaf yet, sorted.
///
/// # Errors
/// Returns [`StoreError`] when a leaf lookup fails.
pub fn find_new_leaves_needed<S>(store: &S, node: &ExprNode) -> Result<BTreeSet<String>, StoreError>
where
    S: LicenseStore + ?Sized,
{
    let mut needed = BTreeSet::new();
    for identifier in node.identifiers() {
        if store.leaf_id(identifier)?.is_none() {
            needed.insert(identifier.to_owned());
        }
    }
    Ok(needed)
}

/// Insert non-SPDX custom leaves for any of `identifiers` not yet stored.
///
/// Returns how many leaves were inserted.
///
/// # Errors
/// Returns [`StoreError`] when a lookup or insert fails.
pub fn provision_custom_leaves<'a, S, I>(store: &mut S, identifiers: I) -> Result<usize, StoreError>
where
    S: LicenseStore + ?Sized,
    I: IntoIterator<Item = &'a str>,
{
    let mut inserted = 0;
    for identifier in identifiers {
        if store.leaf_id(identifier)?.is_none() {
            let id = store.insert_leaf(NewLeaf::custom(identifier))?;
            log::info!("provisioned custom leaf {id} for {identifier:?}");
            inserted += 1;
        }
    }
    Ok(inserted)
}

/// Rebuild the expression stored under `id`.
///
/// # Errors
/// Returns [`InternError::NodeNotFound`] for unknown ids and
/// [`InternError::MalformedNode`] when a record cannot form an expression,
/// including chains deeper than [`MAX_DEPTH`] that only a hand-edited
/// snapshot can hold.
pub fn expression_for_node<S>(store: &S, id: NodeId) -> Result<ExprNode, InternError>
where
    S: LicenseStore + ?Sized,
{
    rebuild(store, id, 1)
}

fn rebuild<S>(store: &S, id: NodeId, depth: usize) -> Result<ExprNode, InternError>
where
    S: LicenseStore + ?Sized,
{
    let record = store.node(id)?.ok_or(InternError::NodeNotFound { id })?;
    let malformed = |reason| InternError::MalformedNode { id, reason };
    if depth > MAX_DEPTH {
        return Err(malformed("nests deeper than a parsed expression can"));
    }
    let binary = |op: Operator| -> Result<ExprNode, InternError> {
        let left = rebuild(store, record.left, depth + 1)?;
        let right = rebuild(store, record.right, depth + 1)?;
        Ok(ExprNode::binary(op, left, right))
    };
    match record.kind {
        NodeKind::Sentinel => Err(malformed("the sentinel is not an expression")),
        NodeKind::Leaf => {
            let leaf = store
                .leaf(record.leaf)?
                .ok_or_else(|| malformed("references a missing leaf"))?;
            Ok(ExprNode::identifier(leaf.identifier))
        }
        NodeKind::Plus => {
            let base = rebuild(store, record.left, depth)?;
            if base.node_type() == NodeType::Identifier {
                Ok(ExprNode::plus(base.expression()))
            } else {
                Err(malformed("plus must wrap a leaf node"))
            }
        }
        NodeKind::And => binary(Operator::And),
        NodeKind::Or => binary(Operator::Or),
        NodeKind::With => binary(Operator::With),
    }
}

/// A store guarded so that each top-level intern runs alone.
///
/// Holding the lock across the whole look-up-then-insert walk stops two
/// callers from both inserting the same novel subexpression.
#[derive(Debug, Default)]
pub struct SharedInterner<S> {
    store: Mutex<S>,
}

impl<S: LicenseStore> SharedInterner<S> {
    /// Wrap `store`.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    /// Intern `node` while holding the store lock.
    ///
    /// # Errors
    /// Returns [`InternError`] as [`intern_node`] does, or
    /// [`StoreError::Poisoned`] when a previous holder panicked.
    pub fn intern(&self, node: &ExprNode) -> Result<NodeId, InternError> {
        let mut store = self.lock()?;
        intern_node(&mut *store, node)
    }

    /// Run `f` with exclusive access to the store.
    ///
    /// # Errors
    /// Returns [`StoreError::Poisoned`] when a previous holder panicked.
    pub fn with_store<T>(&self, f: impl FnOnce(&mut S) -> T) -> Result<T, StoreError> {
        let mut store = self.lock()?;
        Ok(f(&mut *store))
    }

    /// Unwrap the store.
    ///
    /// # Errors
    /// Returns [`StoreError::Poisoned`] when a previous holder panicked.
    pub fn into_inner(self) -> Result<S, StoreError> {
        self.store.into_inner().map_err(|_| StoreError::Poisoned)
    }

    fn lock(&self) -> Result<MutexGuard<'_, S>, StoreError> {
        self.store.lock().map_err(|_| StoreError::Poisoned)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests exercise interning fallibility")]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::store::MemoryStore;

    #[fixture]
    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        provision_custom_leaves(&mut store, ["MIT", "Zlib", "GPL-2.0", "Classpath-exception-2.0"])
            .unwrap();
        store
    }

    fn expr(text: &str) -> ExprNode {
        text.parse().unwrap()
    }

    #[rstest]
    fn leaf_nodes_reference_their_leaf(mut store: MemoryStore) {
        let id = intern_node(&mut store, &expr("Zlib")).unwrap();
        let record = store.node(id).unwrap().unwrap();
        assert_eq!(record.kind, NodeKind::Leaf);
        assert_eq!(record.leaf, store.leaf_id("Zlib").unwrap().unwrap());
        assert_eq!(record.left, NodeId::SENTINEL);
    }

    #[rstest]
    fn plus_wraps_the_leaf_node(mut store: MemoryStore) {
        let plus = intern_node(&mut store, &expr("GPL-2.0+")).unwrap();
        let base = intern_node(&mut store, &expr("GPL-2.0")).unwrap();
        let record = store.node(plus).unwrap().unwrap();
        assert_eq!(record.key(), NodeKey::plus(base));
        assert_eq!(store.nodes().unwrap().len(), 2);
    }

    #[rstest]
    #[case("MIT")]
    #[case("GPL-2.0+ WITH Classpath-exception-2.0")]
    #[case("MIT AND (Zlib OR GPL-2.0+)")]
    fn rebuilds_interned_expressions(mut store: MemoryStore, #[case] text: &str) {
        let node = expr(text);
        let id = intern_node(&mut store, &node).unwrap();
        assert_eq!(expression_for_node(&store, id).unwrap(), node);
    }

    #[rstest]
    fn reports_missing_leaves_in_order(store: MemoryStore) {
        let needed =
            find_new_leaves_needed(&store, &expr("X11 OR (MIT AND LicenseRef-b AND X11)")).unwrap();
        let needed: Vec<_> = needed.into_iter().collect();
        assert_eq!(needed, vec!["LicenseRef-b", "X11"]);
    }

    #[rstest]
    fn provisioning_skips_known_identifiers(mut store: MemoryStore) {
        let inserted = provision_custom_leaves(&mut store, ["MIT", "X11", "X11"]).unwrap();
        assert_eq!(inserted, 1);
        let leaf = store.leaf(store.leaf_id("X11").unwrap().unwrap()).unwrap().unwrap();
        assert!(!leaf.is_spdx);
    }

    #[test]
    fn unknown_node_id_is_reported() {
        let store = MemoryStore::new();
        let err = expression_for_node(&store, NodeId::new(42)).unwrap_err();
        assert!(matches!(err, InternError::NodeNotFound { id } if id.get() == 42));
    }

    #[test]
    fn sentinel_is_not_an_expression() {
        let store = MemoryStore::new();
        let err = expression_for_node(&store, NodeId::SENTINEL).unwrap_err();
        assert!(matches!(err, InternError::MalformedNode { .. }));
    }

    #[rstest]
    fn plus_over_compound_record_is_malformed(mut store: MemoryStore) {
        let or = intern_node(&mut store, &expr("MIT OR Zlib")).unwrap();
        let bogus = store.insert_node(NodeKey::plus(or)).unwrap();
        let err = expression_for_node(&store, bogus).unwrap_err();
        assert!(matches!(err, InternError::MalformedNode { id, .. } if id == bogus));
    }

    fn and_chain(store: &mut MemoryStore, operators: usize) -> NodeId {
        let mit = intern_node(store, &expr("MIT")).unwrap();
        let mut top = mit;
        for _ in 0..operators {
            top = store
                .insert_node(NodeKey::compound(NodeKind::And, top, mit))
                .unwrap();
        }
        top
    }

    #[rstest]
    fn rebuilds_chains_at_the_depth_limit(mut store: MemoryStore) {
        let top = and_chain(&mut store, MAX_DEPTH - 1);
        let node = expression_for_node(&store, top).unwrap();
        assert!(node.expression().starts_with("MIT AND MIT"));
    }

    #[rstest]
    fn refuses_chains_past_the_depth_limit(mut store: MemoryStore) {
        let top = and_chain(&mut store, MAX_DEPTH);
        let err = expression_for_node(&store, top).unwrap_err();
        assert!(matches!(err, InternError::MalformedNode { .. }), "{err}");
    }
}
