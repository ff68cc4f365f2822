//! Content-addressed storage for peridot license expressions.
//!
//! Expressions parsed by `peridot-expr` are interned into a
//! [`LicenseStore`]: every distinct subexpression becomes one node record
//! and every identifier refers to a leaf provisioned from the SPDX license
//! list or added as a custom entry.

mod intern;
mod license_list;
mod store;

pub use intern::{
    InternError, SharedInterner, expression_for_node, find_new_leaves_needed, intern_node,
    provision_custom_leaves,
};
pub use license_list::{
    EXCEPTIONS_FILE, LICENSES_FILE, LicenseList, LicenseListError, SpdxException, SpdxLicense,
    provision_license_list,
};
pub use store::{
    LeafId, LeafKind, LeafRecord, LicenseStore, MemoryStore, NewLeaf, NodeId, NodeKey, NodeKind,
    NodeRecord, StoreError,
};
