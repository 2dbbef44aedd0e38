//! Warren: a hierarchical, typed, versioned content repository core.
//!
//! This facade re-exports the public surface of the member crates:
//!
//! - [`types`] — identifiers, names, paths and typed values
//! - [`state`] — in-memory item states and the structural listener contract
//! - [`bundle`] — the binary node bundle codec and its blob stores
//! - [`hierarchy`] — the caching id ↔ path hierarchy manager
//! - [`privilege`] — the privilege definition registry
//!
//! The commonly used types are also re-exported at the crate root.

pub use warren_bundle as bundle;
pub use warren_error as error;
pub use warren_hierarchy as hierarchy;
pub use warren_privilege as privilege;
pub use warren_state as state;
pub use warren_types as types;

pub use warren_bundle::{BlobStore, BundleBinding, BundleReader, BundleWriter, NodeBundle};
pub use warren_error::{Result, WarrenError};
pub use warren_hierarchy::CachingHierarchyManager;
pub use warren_privilege::{PrivilegeDefinition, PrivilegeRegistry};
pub use warren_state::{ItemState, ItemStateManager, ItemStatus, NodeState, PropertyState};
pub use warren_types::{ItemId, Name, NodeId, Path, PropertyId, PropertyType, Value};
