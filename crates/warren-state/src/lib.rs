//! In-memory item states.
//!
//! Node and property states are shared (`Arc`) aggregates with interior
//! mutability. Parent and child links are identifier values, never ownership
//! edges, so shared (multi-parent) nodes and eviction stay well-defined.
//! Structural mutations notify the state's single registered listener; the
//! caching hierarchy manager subscribes through that contract.

pub mod listener;
pub mod node_state;
pub mod property_state;

pub use listener::NodeStateListener;
pub use node_state::NodeState;
pub use property_state::PropertyState;

use std::sync::Arc;

use warren_error::Result;
use warren_types::{ItemId, NodeId, PropertyId};

/// Lifecycle status of an item state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// Created in this session, not yet persisted.
    New,
    /// Persisted and unchanged.
    Existing,
    /// Persisted with uncommitted modifications.
    Modified,
    /// Marked for removal.
    Removed,
}

/// A node or property state handle.
#[derive(Debug, Clone)]
pub enum ItemState {
    Node(Arc<NodeState>),
    Property(Arc<PropertyState>),
}

impl ItemState {
    /// The identifier of the underlying item.
    pub fn id(&self) -> ItemId {
        match self {
            ItemState::Node(state) => ItemId::Node(state.node_id()),
            ItemState::Property(state) => ItemId::Property(state.property_id().clone()),
        }
    }

    /// The node state, if this is a node.
    pub fn as_node(&self) -> Option<&Arc<NodeState>> {
        match self {
            ItemState::Node(state) => Some(state),
            ItemState::Property(_) => None,
        }
    }

    /// The property state, if this is a property.
    pub fn as_property(&self) -> Option<&Arc<PropertyState>> {
        match self {
            ItemState::Node(_) => None,
            ItemState::Property(state) => Some(state),
        }
    }
}

/// Lookup of item states by identifier.
///
/// Implementations are expected to be thread-safe; the hierarchy manager
/// calls in from concurrent readers without holding its own lock.
pub trait ItemStateManager: Send + Sync {
    /// Fetch the state for `id`.
    ///
    /// Fails with `NoSuchItemState` when the item does not exist and
    /// `ItemState` for any other lookup failure.
    fn get_item_state(&self, id: &ItemId) -> Result<ItemState>;

    /// Whether a state for `id` exists.
    fn has_item_state(&self, id: &ItemId) -> bool;

    /// The REFERENCE properties pointing at `id`.
    fn get_node_references(&self, id: NodeId) -> Result<Vec<PropertyId>>;

    /// Whether any REFERENCE property points at `id`.
    fn has_node_references(&self, id: NodeId) -> bool;
}
