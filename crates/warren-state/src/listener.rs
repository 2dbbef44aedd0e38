//! Structural mutation events.

use warren_types::{Name, NodeId};

use crate::node_state::NodeState;

/// Receiver of structural events from a subscribed [`NodeState`].
///
/// Events are delivered synchronously by the mutating call, after the
/// state's data lock has been released; a callback may therefore read the
/// source state. Callbacks must not panic and must not call back into
/// mutation operations of the source.
pub trait NodeStateListener: Send + Sync {
    /// A child entry was added at the given 1-based same-name-sibling index.
    fn node_added(&self, state: &NodeState, name: &Name, index: u32, id: NodeId);

    /// The state changed in a way not covered by the structural events.
    fn node_modified(&self, state: &NodeState);

    /// The child entry list was replaced wholesale (reorder). Same-name
    /// sibling indexes must be recomputed.
    fn nodes_replaced(&self, state: &NodeState);

    /// A child entry was removed. Surviving higher same-name-sibling indexes
    /// shift down by one.
    fn node_removed(&self, state: &NodeState, name: &Name, index: u32, id: NodeId);

    /// The state is being removed from memory.
    fn state_discarded(&self, state: &NodeState);
}
