//! Mutable node state.

use std::collections::HashSet;
use std::sync::Weak;

use parking_lot::{Mutex, RwLock};
use warren_types::{ChildEntry, Name, NodeId};

use crate::listener::NodeStateListener;
use crate::ItemStatus;

/// The aggregate state of one node: parent link, ordered child entries,
/// property names and the shared-parent set.
///
/// All mutation goes through the structural operations below; each fires the
/// corresponding listener event. A state carries at most one listener,
/// held weakly so a dropped subscriber never keeps firing.
#[derive(Debug)]
pub struct NodeState {
    id: NodeId,
    primary_type: Name,
    data: RwLock<NodeData>,
    listener: Mutex<Option<Weak<dyn NodeStateListener>>>,
}

#[derive(Debug)]
struct NodeData {
    parent_id: Option<NodeId>,
    status: ItemStatus,
    child_entries: Vec<ChildEntry>,
    property_names: HashSet<Name>,
    shared_set: Vec<NodeId>,
    mod_count: u32,
}

impl NodeState {
    pub fn new(
        id: NodeId,
        primary_type: Name,
        parent_id: Option<NodeId>,
        status: ItemStatus,
    ) -> Self {
        Self {
            id,
            primary_type,
            data: RwLock::new(NodeData {
                parent_id,
                status,
                child_entries: Vec::new(),
                property_names: HashSet::new(),
                shared_set: Vec::new(),
                mod_count: 0,
            }),
            listener: Mutex::new(None),
        }
    }

    #[inline]
    pub fn node_id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn primary_type(&self) -> &Name {
        &self.primary_type
    }

    pub fn parent_id(&self) -> Option<NodeId> {
        self.data.read().parent_id
    }

    pub fn status(&self) -> ItemStatus {
        self.data.read().status
    }

    pub fn set_status(&self, status: ItemStatus) {
        self.data.write().status = status;
    }

    pub fn mod_count(&self) -> u32 {
        self.data.read().mod_count
    }

    pub fn set_mod_count(&self, mod_count: u32) {
        self.data.write().mod_count = mod_count;
    }

    // ------------------------------------------------------------- listener

    /// Register `listener` as the single structural listener, replacing any
    /// previous one.
    pub fn set_listener(&self, listener: Weak<dyn NodeStateListener>) {
        *self.listener.lock() = Some(listener);
    }

    pub fn clear_listener(&self) {
        *self.listener.lock() = None;
    }

    fn notify(&self, event: impl FnOnce(&dyn NodeStateListener)) {
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener.and_then(|weak| weak.upgrade()) {
            event(listener.as_ref());
        }
    }

    // ------------------------------------------------------- child entries

    /// Snapshot of the ordered child entry list.
    pub fn child_node_entries(&self) -> Vec<ChildEntry> {
        self.data.read().child_entries.clone()
    }

    /// Look up a child entry by name and 1-based same-name-sibling index.
    pub fn child_node_entry(&self, name: &Name, index: u32) -> Option<ChildEntry> {
        let data = self.data.read();
        let mut seen = 0;
        for entry in &data.child_entries {
            if entry.name == *name {
                seen += 1;
                if seen == index {
                    return Some(entry.clone());
                }
            }
        }
        None
    }

    /// Look up a child entry by child id, returning the entry and its
    /// 1-based same-name-sibling index.
    pub fn child_node_entry_by_id(&self, id: NodeId) -> Option<(ChildEntry, u32)> {
        let data = self.data.read();
        data.child_entries
            .iter()
            .position(|entry| entry.id == id)
            .map(|pos| {
                let entry = data.child_entries[pos].clone();
                let index = sns_index(&data.child_entries, pos);
                (entry, index)
            })
    }

    /// Append a child entry and fire `node_added` with its SNS index.
    pub fn add_child_node_entry(&self, name: Name, id: NodeId) -> u32 {
        let index = {
            let mut data = self.data.write();
            data.child_entries.push(ChildEntry::new(name.clone(), id));
            data.touch();
            data.child_entries
                .iter()
                .filter(|entry| entry.name == name)
                .count() as u32
        };
        self.notify(|l| l.node_added(self, &name, index, id));
        index
    }

    /// Remove the child entry for `id` and fire `node_removed`.
    pub fn remove_child_node_entry_by_id(&self, id: NodeId) -> bool {
        let removed = {
            let mut data = self.data.write();
            data.child_entries
                .iter()
                .position(|entry| entry.id == id)
                .map(|pos| {
                    let index = sns_index(&data.child_entries, pos);
                    let entry = data.child_entries.remove(pos);
                    data.touch();
                    (entry, index)
                })
        };
        match removed {
            Some((entry, index)) => {
                self.notify(|l| l.node_removed(self, &entry.name, index, entry.id));
                true
            }
            None => false,
        }
    }

    /// Remove the child entry addressed by name and SNS index and fire
    /// `node_removed`.
    pub fn remove_child_node_entry(&self, name: &Name, index: u32) -> bool {
        let removed = {
            let mut data = self.data.write();
            position_of(&data.child_entries, name, index).map(|pos| {
                let entry = data.child_entries.remove(pos);
                data.touch();
                entry
            })
        };
        match removed {
            Some(entry) => {
                self.notify(|l| l.node_removed(self, &entry.name, index, entry.id));
                true
            }
            None => false,
        }
    }

    /// Rename the child entry addressed by `(old_name, index)` in place.
    ///
    /// Expressed as removal plus re-addition of the same child id at the
    /// same list position; fires `node_removed` then `node_added`. Same-name
    /// siblings of the old name renumber as for any removal.
    pub fn rename_child_node_entry(&self, old_name: &Name, index: u32, new_name: Name) -> bool {
        let renamed = {
            let mut data = self.data.write();
            position_of(&data.child_entries, old_name, index).map(|pos| {
                let id = data.child_entries[pos].id;
                data.child_entries[pos] = ChildEntry::new(new_name.clone(), id);
                data.touch();
                let new_index = sns_index(&data.child_entries, pos);
                (id, new_index)
            })
        };
        match renamed {
            Some((id, new_index)) => {
                self.notify(|l| l.node_removed(self, old_name, index, id));
                self.notify(|l| l.node_added(self, &new_name, new_index, id));
                true
            }
            None => false,
        }
    }

    /// Replace the child entry list wholesale (reorder) and fire
    /// `nodes_replaced`.
    pub fn set_child_node_entries(&self, entries: Vec<ChildEntry>) {
        {
            let mut data = self.data.write();
            data.child_entries = entries;
            data.touch();
        }
        self.notify(|l| l.nodes_replaced(self));
    }

    // ------------------------------------------------------------- parents

    pub fn set_parent_id(&self, parent_id: Option<NodeId>) {
        {
            let mut data = self.data.write();
            data.parent_id = parent_id;
            data.touch();
        }
        self.notify(|l| l.node_modified(self));
    }

    /// Whether this node participates in more than one parent.
    pub fn is_shareable(&self) -> bool {
        !self.data.read().shared_set.is_empty()
    }

    pub fn shared_set(&self) -> Vec<NodeId> {
        self.data.read().shared_set.clone()
    }

    pub fn contains_share(&self, parent_id: NodeId) -> bool {
        self.data.read().shared_set.contains(&parent_id)
    }

    /// Add `parent_id` to the shared set. Returns false if already present.
    pub fn add_share(&self, parent_id: NodeId) -> bool {
        let added = {
            let mut data = self.data.write();
            if data.shared_set.contains(&parent_id) {
                false
            } else {
                data.shared_set.push(parent_id);
                data.touch();
                true
            }
        };
        if added {
            self.notify(|l| l.node_modified(self));
        }
        added
    }

    /// Remove `parent_id` from the shared set; returns the number of shares
    /// remaining.
    pub fn remove_share(&self, parent_id: NodeId) -> usize {
        let remaining = {
            let mut data = self.data.write();
            data.shared_set.retain(|id| *id != parent_id);
            data.touch();
            data.shared_set.len()
        };
        self.notify(|l| l.node_modified(self));
        remaining
    }

    // ---------------------------------------------------------- properties

    pub fn property_names(&self) -> Vec<Name> {
        self.data.read().property_names.iter().cloned().collect()
    }

    pub fn has_property_name(&self, name: &Name) -> bool {
        self.data.read().property_names.contains(name)
    }

    pub fn add_property_name(&self, name: Name) -> bool {
        let added = {
            let mut data = self.data.write();
            let added = data.property_names.insert(name);
            if added {
                data.touch();
            }
            added
        };
        if added {
            self.notify(|l| l.node_modified(self));
        }
        added
    }

    pub fn remove_property_name(&self, name: &Name) -> bool {
        let removed = {
            let mut data = self.data.write();
            let removed = data.property_names.remove(name);
            if removed {
                data.touch();
            }
            removed
        };
        if removed {
            self.notify(|l| l.node_modified(self));
        }
        removed
    }

    // ------------------------------------------------------------ disposal

    /// Announce that this state is leaving memory.
    pub fn discard(&self) {
        self.notify(|l| l.state_discarded(self));
        self.clear_listener();
    }
}

impl NodeData {
    fn touch(&mut self) {
        self.mod_count = self.mod_count.wrapping_add(1);
        if self.status == ItemStatus::Existing {
            self.status = ItemStatus::Modified;
        }
    }
}

/// 1-based index of the entry at `pos` among same-named siblings.
fn sns_index(entries: &[ChildEntry], pos: usize) -> u32 {
    let name = &entries[pos].name;
    entries[..pos]
        .iter()
        .filter(|entry| entry.name == *name)
        .count() as u32
        + 1
}

/// Position of the entry addressed by `(name, index)`.
fn position_of(entries: &[ChildEntry], name: &Name, index: u32) -> Option<usize> {
    let mut seen = 0;
    for (pos, entry) in entries.iter().enumerate() {
        if entry.name == *name {
            seen += 1;
            if seen == index {
                return Some(pos);
            }
        }
    }
    None
}
