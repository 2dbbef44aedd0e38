//! The codec-level view of one node.

use warren_types::{ChildEntry, Name, NodeId, PropertyId, PropertyType, Value};

/// One serialized property: type, flags and values, plus the blob ids of
/// values that have been offloaded to the blob store.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyEntry {
    id: PropertyId,
    property_type: PropertyType,
    multi_valued: bool,
    mod_count: u32,
    values: Vec<Value>,
    blob_ids: Vec<Option<String>>,
}

impl PropertyEntry {
    pub fn new(id: PropertyId, property_type: PropertyType, multi_valued: bool) -> Self {
        Self {
            id,
            property_type,
            multi_valued,
            mod_count: 0,
            values: Vec::new(),
            blob_ids: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> &PropertyId {
        &self.id
    }

    #[inline]
    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    #[inline]
    pub fn is_multi_valued(&self) -> bool {
        self.multi_valued
    }

    #[inline]
    pub fn mod_count(&self) -> u32 {
        self.mod_count
    }

    pub fn set_mod_count(&mut self, mod_count: u32) {
        self.mod_count = mod_count;
    }

    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, index: usize) -> &Value {
        &self.values[index]
    }

    /// Replace the values; the blob id list is resized to match.
    pub fn set_values(&mut self, values: Vec<Value>) {
        self.blob_ids = vec![None; values.len()];
        self.values = values;
    }

    /// Replace a single value in place, keeping its blob id slot.
    pub fn replace_value(&mut self, index: usize, value: Value) {
        self.values[index] = value;
    }

    /// The inline payload of value `index`, if it is an inline binary.
    pub fn inline_binary(&self, index: usize) -> Option<&[u8]> {
        match &self.values[index] {
            Value::Binary(warren_types::BinaryValue::Inline(data)) => Some(data),
            _ => None,
        }
    }

    pub fn blob_id(&self, index: usize) -> Option<&str> {
        self.blob_ids.get(index).and_then(|id| id.as_deref())
    }

    pub fn set_blob_id(&mut self, index: usize, blob_id: String) {
        if self.blob_ids.len() <= index {
            self.blob_ids.resize(index + 1, None);
        }
        self.blob_ids[index] = Some(blob_id);
    }
}

/// The binary serialization unit: one node with all its inlined properties,
/// mixins, child references and shared-parent set.
///
/// The node id itself is not part of the wire format; bundles are keyed by
/// id externally and the id is supplied again on decode.
#[derive(Debug, Clone)]
pub struct NodeBundle {
    id: NodeId,
    primary_type: Name,
    parent_id: Option<NodeId>,
    mixin_types: Vec<Name>,
    properties: Vec<PropertyEntry>,
    referenceable: bool,
    child_entries: Vec<ChildEntry>,
    mod_count: u32,
    shared_set: Vec<NodeId>,
    size: u64,
}

impl NodeBundle {
    pub fn new(id: NodeId, primary_type: Name) -> Self {
        Self {
            id,
            primary_type,
            parent_id: None,
            mixin_types: Vec::new(),
            properties: Vec::new(),
            referenceable: false,
            child_entries: Vec::new(),
            mod_count: 0,
            shared_set: Vec::new(),
            size: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn primary_type(&self) -> &Name {
        &self.primary_type
    }

    #[inline]
    pub fn parent_id(&self) -> Option<NodeId> {
        self.parent_id
    }

    pub fn set_parent_id(&mut self, parent_id: Option<NodeId>) {
        self.parent_id = parent_id;
    }

    #[inline]
    pub fn mixin_types(&self) -> &[Name] {
        &self.mixin_types
    }

    pub fn set_mixin_types(&mut self, mixin_types: Vec<Name>) {
        self.mixin_types = mixin_types;
    }

    #[inline]
    pub fn properties(&self) -> &[PropertyEntry] {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut [PropertyEntry] {
        &mut self.properties
    }

    pub fn add_property(&mut self, entry: PropertyEntry) {
        self.properties.push(entry);
    }

    /// Look up a property entry by name.
    pub fn property(&self, name: &Name) -> Option<&PropertyEntry> {
        self.properties.iter().find(|entry| entry.id().name() == name)
    }

    #[inline]
    pub fn is_referenceable(&self) -> bool {
        self.referenceable
    }

    pub fn set_referenceable(&mut self, referenceable: bool) {
        self.referenceable = referenceable;
    }

    #[inline]
    pub fn child_entries(&self) -> &[ChildEntry] {
        &self.child_entries
    }

    pub fn add_child_entry(&mut self, name: Name, id: NodeId) {
        self.child_entries.push(ChildEntry::new(name, id));
    }

    pub fn set_child_entries(&mut self, child_entries: Vec<ChildEntry>) {
        self.child_entries = child_entries;
    }

    #[inline]
    pub fn mod_count(&self) -> u32 {
        self.mod_count
    }

    pub fn set_mod_count(&mut self, mod_count: u32) {
        self.mod_count = mod_count;
    }

    #[inline]
    pub fn shared_set(&self) -> &[NodeId] {
        &self.shared_set
    }

    pub fn set_shared_set(&mut self, shared_set: Vec<NodeId>) {
        self.shared_set = shared_set;
    }

    /// Measured byte length of the last (de)serialization of this bundle.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn set_size(&mut self, size: u64) {
        self.size = size;
    }
}

/// Bundle equality ignores the measured `size`, which is recomputed on every
/// write.
impl PartialEq for NodeBundle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.primary_type == other.primary_type
            && self.parent_id == other.parent_id
            && self.mixin_types == other.mixin_types
            && self.properties == other.properties
            && self.referenceable == other.referenceable
            && self.child_entries == other.child_entries
            && self.mod_count == other.mod_count
            && self.shared_set == other.shared_set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warren_types::NS_DEFAULT_URI;

    #[test]
    fn equality_ignores_size() {
        let id = NodeId::new(0, 1);
        let mut a = NodeBundle::new(id, Name::new(NS_DEFAULT_URI, "t"));
        let b = NodeBundle::new(id, Name::new(NS_DEFAULT_URI, "t"));
        a.set_size(100);
        assert_eq!(a, b);
    }

    #[test]
    fn set_values_resets_blob_ids() {
        let id = PropertyId::new(NodeId::new(0, 1), Name::new(NS_DEFAULT_URI, "p"));
        let mut entry = PropertyEntry::new(id, PropertyType::Long, true);
        entry.set_values(vec![Value::Long(1), Value::Long(2)]);
        assert_eq!(entry.blob_id(0), None);
        entry.set_blob_id(1, "blob-1".to_owned());
        assert_eq!(entry.blob_id(1), Some("blob-1"));
        entry.set_values(vec![Value::Long(3)]);
        assert_eq!(entry.blob_id(0), None);
    }
}
