//! Cross-crate smoke test: serialize the states a hierarchy walk touches
//! and read them back through the facade exports.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use warren::bundle::MemoryBlobStore;
use warren::types::{name::well_known, BinaryValue};
use warren::{
    BlobStore, BundleBinding, BundleReader, BundleWriter, CachingHierarchyManager, ItemId,
    ItemState, ItemStateManager, ItemStatus, Name, NodeBundle, NodeId, Path, PropertyId,
    Result, Value, WarrenError,
};

struct MapStateManager {
    root_id: NodeId,
    states: Mutex<HashMap<ItemId, ItemState>>,
}

impl ItemStateManager for MapStateManager {
    fn get_item_state(&self, id: &ItemId) -> Result<ItemState> {
        self.states
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| WarrenError::NoSuchItemState { id: id.clone() })
    }

    fn has_item_state(&self, id: &ItemId) -> bool {
        self.states.lock().contains_key(id)
    }

    fn get_node_references(&self, _id: NodeId) -> Result<Vec<PropertyId>> {
        Ok(Vec::new())
    }

    fn has_node_references(&self, _id: NodeId) -> bool {
        false
    }
}

#[test]
fn resolve_then_persist_then_reload() {
    // a tiny repository: / -> doc -> attachment
    let root_id = NodeId::new(0, 0);
    let doc_id = NodeId::new(0, 1);
    let attachment_id = NodeId::new(0, 2);

    let root = Arc::new(warren::NodeState::new(
        root_id,
        well_known::jcr_root().clone(),
        None,
        ItemStatus::Existing,
    ));
    let doc = Arc::new(warren::NodeState::new(
        doc_id,
        well_known::nt_file().clone(),
        Some(root_id),
        ItemStatus::Existing,
    ));
    let attachment = Arc::new(warren::NodeState::new(
        attachment_id,
        well_known::nt_resource().clone(),
        Some(doc_id),
        ItemStatus::Existing,
    ));
    root.add_child_node_entry(Name::new("", "doc"), doc_id);
    doc.add_child_node_entry(Name::new("", "attachment"), attachment_id);

    let mut states = HashMap::new();
    states.insert(ItemId::Node(root_id), ItemState::Node(root));
    states.insert(ItemId::Node(doc_id), ItemState::Node(doc.clone()));
    states.insert(ItemId::Node(attachment_id), ItemState::Node(attachment));
    let manager = Arc::new(MapStateManager {
        root_id,
        states: Mutex::new(states),
    });

    let cache = CachingHierarchyManager::new(manager.root_id, manager.clone());
    let path = Path::parse("/doc/attachment").unwrap();
    assert_eq!(cache.resolve_node_path(&path).unwrap(), Some(attachment_id));
    assert_eq!(cache.get_path(attachment_id).unwrap(), path);

    // persist the resolved node as a bundle
    let binding = BundleBinding::new(Arc::new(MemoryBlobStore::new()) as Arc<dyn BlobStore>)
        .with_min_blob_size(1024);
    let mut bundle = NodeBundle::new(doc_id, well_known::nt_file().clone());
    bundle.set_parent_id(Some(root_id));
    bundle.set_child_entries(doc.child_node_entries());
    let mut entry = warren::bundle::PropertyEntry::new(
        PropertyId::new(doc_id, Name::new("", "payload")),
        warren::PropertyType::Binary,
        false,
    );
    entry.set_values(vec![Value::Binary(BinaryValue::Inline(vec![7; 32]))]);
    bundle.add_property(entry);

    let mut writer = BundleWriter::new(binding, Vec::new()).unwrap();
    writer.write_bundle(&mut bundle).unwrap();
    let bytes = writer.into_inner();

    let reloaded = BundleReader::new(&bytes[..])
        .unwrap()
        .read_bundle(doc_id)
        .unwrap();
    assert_eq!(reloaded, bundle);
    assert_eq!(reloaded.child_entries()[0].id, attachment_id);
}
