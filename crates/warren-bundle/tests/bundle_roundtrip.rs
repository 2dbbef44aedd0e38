//! End-to-end codec tests: round-trips in both directions, namespace
//! interning, binary placement and corruption handling.

use std::io::Read;
use std::sync::Arc;

use warren_bundle::{
    BlobStore, BundleBinding, BundleReader, BundleWriter, DataStore, MemoryBlobStore,
    MemoryDataStore, NodeBundle, PropertyEntry, BINARY_IN_BLOB_STORE, VERSION_1,
};
use warren_error::{Result, WarrenError};
use warren_types::{
    BinaryValue, DecimalValue, Name, NodeId, PropertyId, PropertyType, Value, NS_MIX_URI,
    NS_NT_URI,
};

fn node_id(n: u64) -> NodeId {
    NodeId::new(0x1111_2222_3333_4444, n)
}

fn binding() -> (Arc<MemoryBlobStore>, BundleBinding) {
    let store = Arc::new(MemoryBlobStore::new());
    let binding = BundleBinding::new(store.clone() as Arc<dyn BlobStore>).with_min_blob_size(16);
    (store, binding)
}

fn encode(binding: &BundleBinding, bundle: &mut NodeBundle) -> Vec<u8> {
    let mut writer = BundleWriter::new(binding.clone(), Vec::new()).unwrap();
    writer.write_bundle(bundle).unwrap();
    writer.into_inner()
}

fn decode(bytes: &[u8], id: NodeId) -> Result<NodeBundle> {
    BundleReader::new(bytes)?.read_bundle(id)
}

fn single(id: NodeId, name: Name, value: Value) -> PropertyEntry {
    let mut entry = PropertyEntry::new(
        PropertyId::new(id, name),
        value.property_type(),
        false,
    );
    entry.set_values(vec![value]);
    entry
}

fn sample_bundle(id: NodeId) -> NodeBundle {
    let mut bundle = NodeBundle::new(id, Name::new(NS_NT_URI, "unstructured"));
    bundle.set_parent_id(Some(node_id(1)));
    bundle.set_mixin_types(vec![
        Name::new(NS_MIX_URI, "referenceable"),
        Name::new("http://example.com/custom", "taggable"),
    ]);
    bundle.set_referenceable(true);
    bundle.set_mod_count(17);

    bundle.add_property(single(id, Name::new("", "title"), Value::String("warren".into())));
    bundle.add_property(single(id, Name::new("", "count"), Value::Long(-42)));
    bundle.add_property(single(id, Name::new("", "ratio"), Value::Double(2.5)));
    bundle.add_property(single(id, Name::new("", "flag"), Value::Boolean(true)));
    bundle.add_property(single(
        id,
        Name::new("", "price"),
        Value::Decimal(Some(DecimalValue::new("10.250"))),
    ));
    bundle.add_property(single(id, Name::new("", "missing"), Value::Decimal(None)));
    bundle.add_property(single(
        id,
        Name::new("", "kind"),
        Value::Name(Name::new("http://example.com/custom", "document")),
    ));
    bundle.add_property(single(id, Name::new("", "target"), Value::Reference(node_id(9))));
    bundle.add_property(single(
        id,
        Name::new("", "weak"),
        Value::WeakReference(node_id(10)),
    ));
    bundle.add_property(single(
        id,
        Name::new("", "stamp"),
        Value::Date("2004-08-18T12:00:00.000Z".into()),
    ));
    bundle.add_property(single(id, Name::new("", "where"), Value::Path("/a/b[2]".into())));
    bundle.add_property(single(
        id,
        Name::new("", "link"),
        Value::Uri("http://example.com/doc".into()),
    ));
    bundle.add_property(single(
        id,
        Name::new("", "small"),
        Value::Binary(BinaryValue::Inline(vec![0xde, 0xad, 0xbe, 0xef])),
    ));

    let mut multi = PropertyEntry::new(
        PropertyId::new(id, Name::new("", "numbers")),
        PropertyType::Long,
        true,
    );
    multi.set_values((0..20).map(Value::Long).collect());
    multi.set_mod_count(3);
    bundle.add_property(multi);

    bundle.add_child_entry(Name::new("", "child"), node_id(20));
    bundle.add_child_entry(Name::new("", "child"), node_id(21));
    bundle.add_child_entry(Name::new(NS_NT_URI, "resource"), node_id(22));

    bundle.set_shared_set(vec![node_id(1), node_id(30)]);
    bundle
}

#[test]
fn decode_of_encode_preserves_every_field() {
    let (_, binding) = binding();
    let id = node_id(2);
    let mut bundle = sample_bundle(id);
    let bytes = encode(&binding, &mut bundle);

    let decoded = decode(&bytes, id).unwrap();
    assert_eq!(decoded, bundle);
    assert_eq!(decoded.size(), bundle.size());
    assert_eq!(decoded.size(), bytes.len() as u64 - 1, "size excludes the version byte");
}

#[test]
fn encode_of_decode_is_byte_identical() {
    let (_, binding) = binding();
    let id = node_id(2);
    let mut bundle = sample_bundle(id);
    let first = encode(&binding, &mut bundle);

    let mut decoded = decode(&first, id).unwrap();
    let second = encode(&binding, &mut decoded);
    assert_eq!(first, second);
}

#[test]
fn empty_bundle_roundtrip() {
    let (_, binding) = binding();
    let id = node_id(3);
    let mut bundle = NodeBundle::new(id, Name::new(NS_NT_URI, "base"));
    let bytes = encode(&binding, &mut bundle);
    let decoded = decode(&bytes, id).unwrap();
    assert_eq!(decoded, bundle);
}

#[test]
fn multi_valued_overflow_count_roundtrip() {
    // 14 and more values spill the count out of the header nibble.
    let (_, binding) = binding();
    let id = node_id(4);
    for count in [0usize, 1, 13, 14, 15, 40] {
        let mut entry = PropertyEntry::new(
            PropertyId::new(id, Name::new("", "xs")),
            PropertyType::String,
            true,
        );
        entry.set_values((0..count).map(|i| Value::String(format!("v{i}"))).collect());
        let mut bundle = NodeBundle::new(id, Name::new(NS_NT_URI, "unstructured"));
        bundle.add_property(entry);

        let bytes = encode(&binding, &mut bundle);
        let decoded = decode(&bytes, id).unwrap();
        assert_eq!(decoded, bundle, "roundtrip failed for {count} values");
    }
}

// ---------------------------------------------------------------- interning

fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    haystack
        .windows(needle.len())
        .filter(|window| *window == needle)
        .count()
}

#[test]
fn seventh_and_later_namespaces_are_never_interned() {
    let (_, binding) = binding();
    let id = node_id(5);
    let mut bundle = NodeBundle::new(id, Name::new(NS_NT_URI, "unstructured"));

    // eight custom URIs, each referenced twice, in first-appearance order
    let mut mixins = Vec::new();
    for round in 0..2 {
        for i in 1..=8 {
            mixins.push(Name::new(format!("http://ns.example/u{i}"), format!("m{round}")));
        }
    }
    bundle.set_mixin_types(mixins);

    let bytes = encode(&binding, &mut bundle);

    // slots 1..=6 intern the first six URIs: written once each
    for i in 1..=6 {
        let uri = format!("http://ns.example/u{i}");
        assert_eq!(
            count_occurrences(&bytes, uri.as_bytes()),
            1,
            "u{i} should be interned after first use"
        );
    }
    // the seventh and eighth URIs overflow: written on every use
    for i in 7..=8 {
        let uri = format!("http://ns.example/u{i}");
        assert_eq!(
            count_occurrences(&bytes, uri.as_bytes()),
            2,
            "u{i} must be written inline on every use"
        );
    }

    // and the reader tracks the same slot assignment
    let mut decoded = decode(&bytes, id).unwrap();
    assert_eq!(decoded, bundle);
    assert_eq!(encode(&binding, &mut decoded), bytes);
}

#[test]
fn long_local_names_roundtrip() {
    let (_, binding) = binding();
    let id = node_id(6);
    let mut bundle = NodeBundle::new(id, Name::new(NS_NT_URI, "unstructured"));
    bundle.set_mixin_types(vec![
        Name::new("http://ns.example/x", "a"),
        Name::new("http://ns.example/x", "exactlyfifteen1"),
        Name::new("http://ns.example/x", "sixteencharacter"),
        Name::new("http://ns.example/x", "a-rather-long-local-name-beyond-the-nibble"),
    ]);
    let bytes = encode(&binding, &mut bundle);
    let decoded = decode(&bytes, id).unwrap();
    assert_eq!(decoded, bundle);
}

// ----------------------------------------------------------- binary values

#[test]
fn empty_binary_writes_zero_length_prefix() {
    let (store, binding) = binding();
    let id = node_id(7);
    let mut bundle = NodeBundle::new(id, Name::new(NS_NT_URI, "unstructured"));
    bundle.add_property(single(
        id,
        Name::new("", "empty"),
        Value::Binary(BinaryValue::Inline(Vec::new())),
    ));

    // golden vector: the whole bundle is deterministic
    let bytes = encode(&binding, &mut bundle);
    assert_eq!(
        bytes,
        vec![
            VERSION_1, // format version
            33,        // nt:unstructured, well-known index
            0x00,      // parent absent
            0x00,      // mixin terminator
            0x84, b'e', b'm', b'p', b't', b'y', // expanded name "empty"
            0x02, // single-valued BINARY
            0x00, // property mod count
            0x00, 0x00, 0x00, 0x00, // inline length 0, no payload
            0x00, // property terminator
            0x00, // not referenceable
            0x00, // child entry terminator
            0x00, // bundle mod count
            0x00, // shared set terminator
        ]
    );
    assert!(store.is_empty());

    let decoded = decode(&bytes, id).unwrap();
    assert_eq!(
        decoded.property(&Name::new("", "empty")).unwrap().value(0),
        &Value::Binary(BinaryValue::Inline(Vec::new()))
    );
}

#[test]
fn small_binary_stays_inline() {
    let (store, binding) = binding();
    let id = node_id(8);
    let payload = vec![0xab; 16]; // exactly the threshold
    let mut bundle = NodeBundle::new(id, Name::new(NS_NT_URI, "unstructured"));
    bundle.add_property(single(
        id,
        Name::new("", "data"),
        Value::Binary(BinaryValue::Inline(payload.clone())),
    ));

    let bytes = encode(&binding, &mut bundle);
    assert!(store.is_empty());
    assert_eq!(count_occurrences(&bytes, &payload), 1);

    let decoded = decode(&bytes, id).unwrap();
    assert_eq!(
        decoded.property(&Name::new("", "data")).unwrap().value(0),
        &Value::Binary(BinaryValue::Inline(payload))
    );
}

#[test]
fn large_binary_goes_to_blob_store() {
    let (store, binding) = binding();
    let id = node_id(9);
    let payload = vec![0xcd; 17]; // one over the threshold
    let mut bundle = NodeBundle::new(id, Name::new(NS_NT_URI, "unstructured"));
    bundle.add_property(single(
        id,
        Name::new("", "data"),
        Value::Binary(BinaryValue::Inline(payload.clone())),
    ));

    let bytes = encode(&binding, &mut bundle);
    assert_eq!(store.len(), 1);
    assert_eq!(count_occurrences(&bytes, &payload), 0, "payload must not be inline");
    assert_eq!(
        count_occurrences(&bytes, &BINARY_IN_BLOB_STORE.to_be_bytes()),
        1
    );

    // the entry now references the stored blob
    let entry = bundle.property(&Name::new("", "data")).unwrap();
    let blob_id = entry.blob_id(0).unwrap().to_owned();
    match entry.value(0) {
        Value::Binary(BinaryValue::InBlobStore { blob_id: id }) => assert_eq!(*id, blob_id),
        other => panic!("value not rewritten to a blob reference: {other:?}"),
    }

    // the stored payload is intact
    let mut stored = Vec::new();
    store
        .open(&blob_id)
        .unwrap()
        .read_to_end(&mut stored)
        .unwrap();
    assert_eq!(stored, payload);

    // decode mirrors the reference and re-encodes byte-identically without
    // touching the store again
    let mut decoded = decode(&bytes, id).unwrap();
    assert_eq!(decoded, bundle);
    assert_eq!(
        decoded
            .property(&Name::new("", "data"))
            .unwrap()
            .blob_id(0),
        Some(blob_id.as_str())
    );
    assert_eq!(encode(&binding, &mut decoded), bytes);
    assert_eq!(store.len(), 1);
}

#[test]
fn data_store_takes_precedence_over_blob_store() {
    let blob_store = Arc::new(MemoryBlobStore::new());
    let data_store = Arc::new(MemoryDataStore::new(16));
    let binding = BundleBinding::new(blob_store.clone() as Arc<dyn BlobStore>)
        .with_min_blob_size(4)
        .with_data_store(data_store.clone());

    let id = node_id(10);
    let mut bundle = NodeBundle::new(id, Name::new(NS_NT_URI, "unstructured"));
    // below min_record_length - 1: inline even though it exceeds min_blob_size
    bundle.add_property(single(
        id,
        Name::new("", "smallish"),
        Value::Binary(BinaryValue::Inline(vec![1; 14])),
    ));
    // at the record threshold: data store, not blob store
    bundle.add_property(single(
        id,
        Name::new("", "big"),
        Value::Binary(BinaryValue::Inline(vec![2; 64])),
    ));

    let bytes = encode(&binding, &mut bundle);
    assert!(blob_store.is_empty());
    assert_eq!(data_store.len(), 1);

    let decoded = decode(&bytes, id).unwrap();
    assert_eq!(decoded, bundle);
    match decoded.property(&Name::new("", "big")).unwrap().value(0) {
        Value::Binary(BinaryValue::InDataStore { identifier }) => {
            let mut stored = Vec::new();
            data_store
                .open(identifier)
                .unwrap()
                .read_to_end(&mut stored)
                .unwrap();
            assert_eq!(stored, vec![2; 64]);
        }
        other => panic!("expected a data store reference: {other:?}"),
    }
}

struct FailingBlobStore {
    created: parking_lot::Mutex<Vec<String>>,
    removed: parking_lot::Mutex<Vec<String>>,
}

impl FailingBlobStore {
    fn new() -> Self {
        Self {
            created: parking_lot::Mutex::new(Vec::new()),
            removed: parking_lot::Mutex::new(Vec::new()),
        }
    }
}

impl BlobStore for FailingBlobStore {
    fn create_id(&self, property: &PropertyId, index: usize) -> String {
        let id = format!("{}.{index}", property.parent_id());
        self.created.lock().push(id.clone());
        id
    }

    fn put(&self, _blob_id: &str, _data: &mut dyn Read, _size: u64) -> Result<()> {
        Err(WarrenError::BlobIo {
            detail: "store unavailable".to_owned(),
        })
    }

    fn open(&self, blob_id: &str) -> Result<Box<dyn Read + Send>> {
        Err(WarrenError::BlobIo {
            detail: format!("no such blob: {blob_id}"),
        })
    }

    fn remove(&self, blob_id: &str) -> Result<()> {
        self.removed.lock().push(blob_id.to_owned());
        Ok(())
    }
}

#[test]
fn failed_blob_store_discards_the_uncommitted_id() {
    let store = Arc::new(FailingBlobStore::new());
    let binding =
        BundleBinding::new(store.clone() as Arc<dyn BlobStore>).with_min_blob_size(4);

    let id = node_id(11);
    let mut bundle = NodeBundle::new(id, Name::new(NS_NT_URI, "unstructured"));
    bundle.add_property(single(
        id,
        Name::new("", "data"),
        Value::Binary(BinaryValue::Inline(vec![0; 64])),
    ));

    let mut writer = BundleWriter::new(binding, Vec::new()).unwrap();
    let err = writer.write_bundle(&mut bundle).unwrap_err();
    assert!(matches!(err, WarrenError::BlobIo { .. }));

    let created = store.created.lock().clone();
    let removed = store.removed.lock().clone();
    assert_eq!(created.len(), 1);
    assert_eq!(created, removed, "uncommitted blob id must be discarded");
}

// ------------------------------------------------------------- corruption

#[test]
fn unknown_version_is_corrupt() {
    let err = BundleReader::new(&[9u8][..]).unwrap_err();
    match err {
        WarrenError::CorruptBundle { reason, offset } => {
            assert!(reason.contains("version"));
            assert_eq!(offset, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn truncated_stream_is_corrupt_at_every_prefix() {
    let (_, binding) = binding();
    let id = node_id(12);
    let mut bundle = sample_bundle(id);
    let bytes = encode(&binding, &mut bundle);

    for len in 1..bytes.len() {
        match decode(&bytes[..len], id) {
            Err(WarrenError::CorruptBundle { .. }) => {}
            Ok(_) => panic!("prefix of {len} bytes must not decode"),
            Err(other) => panic!("unexpected error for prefix {len}: {other}"),
        }
    }
}

/// version, expanded primary type "T" in the default namespace, no parent,
/// empty mixin list, then the name of a first property: a minimal valid
/// prelude for corrupt property bytes.
fn property_prelude() -> Vec<u8> {
    vec![
        VERSION_1,
        0x80, // expanded name: ns slot 0 (default), local length 1
        b'T',
        0x00, // parent absent
        0x00, // mixin terminator
        0x80, // property name, same shape
        b'p',
    ]
}

#[test]
fn unknown_property_type_is_corrupt() {
    let mut bytes = property_prelude();
    bytes.push(0x00); // header with type nibble 0: unassigned
    let err = decode(&bytes, node_id(13)).unwrap_err();
    match err {
        WarrenError::CorruptBundle { reason, .. } => assert!(reason.contains("property type")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn invalid_binary_sentinel_is_corrupt() {
    let mut bytes = property_prelude();
    bytes.push(0x02); // single-valued BINARY
    bytes.push(0x00); // mod count
    bytes.extend_from_slice(&(-3i32).to_be_bytes()); // neither sentinel nor a length
    let err = decode(&bytes, node_id(14)).unwrap_err();
    match err {
        WarrenError::CorruptBundle { reason, .. } => {
            assert!(reason.contains("binary length"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unknown_well_known_index_is_corrupt() {
    let bytes = vec![VERSION_1, 0x7f]; // top bit clear, far beyond the table
    let err = decode(&bytes, node_id(15)).unwrap_err();
    assert!(matches!(err, WarrenError::CorruptBundle { .. }));
}

// --------------------------------------------------------------- proptest

mod prop {
    use super::*;
    use proptest::prelude::*;

    fn arb_name() -> BoxedStrategy<Name> {
        prop_oneof![
            3 => "[a-z]{1,20}".prop_map(|local| Name::new("", local)),
            2 => ("[a-c]", "[a-z]{1,20}")
                .prop_map(|(ns, local)| Name::new(format!("http://ns.example/{ns}"), local)),
            1 => Just(Name::new(NS_NT_URI, "unstructured")),
            1 => Just(Name::new(NS_MIX_URI, "referenceable")),
        ]
        .boxed()
    }

    fn arb_node_id() -> BoxedStrategy<NodeId> {
        (any::<u64>(), any::<u64>())
            .prop_map(|(msb, lsb)| NodeId::new(msb, lsb))
            .boxed()
    }

    fn arb_value() -> BoxedStrategy<Value> {
        prop_oneof![
            "[ -~]{0,40}".prop_map(Value::String),
            any::<i64>().prop_map(Value::Long),
            (-1.0e12_f64..1.0e12).prop_map(Value::Double),
            any::<bool>().prop_map(Value::Boolean),
            proptest::option::of(any::<i64>().prop_map(|n| DecimalValue::new(n.to_string())))
                .prop_map(Value::Decimal),
            arb_name().prop_map(Value::Name),
            Just(Value::Date("2004-08-18T12:00:00.000Z".to_owned())),
            Just(Value::Path("/a/b".to_owned())),
            arb_node_id().prop_map(Value::Reference),
            arb_node_id().prop_map(Value::WeakReference),
            Just(Value::Uri("http://example.com".to_owned())),
            proptest::collection::vec(any::<u8>(), 0..64)
                .prop_map(|data| Value::Binary(BinaryValue::Inline(data))),
        ]
        .boxed()
    }

    fn arb_bundle() -> BoxedStrategy<NodeBundle> {
        (
            arb_node_id(),
            arb_name(),
            proptest::option::of(arb_node_id()),
            proptest::collection::vec(arb_name(), 0..4),
            proptest::collection::vec((arb_name(), arb_value()), 0..8),
            proptest::collection::vec(
                (arb_name(), arb_value(), proptest::collection::vec(arb_value(), 0..20)),
                0..3,
            ),
            any::<bool>(),
            proptest::collection::vec((arb_name(), arb_node_id()), 0..6),
            any::<u32>(),
            proptest::collection::vec(arb_node_id(), 0..3),
        )
            .prop_map(
                |(
                    id,
                    primary_type,
                    parent,
                    mixins,
                    props,
                    multi_props,
                    referenceable,
                    children,
                    mod_count,
                    shared,
                )| {
                    let mut bundle = NodeBundle::new(id, primary_type);
                    bundle.set_parent_id(parent);
                    bundle.set_mixin_types(mixins);
                    for (i, (name, value)) in props.into_iter().enumerate() {
                        // make property names unique to mirror real bundles
                        let name = Name::new(
                            name.namespace_uri().to_owned(),
                            format!("{}{i}", name.local_name()),
                        );
                        bundle.add_property(single(id, name, value));
                    }
                    for (i, (name, first, rest)) in multi_props.into_iter().enumerate() {
                        let name = Name::new(
                            name.namespace_uri().to_owned(),
                            format!("{}mv{i}", name.local_name()),
                        );
                        // multi-valued entries hold same-typed values
                        let values: Vec<Value> = std::iter::once(first.clone())
                            .chain(
                                rest.into_iter()
                                    .filter(|v| v.property_type() == first.property_type()),
                            )
                            .collect();
                        let mut entry = PropertyEntry::new(
                            PropertyId::new(id, name),
                            first.property_type(),
                            true,
                        );
                        entry.set_values(values);
                        bundle.add_property(entry);
                    }
                    bundle.set_referenceable(referenceable);
                    for (name, child_id) in children {
                        bundle.add_child_entry(name, child_id);
                    }
                    bundle.set_mod_count(mod_count);
                    bundle.set_shared_set(shared);
                    bundle
                },
            )
            .boxed()
    }

    proptest::proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_roundtrip_both_directions(bundle in arb_bundle()) {
            let (_, binding) = binding();
            let mut bundle = bundle;
            let id = bundle.id();
            let first = encode(&binding, &mut bundle);

            let mut decoded = decode(&first, id).expect("writer output must decode");
            prop_assert_eq!(&decoded, &bundle);

            let second = encode(&binding, &mut decoded);
            prop_assert_eq!(first, second);
        }
    }
}
