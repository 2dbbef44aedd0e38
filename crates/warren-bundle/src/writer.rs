//! Bundle serializer.
//!
//! See [`crate::reader::BundleReader`] for the symmetric decoder and the
//! crate docs for the wire layout.

use std::io::Write;
use std::sync::Arc;

use tracing::warn;
use warren_error::{Result, WarrenError};
use warren_types::name::well_known;
use warren_types::{BinaryValue, DecimalValue, Name, NodeId, PropertyType, Value, NS_DEFAULT_URI};

use crate::binding::BundleBinding;
use crate::bundle::{NodeBundle, PropertyEntry};
use crate::names;
use crate::store::DataStore;
use crate::stream::CountingWriter;
use crate::varint::{write_bytes, write_string, write_var_int};
use crate::{BINARY_IN_BLOB_STORE, BINARY_IN_DATA_STORE, VERSION_CURRENT};

/// Serializes node bundles to a byte stream.
///
/// A writer is bound to one stream and is single-threaded; the constructor
/// emits the format version byte. The per-bundle namespace intern table has
/// seven slots with slot 0 permanently holding the default namespace URI.
pub struct BundleWriter<W: Write> {
    binding: BundleBinding,
    out: CountingWriter<W>,
    namespaces: [Option<String>; 7],
}

/// Where one binary value goes, decided before any bytes are written.
enum Placement {
    /// Re-emit an existing data store reference.
    DataStoreRef(String),
    /// Re-emit an existing blob store reference.
    BlobStoreRef(String),
    /// Inline length-prefixed payload.
    Small,
    /// Persist to the data store, then write the identifier.
    ToDataStore(Arc<dyn DataStore>),
    /// Persist to the blob store, then write the blob id.
    ToBlobStore,
}

impl<W: Write> BundleWriter<W> {
    /// Create a serializer and write the format version byte.
    pub fn new(binding: BundleBinding, out: W) -> Result<Self> {
        let mut out = CountingWriter::new(out);
        out.write_all(&[VERSION_CURRENT])?;
        Ok(Self {
            binding,
            out,
            namespaces: [
                Some(NS_DEFAULT_URI.to_owned()),
                None,
                None,
                None,
                None,
                None,
                None,
            ],
        })
    }

    /// Finish writing and return the underlying stream.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    /// Serialize `bundle`.
    ///
    /// Binary values crossing the offload thresholds are persisted to their
    /// stores; the entry's values and blob ids are updated in place and the
    /// bundle's measured size is recomputed.
    pub fn write_bundle(&mut self, bundle: &mut NodeBundle) -> Result<()> {
        let start = self.out.written();

        self.write_name(Some(bundle.primary_type()))?;
        self.write_node_id(bundle.parent_id())?;

        for mixin in bundle.mixin_types() {
            self.write_name(Some(mixin))?;
        }
        self.write_name(None)?;

        for entry in bundle.properties_mut() {
            // redundant copies of the synthetic type and uuid properties are
            // not serialized
            let name = entry.id().name();
            if name == well_known::jcr_primary_type()
                || name == well_known::jcr_mixin_types()
                || name == well_known::jcr_uuid()
            {
                continue;
            }
            self.write_name(Some(name))?;
            self.write_property_entry(entry)?;
        }
        self.write_name(None)?;

        self.out.write_all(&[u8::from(bundle.is_referenceable())])?;

        for child in bundle.child_entries() {
            self.write_node_id(Some(child.id))?;
            self.write_name(Some(&child.name))?;
        }
        self.write_node_id(None)?;

        write_var_int(&mut self.out, bundle.mod_count())?;

        for &shared in bundle.shared_set() {
            self.write_node_id(Some(shared))?;
        }
        self.write_node_id(None)?;

        bundle.set_size(self.out.written() - start);
        Ok(())
    }

    /// Serialize one property entry.
    ///
    /// The header byte packs the multi-value count into the high nibble and
    /// the property type into the low nibble:
    ///
    /// ```text
    /// +-------------------------------+
    /// |   mv count    |     type      |
    /// +-------------------------------+
    /// ```
    ///
    /// Single-valued entries use count 0. Multi-valued entries store the
    /// value count plus one, truncated at 15; the overflow beyond 14 values
    /// follows as a varint. The modification count varint comes next, then
    /// the values.
    fn write_property_entry(&mut self, entry: &mut PropertyEntry) -> Result<()> {
        let type_code = entry.property_type().code();
        debug_assert!(type_code <= 0x0f);

        if entry.is_multi_valued() {
            let len = entry.values().len() as u32 + 1;
            if len < 0x0f {
                self.out.write_all(&[(len << 4) as u8 | type_code])?;
            } else {
                self.out.write_all(&[0xf0 | type_code])?;
                write_var_int(&mut self.out, len - 0x0f)?;
            }
        } else {
            debug_assert_eq!(entry.values().len(), 1);
            self.out.write_all(&[type_code])?;
        }

        write_var_int(&mut self.out, entry.mod_count())?;

        for i in 0..entry.values().len() {
            if entry.property_type() == PropertyType::Binary {
                self.write_binary(entry, i)?;
            } else {
                self.write_scalar(entry, i)?;
            }
        }
        Ok(())
    }

    fn write_scalar(&mut self, entry: &PropertyEntry, i: usize) -> Result<()> {
        match (entry.property_type(), entry.value(i)) {
            (PropertyType::Long, Value::Long(v)) => self.out.write_all(&v.to_be_bytes())?,
            (PropertyType::Double, Value::Double(v)) => {
                self.out.write_all(&v.to_bits().to_be_bytes())?;
            }
            (PropertyType::Boolean, Value::Boolean(v)) => self.out.write_all(&[u8::from(*v)])?,
            (PropertyType::Decimal, Value::Decimal(decimal)) => {
                self.write_decimal(decimal.as_ref())?;
            }
            (PropertyType::Name, Value::Name(name)) => self.write_name(Some(name))?,
            (PropertyType::Reference, Value::Reference(id))
            | (PropertyType::WeakReference, Value::WeakReference(id)) => {
                self.write_node_id(Some(*id))?;
            }
            (PropertyType::String, Value::String(s))
            | (PropertyType::Date, Value::Date(s))
            | (PropertyType::Path, Value::Path(s))
            | (PropertyType::Uri, Value::Uri(s)) => write_string(&mut self.out, s)?,
            (expected, value) => {
                return Err(WarrenError::ItemState {
                    detail: format!(
                        "property {} value {i} is {} but the entry declares {expected}",
                        entry.id(),
                        value.property_type()
                    ),
                })
            }
        }
        Ok(())
    }

    /// Serialize one binary value, offloading it according to the placement
    /// policy: data store first when configured, blob store above the inline
    /// threshold, inline otherwise.
    fn write_binary(&mut self, entry: &mut PropertyEntry, i: usize) -> Result<()> {
        let placement = match entry.value(i) {
            Value::Binary(BinaryValue::InDataStore { identifier }) => {
                Placement::DataStoreRef(identifier.clone())
            }
            Value::Binary(BinaryValue::InBlobStore { blob_id }) => {
                Placement::BlobStoreRef(blob_id.clone())
            }
            Value::Binary(BinaryValue::Inline(data)) => {
                let len = data.len() as u64;
                if let Some(data_store) = self.binding.data_store() {
                    let threshold = i64::from(data_store.min_record_length()) - 1;
                    if (len as i64) < threshold {
                        Placement::Small
                    } else {
                        Placement::ToDataStore(Arc::clone(data_store))
                    }
                } else if len > u64::from(self.binding.min_blob_size()) {
                    Placement::ToBlobStore
                } else {
                    Placement::Small
                }
            }
            value => {
                return Err(WarrenError::ItemState {
                    detail: format!(
                        "property {} value {i} is {} but the entry declares Binary",
                        entry.id(),
                        value.property_type()
                    ),
                })
            }
        };

        match placement {
            Placement::DataStoreRef(identifier) => {
                self.out.write_all(&BINARY_IN_DATA_STORE.to_be_bytes())?;
                write_string(&mut self.out, &identifier)?;
            }
            Placement::BlobStoreRef(blob_id) => {
                self.out.write_all(&BINARY_IN_BLOB_STORE.to_be_bytes())?;
                write_string(&mut self.out, &blob_id)?;
            }
            Placement::Small => {
                let data = entry
                    .inline_binary(i)
                    .unwrap_or_default();
                self.write_small_binary(data)?;
            }
            Placement::ToDataStore(data_store) => {
                self.out.write_all(&BINARY_IN_DATA_STORE.to_be_bytes())?;
                let identifier = {
                    let data = entry.inline_binary(i).unwrap_or_default();
                    data_store
                        .store(&mut &data[..])
                        .map_err(|err| WarrenError::BlobIo {
                            detail: format!(
                                "error storing data record for {} value {i}: {err}",
                                entry.id()
                            ),
                        })?
                };
                write_string(&mut self.out, &identifier)?;
                entry.replace_value(
                    i,
                    Value::Binary(BinaryValue::InDataStore { identifier }),
                );
            }
            Placement::ToBlobStore => {
                self.out.write_all(&BINARY_IN_BLOB_STORE.to_be_bytes())?;
                let blob_id = match entry.blob_id(i).map(str::to_owned) {
                    Some(id) => id,
                    None => {
                        let store = Arc::clone(self.binding.blob_store());
                        let blob_id = store.create_id(entry.id(), i);
                        {
                            let data = entry.inline_binary(i).unwrap_or_default();
                            let size = data.len() as u64;
                            if let Err(err) = store.put(&blob_id, &mut &data[..], size) {
                                // best-effort discard of the uncommitted blob
                                let _ = store.remove(&blob_id);
                                warn!(
                                    blob_id = %blob_id,
                                    property = %entry.id(),
                                    index = i,
                                    "discarded blob after failed store"
                                );
                                return Err(WarrenError::BlobIo {
                                    detail: format!(
                                        "error storing blob for {} value {i}: {err}",
                                        entry.id()
                                    ),
                                });
                            }
                        }
                        entry.set_blob_id(i, blob_id.clone());
                        entry.replace_value(
                            i,
                            Value::Binary(BinaryValue::InBlobStore {
                                blob_id: blob_id.clone(),
                            }),
                        );
                        blob_id
                    }
                };
                write_string(&mut self.out, &blob_id)?;
            }
        }
        Ok(())
    }

    /// Inline form: 4-byte big-endian length then the raw bytes. The length
    /// shares the int slot with the offload sentinels, so it must stay in
    /// the non-negative 31-bit range.
    fn write_small_binary(&mut self, data: &[u8]) -> Result<()> {
        let Ok(len) = i32::try_from(data.len()) else {
            return Err(WarrenError::BlobIo {
                detail: format!("binary value of {} bytes cannot be inlined", data.len()),
            });
        };
        self.out.write_all(&len.to_be_bytes())?;
        self.out.write_all(data)?;
        Ok(())
    }

    /// Serialize a name.
    ///
    /// Well-known names are one byte (their table index, top bit clear). All
    /// other names start with
    ///
    /// ```text
    /// +-------------------------------+
    /// | 1 | ns index  |  name length  |
    /// +-------------------------------+
    /// ```
    ///
    /// The three-bit namespace index selects an intern slot; the first use
    /// of a custom slot (and every use of the overflow value 7) is followed
    /// by the namespace URI string. The four-bit length holds the UTF-8
    /// local name length minus one; lengths of 16 and beyond store 15 here
    /// and write the bytes with a base-16 length prefix instead.
    fn write_name(&mut self, name: Option<&Name>) -> Result<()> {
        let Some(name) = name else {
            self.out.write_all(&[names::NULL_NAME_INDEX])?;
            return Ok(());
        };
        if let Some(index) = names::name_to_index(name) {
            debug_assert!(index < 0x80);
            self.out.write_all(&[index])?;
            return Ok(());
        }

        let uri = name.namespace_uri();
        let mut ns = 0;
        while ns < self.namespaces.len()
            && self.namespaces[ns].is_some()
            && self.namespaces[ns].as_deref() != Some(uri)
        {
            ns += 1;
        }

        let bytes = name.local_name().as_bytes();
        let len = (bytes.len() - 1).min(0x0f);

        self.out
            .write_all(&[0x80 | ((ns as u8) << 4) | len as u8])?;
        if ns == self.namespaces.len() || self.namespaces[ns].is_none() {
            write_string(&mut self.out, uri)?;
            if ns < self.namespaces.len() {
                self.namespaces[ns] = Some(uri.to_owned());
            }
        }
        if len == 0x0f {
            write_bytes(&mut self.out, bytes, 0x10)?;
        } else {
            self.out.write_all(bytes)?;
        }
        Ok(())
    }

    /// Serialize a node id: a presence byte, then the two 64-bit halves.
    fn write_node_id(&mut self, id: Option<NodeId>) -> Result<()> {
        match id {
            None => self.out.write_all(&[0])?,
            Some(id) => {
                self.out.write_all(&[1])?;
                self.out
                    .write_all(&id.most_significant_bits().to_be_bytes())?;
                self.out
                    .write_all(&id.least_significant_bits().to_be_bytes())?;
            }
        }
        Ok(())
    }

    /// Serialize a decimal: a presence byte, then the canonical string.
    fn write_decimal(&mut self, decimal: Option<&DecimalValue>) -> Result<()> {
        match decimal {
            None => self.out.write_all(&[0])?,
            Some(decimal) => {
                self.out.write_all(&[1])?;
                write_string(&mut self.out, decimal.as_str())?;
            }
        }
        Ok(())
    }
}
