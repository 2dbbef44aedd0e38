//! Bundle deserializer.
//!
//! Symmetric with [`crate::writer::BundleWriter`]. The version byte is read
//! up front and dispatches to a version-specific decoder; every decode
//! failure carries the byte offset it was detected at.

use std::io::Read;

use warren_error::Result;
use warren_types::{BinaryValue, DecimalValue, Name, NodeId, PropertyId, PropertyType, Value};

use crate::bundle::{NodeBundle, PropertyEntry};
use crate::names;
use crate::stream::CountingReader;
use crate::varint::{read_bytes, read_string, read_var_int};
use crate::{BINARY_IN_BLOB_STORE, BINARY_IN_DATA_STORE, VERSION_1};

/// Deserializes node bundles from a byte stream.
///
/// A reader is bound to one stream and is single-threaded. It maintains the
/// same seven-slot namespace intern table as the writer, filled in
/// first-appearance order while decoding.
#[derive(Debug)]
pub struct BundleReader<R: Read> {
    input: CountingReader<R>,
    version: u8,
    namespaces: [Option<String>; 7],
}

impl<R: Read> BundleReader<R> {
    /// Read the format version byte and prepare the matching decoder.
    pub fn new(input: R) -> Result<Self> {
        let mut input = CountingReader::new(input);
        let version = input.read_u8()?;
        if version != VERSION_1 {
            return Err(input.corrupt(format!("unknown bundle version {version}")));
        }
        Ok(Self {
            input,
            version,
            namespaces: [
                Some(String::new()),
                None,
                None,
                None,
                None,
                None,
                None,
            ],
        })
    }

    /// The format version of the stream being decoded.
    #[inline]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Deserialize the bundle for node `id`.
    ///
    /// The id is not part of the wire format; the caller supplies it from
    /// the bundle's storage key.
    pub fn read_bundle(&mut self, id: NodeId) -> Result<NodeBundle> {
        match self.version {
            VERSION_1 => self.read_bundle_v1(id),
            version => Err(self
                .input
                .corrupt(format!("no decoder for bundle version {version}"))),
        }
    }

    fn read_bundle_v1(&mut self, id: NodeId) -> Result<NodeBundle> {
        let start = self.input.position();

        let primary_type = self
            .read_name()?
            .ok_or_else(|| self.input.corrupt("missing primary type name"))?;
        let mut bundle = NodeBundle::new(id, primary_type);

        bundle.set_parent_id(self.read_node_id()?);

        let mut mixins = Vec::new();
        while let Some(mixin) = self.read_name()? {
            mixins.push(mixin);
        }
        bundle.set_mixin_types(mixins);

        while let Some(name) = self.read_name()? {
            let property_id = PropertyId::new(id, name);
            bundle.add_property(self.read_property_entry(property_id)?);
        }

        bundle.set_referenceable(self.input.read_bool()?);

        while let Some(child_id) = self.read_node_id()? {
            let name = self
                .read_name()?
                .ok_or_else(|| self.input.corrupt("missing child entry name"))?;
            bundle.add_child_entry(name, child_id);
        }

        bundle.set_mod_count(read_var_int(&mut self.input)?);

        let mut shared_set = Vec::new();
        while let Some(shared) = self.read_node_id()? {
            shared_set.push(shared);
        }
        bundle.set_shared_set(shared_set);

        bundle.set_size(self.input.position() - start);
        Ok(bundle)
    }

    fn read_property_entry(&mut self, id: PropertyId) -> Result<PropertyEntry> {
        let header = self.input.read_u8()?;
        let type_code = header & 0x0f;
        let Some(property_type) = PropertyType::from_code(type_code) else {
            return Err(self
                .input
                .corrupt(format!("unknown property type {type_code}")));
        };

        let mv_count = header >> 4;
        let (multi_valued, value_count) = if mv_count == 0 {
            (false, 1)
        } else {
            let len = if mv_count == 0x0f {
                read_var_int(&mut self.input)?
                    .checked_add(0x0f)
                    .ok_or_else(|| self.input.corrupt("multi-value count overflow"))?
            } else {
                u32::from(mv_count)
            };
            (true, len - 1)
        };

        let mut entry = PropertyEntry::new(id, property_type, multi_valued);
        entry.set_mod_count(read_var_int(&mut self.input)?);

        let mut values = Vec::with_capacity(value_count.min(1024) as usize);
        let mut blob_ids = Vec::new();
        for i in 0..value_count {
            let (value, blob_id) = self.read_value(property_type)?;
            values.push(value);
            if let Some(blob_id) = blob_id {
                blob_ids.push((i as usize, blob_id));
            }
        }
        entry.set_values(values);
        for (index, blob_id) in blob_ids {
            entry.set_blob_id(index, blob_id);
        }
        Ok(entry)
    }

    /// Decode one value of the given type. For binary values the returned
    /// blob id mirrors what the writer records on the entry.
    fn read_value(&mut self, property_type: PropertyType) -> Result<(Value, Option<String>)> {
        let value = match property_type {
            PropertyType::Binary => {
                let marker = self.input.read_i32_be()?;
                if marker == BINARY_IN_DATA_STORE {
                    let identifier = read_string(&mut self.input)?;
                    return Ok((Value::Binary(BinaryValue::InDataStore { identifier }), None));
                }
                if marker == BINARY_IN_BLOB_STORE {
                    let blob_id = read_string(&mut self.input)?;
                    return Ok((
                        Value::Binary(BinaryValue::InBlobStore {
                            blob_id: blob_id.clone(),
                        }),
                        Some(blob_id),
                    ));
                }
                let Ok(len) = usize::try_from(marker) else {
                    return Err(self
                        .input
                        .corrupt(format!("invalid inline binary length {marker}")));
                };
                Value::Binary(BinaryValue::Inline(self.input.read_vec(len)?))
            }
            PropertyType::Long => Value::Long(self.input.read_i64_be()?),
            PropertyType::Double => Value::Double(self.input.read_f64_be()?),
            PropertyType::Boolean => Value::Boolean(self.input.read_bool()?),
            PropertyType::Decimal => Value::Decimal(self.read_decimal()?),
            PropertyType::Name => {
                let name = self
                    .read_name()?
                    .ok_or_else(|| self.input.corrupt("unexpected null name value"))?;
                Value::Name(name)
            }
            PropertyType::Reference => Value::Reference(self.read_required_node_id()?),
            PropertyType::WeakReference => Value::WeakReference(self.read_required_node_id()?),
            PropertyType::String => Value::String(read_string(&mut self.input)?),
            PropertyType::Date => Value::Date(read_string(&mut self.input)?),
            PropertyType::Path => Value::Path(read_string(&mut self.input)?),
            PropertyType::Uri => Value::Uri(read_string(&mut self.input)?),
        };
        Ok((value, None))
    }

    /// Decode a name.
    ///
    /// A byte with the top bit clear is a well-known name index (0 is the
    /// null sentinel). Otherwise the byte carries a three-bit namespace slot
    /// and a four-bit local name length; the first use of a custom slot, and
    /// every use of the overflow slot 7, is followed by the URI string.
    fn read_name(&mut self) -> Result<Option<Name>> {
        let byte = self.input.read_u8()?;
        if byte & 0x80 == 0 {
            if byte == names::NULL_NAME_INDEX {
                return Ok(None);
            }
            return match names::index_to_name(byte) {
                Some(name) => Ok(Some(name.clone())),
                None => Err(self
                    .input
                    .corrupt(format!("unknown well-known name index {byte}"))),
            };
        }

        let ns = usize::from((byte >> 4) & 0x07);
        let len = usize::from(byte & 0x0f);

        let uri = if ns < self.namespaces.len() {
            match &self.namespaces[ns] {
                Some(uri) => uri.clone(),
                None => {
                    let uri = read_string(&mut self.input)?;
                    self.namespaces[ns] = Some(uri.clone());
                    uri
                }
            }
        } else {
            // overflow slot: the URI is always inline and never interned
            read_string(&mut self.input)?
        };

        let local_bytes = if len == 0x0f {
            read_bytes(&mut self.input, 0x10)?
        } else {
            self.input.read_vec(len + 1)?
        };
        let local = String::from_utf8(local_bytes)
            .map_err(|_| self.input.corrupt("invalid UTF-8 in local name"))?;
        Ok(Some(Name::new(uri, local)))
    }

    /// Decode an optional node id: a presence byte, then two 64-bit halves.
    fn read_node_id(&mut self) -> Result<Option<NodeId>> {
        if self.input.read_bool()? {
            let msb = self.input.read_u64_be()?;
            let lsb = self.input.read_u64_be()?;
            Ok(Some(NodeId::new(msb, lsb)))
        } else {
            Ok(None)
        }
    }

    fn read_required_node_id(&mut self) -> Result<NodeId> {
        self.read_node_id()?
            .ok_or_else(|| self.input.corrupt("missing reference target id"))
    }

    fn read_decimal(&mut self) -> Result<Option<DecimalValue>> {
        if self.input.read_bool()? {
            Ok(Some(DecimalValue::new(read_string(&mut self.input)?)))
        } else {
            Ok(None)
        }
    }
}
