//! Typed property values.
//!
//! Every persisted property carries one of twelve wire-level types. The type
//! code occupies the low nibble of the bundle property header, so codes must
//! stay within 0..=15; 1..=12 are assigned, the rest are reserved.

use std::fmt;

use crate::name::Name;
use crate::NodeId;

/// Wire-level property type codes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(u8)]
pub enum PropertyType {
    String = 1,
    Binary = 2,
    Long = 3,
    Double = 4,
    Date = 5,
    Boolean = 6,
    Name = 7,
    Path = 8,
    Reference = 9,
    WeakReference = 10,
    Uri = 11,
    Decimal = 12,
}

impl PropertyType {
    /// Decode a wire code. Returns `None` for unassigned codes.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::String),
            2 => Some(Self::Binary),
            3 => Some(Self::Long),
            4 => Some(Self::Double),
            5 => Some(Self::Date),
            6 => Some(Self::Boolean),
            7 => Some(Self::Name),
            8 => Some(Self::Path),
            9 => Some(Self::Reference),
            10 => Some(Self::WeakReference),
            11 => Some(Self::Uri),
            12 => Some(Self::Decimal),
            _ => None,
        }
    }

    /// The wire code (low nibble of the property header byte).
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Binary => "Binary",
            Self::Long => "Long",
            Self::Double => "Double",
            Self::Date => "Date",
            Self::Boolean => "Boolean",
            Self::Name => "Name",
            Self::Path => "Path",
            Self::Reference => "Reference",
            Self::WeakReference => "WeakReference",
            Self::Uri => "URI",
            Self::Decimal => "Decimal",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decimal number in its canonical text representation.
///
/// The core never does decimal arithmetic; values pass through verbatim, so
/// a canonical string keeps full precision without pulling in an arbitrary
/// precision library.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct DecimalValue(String);

impl DecimalValue {
    pub fn new(canonical: impl Into<String>) -> Self {
        Self(canonical.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DecimalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A binary value in one of its three storage states.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BinaryValue {
    /// Small payload carried inline in the bundle.
    Inline(Vec<u8>),
    /// Payload offloaded to the blob store, identified by its blob id.
    InBlobStore { blob_id: String },
    /// Payload offloaded to the external data store.
    InDataStore { identifier: String },
}

impl BinaryValue {
    /// The payload length, known only for inline values.
    pub fn len(&self) -> Option<u64> {
        match self {
            BinaryValue::Inline(data) => Some(data.len() as u64),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, BinaryValue::Inline(_))
    }
}

/// A single property value, variant by [`PropertyType`].
///
/// DATE, PATH and URI values are carried in their canonical string forms;
/// the core stores and round-trips them without interpretation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    String(String),
    Binary(BinaryValue),
    Long(i64),
    Double(f64),
    Date(String),
    Boolean(bool),
    Name(Name),
    Path(String),
    Reference(NodeId),
    WeakReference(NodeId),
    Uri(String),
    /// Decimal with an explicit absent state; the wire format carries a
    /// presence flag.
    Decimal(Option<DecimalValue>),
}

impl Value {
    /// The wire type of this value.
    pub const fn property_type(&self) -> PropertyType {
        match self {
            Value::String(_) => PropertyType::String,
            Value::Binary(_) => PropertyType::Binary,
            Value::Long(_) => PropertyType::Long,
            Value::Double(_) => PropertyType::Double,
            Value::Date(_) => PropertyType::Date,
            Value::Boolean(_) => PropertyType::Boolean,
            Value::Name(_) => PropertyType::Name,
            Value::Path(_) => PropertyType::Path,
            Value::Reference(_) => PropertyType::Reference,
            Value::WeakReference(_) => PropertyType::WeakReference,
            Value::Uri(_) => PropertyType::Uri,
            Value::Decimal(_) => PropertyType::Decimal,
        }
    }
}
