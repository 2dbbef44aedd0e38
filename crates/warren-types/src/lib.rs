//! Core data types for the warren content repository: item identifiers,
//! qualified names, repository paths and typed property values.
//!
//! Everything in this crate is plain data with value semantics. Mutable
//! repository state lives in `warren-state`; the wire codec lives in
//! `warren-bundle`.

pub mod name;
pub mod namespace;
pub mod path;
pub mod value;

pub use name::{InvalidNameError, Name, NS_DEFAULT_URI, NS_JCR_URI, NS_MIX_URI, NS_NT_URI};
pub use namespace::{NamespaceRegistry, StaticNamespaceRegistry};
pub use path::{InvalidPathError, Path, PathElement, INDEX_DEFAULT, INDEX_UNDEFINED};
pub use value::{BinaryValue, DecimalValue, PropertyType, Value};

use std::fmt;

/// Opaque 128-bit node identifier.
///
/// Stored as two 64-bit halves; equality is bitwise. Identifiers are
/// generated outside the core (typically from UUIDs) and the core never
/// interprets their contents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct NodeId {
    msb: u64,
    lsb: u64,
}

impl NodeId {
    /// Construct a node id from its two 64-bit halves.
    #[inline]
    pub const fn new(msb: u64, lsb: u64) -> Self {
        Self { msb, lsb }
    }

    /// The most significant 64 bits.
    #[inline]
    pub const fn most_significant_bits(self) -> u64 {
        self.msb
    }

    /// The least significant 64 bits.
    #[inline]
    pub const fn least_significant_bits(self) -> u64 {
        self.lsb
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            self.msb >> 32,
            (self.msb >> 16) & 0xffff,
            self.msb & 0xffff,
            (self.lsb >> 48) & 0xffff,
            self.lsb & 0xffff_ffff_ffff
        )
    }
}

/// Identifier of a single property: the owning node plus the property name.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct PropertyId {
    parent: NodeId,
    name: Name,
}

impl PropertyId {
    pub fn new(parent: NodeId, name: Name) -> Self {
        Self { parent, name }
    }

    /// The node this property belongs to.
    #[inline]
    pub fn parent_id(&self) -> NodeId {
        self.parent
    }

    /// The property name, qualified by namespace.
    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.parent, self.name)
    }
}

/// Either a node or a property identifier.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum ItemId {
    Node(NodeId),
    Property(PropertyId),
}

impl ItemId {
    #[inline]
    pub fn is_node(&self) -> bool {
        matches!(self, ItemId::Node(_))
    }

    #[inline]
    pub fn is_property(&self) -> bool {
        matches!(self, ItemId::Property(_))
    }

    /// The node id if this identifies a node.
    #[inline]
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            ItemId::Node(id) => Some(*id),
            ItemId::Property(_) => None,
        }
    }

    /// The property id if this identifies a property.
    #[inline]
    pub fn property_id(&self) -> Option<&PropertyId> {
        match self {
            ItemId::Node(_) => None,
            ItemId::Property(id) => Some(id),
        }
    }
}

impl From<NodeId> for ItemId {
    fn from(id: NodeId) -> Self {
        ItemId::Node(id)
    }
}

impl From<PropertyId> for ItemId {
    fn from(id: PropertyId) -> Self {
        ItemId::Property(id)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Node(id) => id.fmt(f),
            ItemId::Property(id) => id.fmt(f),
        }
    }
}

/// Ordered reference from a parent node to one of its children.
///
/// The same-name-sibling index of an entry is not stored; it is derived from
/// the entry's 1-based position among siblings carrying the same name.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChildEntry {
    pub name: Name,
    pub id: NodeId,
}

impl ChildEntry {
    pub fn new(name: Name, id: NodeId) -> Self {
        Self { name, id }
    }
}
