//! Error types shared across the warren workspace.
//!
//! A single structured enum covers every subsystem. Callers match on the
//! variant they can recover from and propagate the rest with `?`.

use thiserror::Error;
use warren_types::{ItemId, Name};

/// Primary error type for warren operations.
#[derive(Error, Debug)]
pub enum WarrenError {
    // === I/O ===
    /// Underlying stream or file I/O failure. Propagated unchanged.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Bundle codec ===
    /// The bundle byte stream is malformed. Fatal for the bundle; the caller
    /// decides recovery.
    #[error("corrupt bundle at offset {offset}: {reason}")]
    CorruptBundle { reason: String, offset: u64 },

    /// A blob or data store operation failed while (de)serializing a binary
    /// value. Uncommitted blob ids have already been discarded best-effort.
    #[error("blob store error: {detail}")]
    BlobIo { detail: String },

    // === Item states ===
    /// The requested item does not exist in the state manager.
    #[error("no such item state: {id}")]
    NoSuchItemState { id: ItemId },

    /// The state manager failed to produce an item for a reason other than
    /// absence.
    #[error("item state error: {detail}")]
    ItemState { detail: String },

    // === Privilege registry ===
    /// The aggregate graph of the privilege definitions contains a cycle.
    #[error("cyclic privilege definitions: {trail}")]
    CyclicDefinitions { trail: String },

    /// A definition reuses a built-in or already registered privilege name.
    #[error("privilege name already in use: {name}")]
    DuplicateName { name: Name },

    /// Two definitions resolve to the same non-empty set of leaf privileges.
    #[error("definition of '{name}' is equivalent to '{other}'")]
    EquivalentDefinitions { name: Name, other: Name },

    /// A custom aggregate transitively includes a built-in privilege.
    #[error("aggregating built-in privileges is not supported: {name}")]
    AggregationNotSupported { name: Name },

    /// A name string could not be parsed, or an aggregate refers to a name
    /// that is neither built-in nor part of the definition set.
    #[error("invalid name: {detail}")]
    InvalidName { detail: String },
}

impl From<warren_types::InvalidNameError> for WarrenError {
    fn from(err: warren_types::InvalidNameError) -> Self {
        WarrenError::InvalidName {
            detail: err.to_string(),
        }
    }
}

impl From<warren_types::InvalidPathError> for WarrenError {
    fn from(err: warren_types::InvalidPathError) -> Self {
        WarrenError::InvalidName {
            detail: err.to_string(),
        }
    }
}

/// Convenience result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, WarrenError>;
