//! Node bundle codec.
//!
//! A bundle is the compact, self-describing binary serialization of one node
//! together with all its inlined properties, mixins, child references and
//! shared-parent set. The format is length-delimited throughout: multi-byte
//! integers are big-endian, strings are UTF-8 with a varint length prefix,
//! and name lists terminate with the `null`-name sentinel.
//!
//! Wire layout after the one-byte format version:
//!
//! 1. primary type name
//! 2. optional parent id
//! 3. mixin names, `null`-terminated
//! 4. property entries (name + state), `null`-terminated
//! 5. referenceable flag
//! 6. child entries (id + name), terminated by an absent id
//! 7. modification count varint
//! 8. shared-set ids, terminated by an absent id
//!
//! Binary values above the configured thresholds are offloaded to a
//! [`BlobStore`] or an external [`DataStore`]; the int slot that normally
//! holds the inline length then carries one of two reserved sentinels.

pub mod binding;
pub mod bundle;
pub mod names;
pub mod reader;
pub mod store;
pub mod stream;
pub mod varint;
pub mod writer;

pub use binding::{BundleBinding, DEFAULT_MIN_BLOB_SIZE};
pub use bundle::{NodeBundle, PropertyEntry};
pub use reader::BundleReader;
pub use store::{BlobStore, DataStore, FileBlobStore, MemoryBlobStore, MemoryDataStore};
pub use writer::BundleWriter;

/// First bundle format version.
pub const VERSION_1: u8 = 1;

/// The version every encoder emits.
pub const VERSION_CURRENT: u8 = VERSION_1;

/// Sentinel length marking a binary value stored in the blob store.
pub const BINARY_IN_BLOB_STORE: i32 = -1;

/// Sentinel length marking a binary value stored in the data store.
pub const BINARY_IN_DATA_STORE: i32 = -2;
