//! Codec configuration shared by writers and readers.

use std::sync::Arc;

use crate::store::{BlobStore, DataStore};

/// Default inline threshold for binary values, in bytes.
pub const DEFAULT_MIN_BLOB_SIZE: u32 = 0x1000;

/// Binds a codec to its binary stores and thresholds.
///
/// Cloning is cheap; clones share the underlying stores.
#[derive(Clone)]
pub struct BundleBinding {
    blob_store: Arc<dyn BlobStore>,
    data_store: Option<Arc<dyn DataStore>>,
    min_blob_size: u32,
}

impl BundleBinding {
    pub fn new(blob_store: Arc<dyn BlobStore>) -> Self {
        Self {
            blob_store,
            data_store: None,
            min_blob_size: DEFAULT_MIN_BLOB_SIZE,
        }
    }

    /// Route binary values at or above the data store's record threshold to
    /// `data_store` instead of the blob store.
    #[must_use]
    pub fn with_data_store(mut self, data_store: Arc<dyn DataStore>) -> Self {
        self.data_store = Some(data_store);
        self
    }

    /// Inline binary values up to `min_blob_size` bytes.
    #[must_use]
    pub fn with_min_blob_size(mut self, min_blob_size: u32) -> Self {
        self.min_blob_size = min_blob_size;
        self
    }

    #[inline]
    pub fn blob_store(&self) -> &Arc<dyn BlobStore> {
        &self.blob_store
    }

    #[inline]
    pub fn data_store(&self) -> Option<&Arc<dyn DataStore>> {
        self.data_store.as_ref()
    }

    #[inline]
    pub fn min_blob_size(&self) -> u32 {
        self.min_blob_size
    }
}

impl std::fmt::Debug for BundleBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleBinding")
            .field("data_store", &self.data_store.is_some())
            .field("min_blob_size", &self.min_blob_size)
            .finish_non_exhaustive()
    }
}
