//! Large-binary storage.
//!
//! The codec offloads binary values above a configurable threshold to a
//! [`BlobStore`], or to an external [`DataStore`] when one is configured.
//! Stores are thread-safe by contract; a single blob store may be driven by
//! many concurrent codecs.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use warren_error::{Result, WarrenError};
use warren_types::PropertyId;

/// External storage for binary values above the inline threshold.
pub trait BlobStore: Send + Sync {
    /// Derive a fresh blob id for value `index` of `property`.
    fn create_id(&self, property: &PropertyId, index: usize) -> String;

    /// Store exactly `size` bytes from `data` under `blob_id`.
    fn put(&self, blob_id: &str, data: &mut dyn Read, size: u64) -> Result<()>;

    /// Open the payload stored under `blob_id`.
    fn open(&self, blob_id: &str) -> Result<Box<dyn Read + Send>>;

    /// Delete the payload stored under `blob_id`.
    fn remove(&self, blob_id: &str) -> Result<()>;

    /// Zero-copy capability: stores backed by the filesystem expose the
    /// backing file, others return `None`.
    fn resource_path(&self, _blob_id: &str) -> Option<PathBuf> {
        None
    }
}

/// Content-addressed external record store consulted before the blob store.
pub trait DataStore: Send + Sync {
    /// Records shorter than this stay inline in the bundle.
    fn min_record_length(&self) -> u32;

    /// Persist `data` and return its identifier. Storing the same content
    /// twice returns the same identifier.
    fn store(&self, data: &mut dyn Read) -> Result<String>;

    /// Open the record stored under `identifier`.
    fn open(&self, identifier: &str) -> Result<Box<dyn Read + Send>>;
}

/// Blob id shared by the store implementations: node id, escaped property
/// local name, value index.
fn default_blob_id(property: &PropertyId, index: usize) -> String {
    let local: String = property
        .name()
        .local_name()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}.{local}.{index}", property.parent_id())
}

fn read_payload(data: &mut dyn Read, size: u64) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    data.take(size).read_to_end(&mut payload)?;
    if payload.len() as u64 != size {
        return Err(WarrenError::BlobIo {
            detail: format!(
                "short blob payload: expected {size} bytes, got {}",
                payload.len()
            ),
        });
    }
    Ok(payload)
}

/// In-memory blob store for tests and ephemeral repositories.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.lock().is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn create_id(&self, property: &PropertyId, index: usize) -> String {
        default_blob_id(property, index)
    }

    fn put(&self, blob_id: &str, data: &mut dyn Read, size: u64) -> Result<()> {
        let payload = read_payload(data, size)?;
        self.blobs.lock().insert(blob_id.to_owned(), payload);
        Ok(())
    }

    fn open(&self, blob_id: &str) -> Result<Box<dyn Read + Send>> {
        let blobs = self.blobs.lock();
        let payload = blobs.get(blob_id).ok_or_else(|| WarrenError::BlobIo {
            detail: format!("no such blob: {blob_id}"),
        })?;
        Ok(Box::new(io::Cursor::new(payload.clone())))
    }

    fn remove(&self, blob_id: &str) -> Result<()> {
        self.blobs.lock().remove(blob_id);
        Ok(())
    }
}

/// Filesystem blob store with two-level directory fan-out.
#[derive(Debug)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn blob_path(&self, blob_id: &str) -> PathBuf {
        let prefix = blob_id.get(..2).unwrap_or("__");
        self.root.join(prefix).join(blob_id)
    }
}

impl BlobStore for FileBlobStore {
    fn create_id(&self, property: &PropertyId, index: usize) -> String {
        default_blob_id(property, index)
    }

    fn put(&self, blob_id: &str, data: &mut dyn Read, size: u64) -> Result<()> {
        let path = self.blob_path(blob_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&path)?;
        let copied = io::copy(&mut data.take(size), &mut file)?;
        if copied != size {
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(WarrenError::BlobIo {
                detail: format!("short blob payload: expected {size} bytes, got {copied}"),
            });
        }
        file.flush()?;
        Ok(())
    }

    fn open(&self, blob_id: &str) -> Result<Box<dyn Read + Send>> {
        let file = fs::File::open(self.blob_path(blob_id)).map_err(|err| WarrenError::BlobIo {
            detail: format!("cannot open blob {blob_id}: {err}"),
        })?;
        Ok(Box::new(file))
    }

    fn remove(&self, blob_id: &str) -> Result<()> {
        match fs::remove_file(self.blob_path(blob_id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(WarrenError::Io(err)),
        }
    }

    fn resource_path(&self, blob_id: &str) -> Option<PathBuf> {
        let path = self.blob_path(blob_id);
        path.exists().then_some(path)
    }
}

/// In-memory content-addressed data store.
///
/// Identifiers are hex-encoded SHA-256 digests, so identical content maps to
/// a single record.
#[derive(Debug)]
pub struct MemoryDataStore {
    min_record_length: u32,
    records: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryDataStore {
    pub fn new(min_record_length: u32) -> Self {
        Self {
            min_record_length,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Number of distinct records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl DataStore for MemoryDataStore {
    fn min_record_length(&self) -> u32 {
        self.min_record_length
    }

    fn store(&self, data: &mut dyn Read) -> Result<String> {
        let mut payload = Vec::new();
        data.read_to_end(&mut payload)?;
        let digest = Sha256::digest(&payload);
        let identifier: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        self.records.lock().insert(identifier.clone(), payload);
        Ok(identifier)
    }

    fn open(&self, identifier: &str) -> Result<Box<dyn Read + Send>> {
        let records = self.records.lock();
        let payload = records.get(identifier).ok_or_else(|| WarrenError::BlobIo {
            detail: format!("no such data record: {identifier}"),
        })?;
        Ok(Box::new(io::Cursor::new(payload.clone())))
    }
}
