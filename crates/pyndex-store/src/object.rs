//! Object-store surface and the in-memory implementation

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use pyndex_core::BackendError;

/// Metadata sent along with a PUT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
}

/// Idempotent object operations on one bucket.
///
/// Writes are unconditional: last writer wins.
pub trait ObjectStore: Send + Sync {
    /// Read an object. A missing object is [`BackendError::NotFound`].
    fn get(&self, key: &str) -> Result<Vec<u8>, BackendError>;

    fn put(&self, key: &str, body: &[u8], opts: &PutOptions) -> Result<(), BackendError>;

    /// Upload the contents of a local file.
    fn put_file(&self, key: &str, path: &Path, opts: &PutOptions) -> Result<(), BackendError>;

    /// Delete an object. Deleting a missing object succeeds.
    fn delete(&self, key: &str) -> Result<(), BackendError>;

    /// Common prefixes one level below `prefix` (delimiter `/`), each
    /// returned in full and ending with `/`.
    fn list_prefixes(&self, prefix: &str) -> Result<Vec<String>, BackendError>;
}

/// Object body plus the metadata it was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub opts: PutOptions,
}

/// In-process bucket, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> MutexGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stored object with its metadata.
    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects().get(key).cloned()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.objects().keys().cloned().collect()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, BackendError> {
        self.objects()
            .get(key)
            .map(|o| o.body.clone())
            .ok_or_else(|| BackendError::NotFound(key.to_string()))
    }

    fn put(&self, key: &str, body: &[u8], opts: &PutOptions) -> Result<(), BackendError> {
        self.objects().insert(
            key.to_string(),
            StoredObject {
                body: body.to_vec(),
                opts: opts.clone(),
            },
        );
        Ok(())
    }

    fn put_file(&self, key: &str, path: &Path, opts: &PutOptions) -> Result<(), BackendError> {
        let body = std::fs::read(path)?;
        self.put(key, &body, opts)
    }

    fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.objects().remove(key);
        Ok(())
    }

    fn list_prefixes(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
        let prefixes: BTreeSet<String> = self
            .objects()
            .keys()
            .filter_map(|key| {
                let rest = key.strip_prefix(prefix)?;
                let end = rest.find('/')?;
                Some(format!("{prefix}{}", &rest[..=end]))
            })
            .collect();
        Ok(prefixes.into_iter().collect())
    }
}
