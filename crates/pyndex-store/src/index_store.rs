//! Reading and writing index pages and distributions for directories

use std::path::Path;
use std::sync::Arc;

use pyndex_core::{BackendError, Hash, Index, KeyResolver, ROOT};

use crate::object::{ObjectStore, PutOptions};

/// Content type of index pages.
pub const INDEX_CONTENT_TYPE: &str = "text/html";

/// Index pages are the only way installers discover new uploads, so
/// caches must always revalidate them.
pub const INDEX_CACHE_CONTROL: &str = "public, must-revalidate, proxy-revalidate, max-age=0";

/// Bucket layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreConfig {
    /// Key prefix below which the whole index lives.
    pub prefix: Option<String>,
    /// Store index pages as explicit `index.html` objects (static website hosting).
    pub index_compat: bool,
}

/// Content type for a distribution file, by extension.
pub fn distribution_content_type(filename: &str) -> &'static str {
    if filename.ends_with(".whl") || filename.ends_with(".zip") {
        "application/zip"
    } else if filename.ends_with(".tar.gz") || filename.ends_with(".tgz") {
        "application/x-gzip"
    } else {
        "application/octet-stream"
    }
}

/// Index pages and distributions of one bucket.
pub struct IndexStore {
    objects: Arc<dyn ObjectStore>,
    keys: KeyResolver,
}

impl std::fmt::Debug for IndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexStore")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl IndexStore {
    pub fn new(objects: Arc<dyn ObjectStore>, cfg: &StoreConfig) -> Self {
        Self {
            objects,
            keys: KeyResolver::new(cfg.prefix.as_deref(), cfg.index_compat),
        }
    }

    pub fn keys(&self) -> &KeyResolver {
        &self.keys
    }

    /// Current index of `directory`; a directory never published yields an
    /// empty index.
    pub fn get_index(&self, directory: &str) -> Result<Index, BackendError> {
        let key = self.keys.index_key(directory);
        match self.objects.get(&key) {
            Ok(body) => Ok(Index::parse(&String::from_utf8_lossy(&body))),
            Err(e) if e.is_not_found() => {
                log::debug!("no index at {key}, starting empty");
                Ok(Index::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Persist the index of `directory`. An empty index is deleted instead.
    pub fn put_index(&self, directory: &str, index: &Index) -> Result<(), BackendError> {
        if index.is_empty() {
            return self.delete_index(directory);
        }
        let key = self.keys.index_key(directory);
        let opts = PutOptions {
            content_type: Some(INDEX_CONTENT_TYPE.to_string()),
            cache_control: Some(INDEX_CACHE_CONTROL.to_string()),
        };
        log::debug!("writing index {key} ({} entries)", index.len());
        self.objects.put(&key, index.to_html().as_bytes(), &opts)
    }

    /// Remove the index object of `directory`.
    pub fn delete_index(&self, directory: &str) -> Result<(), BackendError> {
        let key = self.keys.index_key(directory);
        log::debug!("deleting index {key}");
        self.objects.delete(&key)
    }

    /// Upload a local distribution into `directory`, returning its hash.
    pub fn put_distribution(&self, directory: &str, local_path: &Path) -> Result<Hash, BackendError> {
        let filename = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                BackendError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("not a file: {}", local_path.display()),
                ))
            })?;
        let hash = Hash::of_file(local_path)?;
        let opts = PutOptions {
            content_type: Some(distribution_content_type(&filename).to_string()),
            cache_control: None,
        };
        self.objects
            .put_file(&self.keys.key(directory, &filename), local_path, &opts)?;
        Ok(hash)
    }

    /// Delete one object of `directory`.
    pub fn delete(&self, directory: &str, filename: &str) -> Result<(), BackendError> {
        self.objects.delete(&self.keys.key(directory, filename))
    }

    /// Names of the package directories currently in the bucket.
    pub fn list_directories(&self) -> Result<Vec<String>, BackendError> {
        let root = self.keys.list_prefix();
        let mut dirs: Vec<String> = self
            .objects
            .list_prefixes(&root)?
            .into_iter()
            .filter_map(|p| {
                let name = p.strip_prefix(&root)?.trim_end_matches('/');
                (!name.is_empty()).then(|| name.to_string())
            })
            .collect();
        dirs.sort();
        dirs.dedup();
        Ok(dirs)
    }

    /// Root index listing every directory found in the bucket.
    pub fn build_root_index(&self) -> Result<Index, BackendError> {
        Ok(self
            .list_directories()?
            .into_iter()
            .map(|dir| (format!("{dir}/"), None::<Hash>))
            .collect())
    }

    /// Root index as currently stored.
    pub fn get_root_index(&self) -> Result<Index, BackendError> {
        self.get_index(ROOT)
    }

    pub fn put_root_index(&self, index: &Index) -> Result<(), BackendError> {
        self.put_index(ROOT, index)
    }
}
