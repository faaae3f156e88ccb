//! The orchestrator tying locks, storage and index pages together

use pyndex_core::ROOT;
use pyndex_lock::Locker;
use pyndex_store::IndexStore;

use crate::error::PublishError;

/// Workflow flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishConfig {
    /// Overwrite files that are already in the index.
    pub force: bool,
    /// Fail after uploading when any file was already in the index.
    pub strict: bool,
    /// Rebuild the root index from a bucket listing after uploading.
    pub put_root_index: bool,
}

/// Runs upload and delete workflows against one bucket.
#[derive(Debug)]
pub struct Publisher {
    pub(crate) store: IndexStore,
    pub(crate) locker: Locker,
    pub(crate) cfg: PublishConfig,
}

impl Publisher {
    pub fn new(store: IndexStore, locker: Locker, cfg: PublishConfig) -> Self {
        Self { store, locker, cfg }
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn locker(&self) -> &Locker {
        &self.locker
    }

    pub fn config(&self) -> &PublishConfig {
        &self.cfg
    }

    /// Replace the root index with the directories currently in the bucket.
    ///
    /// The listing is authoritative: directories missing from it are dropped
    /// from the root index.
    pub fn update_root_index(&self) -> Result<usize, PublishError> {
        self.locker.with_lock(ROOT, || {
            let root = self.store.build_root_index()?;
            log::info!("updating root index ({} directories)", root.len());
            self.store.put_root_index(&root)?;
            Ok(root.len())
        })
    }

    /// Drop `directory` from the root index, if listed.
    pub(crate) fn remove_from_root_index(&self, directory: &str) -> Result<bool, PublishError> {
        self.locker.with_lock(ROOT, || {
            let mut root = self.store.get_root_index()?;
            let removed = root.remove(&format!("{directory}/")) | root.remove(directory);
            if removed {
                log::info!("removing {directory} from root index");
                self.store.put_root_index(&root)?;
            }
            Ok(removed)
        })
    }
}
