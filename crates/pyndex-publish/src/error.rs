//! Errors surfaced by the publishing workflows

use std::path::PathBuf;

use pyndex_core::BackendError;
use pyndex_lock::LockError;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Strict mode: some files were already published. Files that did not
    /// conflict have been uploaded regardless.
    #[error("found {count} existing file(s) in the index: {}", filenames.join(", "))]
    Conflicts { count: usize, filenames: Vec<String> },
    #[error("package not found: {name} {version}")]
    PackageNotFound { name: String, version: String },
    #[error("{}: {reason}", path.display())]
    Distribution { path: PathBuf, reason: String },
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("storage: {0}")]
    Storage(#[from] BackendError),
}
