//! Error type shared by object-store and lock-table backends

/// Failure reported by a storage backend (object store or lock table).
///
/// `NotFound` is a distinct variant so callers can treat a missing object as
/// an empty value instead of a failure; every other variant propagates.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] object_store::Error),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed data: {0}")]
    Decode(String),
    #[error("invalid backend configuration: {0}")]
    Config(String),
}

impl BackendError {
    /// Check if the error means the addressed object or record does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Store(e) => matches!(e, object_store::Error::NotFound { .. }),
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            Self::Decode(_) | Self::Config(_) => false,
        }
    }
}
