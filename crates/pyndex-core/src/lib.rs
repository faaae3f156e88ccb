//! Pyndex Core - Shared building blocks for a lock-protected package index
//!
//! This crate holds the pieces with no storage I/O of their own: the
//! index page model and its HTML codec, package-name normalization,
//! object-key resolution, content hashing, plus the S3 client settings and
//! runtime, the backend error type and logging setup used by the storage crates.

pub mod error;
pub mod hash;
pub mod index;
pub mod key;
pub mod logging;
pub mod name;
pub mod s3;

// Re-exports for convenience
pub use error::BackendError;
pub use hash::{HASH_ALGORITHM, lock_id, sha256_bytes, sha256_file};
pub use index::{Hash, Index};
pub use key::{INDEX_HTML, KeyResolver, ROOT, quote_key};
pub use logging::init_logging;
pub use name::normalize_package_name;
pub use s3::S3Config;
