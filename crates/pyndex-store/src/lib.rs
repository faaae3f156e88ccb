//! pyndex-store: Index pages and distribution files in an object store
//!
//! [`ObjectStore`] is the minimal GET/PUT/DELETE/list surface of a bucket;
//! [`IndexStore`] maps directories and filenames onto it through a
//! [`pyndex_core::KeyResolver`] and reads and writes [`pyndex_core::Index`]
//! pages.

pub mod fs;
pub mod index_store;
pub mod object;
pub mod s3;

pub use fs::FsObjectStore;
pub use index_store::{IndexStore, StoreConfig};
pub use object::{MemoryObjectStore, ObjectStore, PutOptions, StoredObject};
pub use s3::{S3ObjectStore, put_headers};
