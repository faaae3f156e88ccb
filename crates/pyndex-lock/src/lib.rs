//! pyndex-lock: Cross-process mutual exclusion over a conditional-write table
//!
//! A lock is a record in a strongly consistent table; inserting it with an
//! "only if absent" condition acquires the lock and deleting it releases it.
//! Waiters poll with a fixed delay and give up after a bounded number of
//! attempts, reporting who holds the lock.

pub mod fs;
pub mod lock;
pub mod s3;
pub mod table;

pub use fs::FsLockTable;
pub use lock::{LockError, LockGuard, LockToken, Locker, LockerConfig, default_owner, force_unlock};
pub use s3::S3LockTable;
pub use table::{InsertOutcome, LockRecord, LockTable, MemoryLockTable};
