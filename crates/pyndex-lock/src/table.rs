//! Lock records and the conditional-write table they live in

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pyndex_core::{BackendError, lock_id};

/// A held lock. Its presence in the table is the lock itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Table key: [`lock_id`] of `key`.
    pub lock_id: String,
    /// Logical resource name (directory, or `/` for the root index).
    pub key: String,
    /// When the lock was taken (serialized as RFC 3339).
    pub locked_at: DateTime<Utc>,
    /// Identity of the process holding the lock.
    pub owner: String,
}

impl LockRecord {
    /// Record for `key` taken now by `owner`.
    pub fn new(key: &str, owner: &str) -> Self {
        Self {
            lock_id: lock_id(key),
            key: key.to_string(),
            locked_at: Utc::now(),
            owner: owner.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, BackendError> {
        serde_json::to_string(self).map_err(|e| BackendError::Decode(e.to_string()))
    }

    pub fn from_json(data: &[u8]) -> Result<Self, BackendError> {
        serde_json::from_slice(data)
            .map_err(|e| BackendError::Decode(format!("invalid lock record: {e}")))
    }
}

/// Result of a conditional insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record did not exist and is now stored.
    Inserted,
    /// A record with the same id already exists; nothing was written.
    Exists,
}

/// Strongly consistent key/value table with an insert-if-absent primitive.
pub trait LockTable: Send + Sync {
    /// Table identifier, as passed to `force-unlock`.
    fn name(&self) -> &str;

    /// Whether the table is provisioned at all.
    fn exists(&self) -> Result<bool, BackendError>;

    /// Store `record` under its `lock_id` unless a record with that id exists.
    fn insert_if_absent(&self, record: &LockRecord) -> Result<InsertOutcome, BackendError>;

    /// Current record for `lock_id`.
    fn get(&self, lock_id: &str) -> Result<Option<LockRecord>, BackendError>;

    /// Delete the record for `lock_id`. Deleting a missing record succeeds.
    fn delete(&self, lock_id: &str) -> Result<(), BackendError>;
}

/// In-process table, for tests and single-process runs.
#[derive(Debug, Default)]
pub struct MemoryLockTable {
    name: String,
    records: Mutex<HashMap<String, LockRecord>>,
}

impl MemoryLockTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Mutex::default(),
        }
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, LockRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of locks currently held.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

impl LockTable for MemoryLockTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self) -> Result<bool, BackendError> {
        Ok(true)
    }

    fn insert_if_absent(&self, record: &LockRecord) -> Result<InsertOutcome, BackendError> {
        let mut records = self.records();
        if records.contains_key(&record.lock_id) {
            return Ok(InsertOutcome::Exists);
        }
        records.insert(record.lock_id.clone(), record.clone());
        Ok(InsertOutcome::Inserted)
    }

    fn get(&self, lock_id: &str) -> Result<Option<LockRecord>, BackendError> {
        Ok(self.records().get(lock_id).cloned())
    }

    fn delete(&self, lock_id: &str) -> Result<(), BackendError> {
        self.records().remove(lock_id);
        Ok(())
    }
}
