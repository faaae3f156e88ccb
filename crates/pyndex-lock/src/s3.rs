//! Lock table stored as objects in an S3 bucket.
//!
//! Records are created with `PutMode::Create`, which S3 sends as
//! `If-None-Match: *`. The store refuses the write when the key is already
//! present, with 412 (or 409 on a racing conditional write).

use std::sync::Arc;

use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutMode, PutPayload};

use pyndex_core::s3::block_on;
use pyndex_core::{BackendError, S3Config};

use crate::table::{InsertOutcome, LockRecord, LockTable};

#[derive(Debug, Clone)]
pub struct S3LockTable {
    bucket: String,
    client: Arc<dyn ObjectStore>,
}

impl S3LockTable {
    /// Lock table in the bucket named `table`.
    pub fn new(config: &S3Config, table: &str) -> Result<Self, BackendError> {
        Ok(Self::with_client(table, Arc::new(config.client(table)?)))
    }

    /// Lock table over an already-built client for the bucket `table`.
    pub fn with_client(table: &str, client: Arc<dyn ObjectStore>) -> Self {
        Self {
            bucket: table.to_string(),
            client,
        }
    }
}

fn record_path(lock_id: &str) -> ObjectPath {
    ObjectPath::from(lock_id)
}

/// Map the result of a create-only put to its outcome.
fn insert_outcome(
    result: Result<object_store::PutResult, object_store::Error>,
) -> Result<InsertOutcome, BackendError> {
    match result {
        Ok(_) => Ok(InsertOutcome::Inserted),
        Err(object_store::Error::AlreadyExists { .. } | object_store::Error::Precondition { .. }) => {
            Ok(InsertOutcome::Exists)
        }
        Err(e) => Err(e.into()),
    }
}

/// A listing of a bucket that is not there fails with NoSuchBucket, which
/// not every S3-compatible store maps to a 404.
fn is_missing_bucket(e: &object_store::Error) -> bool {
    matches!(e, object_store::Error::NotFound { .. }) || e.to_string().contains("NoSuchBucket")
}

impl LockTable for S3LockTable {
    fn name(&self) -> &str {
        &self.bucket
    }

    fn exists(&self) -> Result<bool, BackendError> {
        match block_on(self.client.list_with_delimiter(None)) {
            Ok(_) => Ok(true),
            Err(e) if is_missing_bucket(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn insert_if_absent(&self, record: &LockRecord) -> Result<InsertOutcome, BackendError> {
        let payload = PutPayload::from(record.to_json()?.into_bytes());
        let path = record_path(&record.lock_id);
        insert_outcome(block_on(
            self.client.put_opts(&path, payload, PutMode::Create.into()),
        ))
    }

    fn get(&self, lock_id: &str) -> Result<Option<LockRecord>, BackendError> {
        let path = record_path(lock_id);
        let body = block_on(async { self.client.get(&path).await?.bytes().await });
        match body {
            Ok(body) => LockRecord::from_json(&body).map(Some),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, lock_id: &str) -> Result<(), BackendError> {
        match block_on(self.client.delete(&record_path(lock_id))) {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use object_store::memory::InMemory;

    use super::*;
    use crate::lock::{Locker, LockerConfig};

    fn memory_table() -> S3LockTable {
        S3LockTable::with_client("pypi-locks", Arc::new(InMemory::new()))
    }

    #[test]
    fn conflicting_writes_are_exists() {
        let exists = object_store::Error::AlreadyExists {
            path: "abc".to_string(),
            source: "409".into(),
        };
        assert_eq!(insert_outcome(Err(exists)).unwrap(), InsertOutcome::Exists);
        let failed = object_store::Error::Precondition {
            path: "abc".to_string(),
            source: "412".into(),
        };
        assert_eq!(insert_outcome(Err(failed)).unwrap(), InsertOutcome::Exists);
        let denied = object_store::Error::Generic {
            store: "S3",
            source: "403 AccessDenied".into(),
        };
        assert!(insert_outcome(Err(denied)).is_err());
    }

    #[test]
    fn missing_bucket_detection() {
        let missing = object_store::Error::Generic {
            store: "S3",
            source: "Error performing list request: NoSuchBucket".into(),
        };
        assert!(is_missing_bucket(&missing));
        let denied = object_store::Error::Generic {
            store: "S3",
            source: "AccessDenied".into(),
        };
        assert!(!is_missing_bucket(&denied));
    }

    #[test]
    fn builds_from_config() {
        let config = S3Config {
            endpoint: Some("http://localhost:9000".to_string()),
            unsigned: true,
            ..Default::default()
        };
        let table = S3LockTable::new(&config, "pypi-locks").unwrap();
        assert_eq!(table.name(), "pypi-locks");
    }

    #[test]
    fn exclusive_insert() {
        let table = memory_table();
        assert!(table.exists().unwrap());
        let record = LockRecord::new("foo/", "alice");
        assert_eq!(table.insert_if_absent(&record).unwrap(), InsertOutcome::Inserted);
        let other = LockRecord::new("foo/", "bob");
        assert_eq!(table.insert_if_absent(&other).unwrap(), InsertOutcome::Exists);

        let held = table.get(&record.lock_id).unwrap().unwrap();
        assert_eq!(held.owner, "alice");
    }

    #[test]
    fn get_and_delete_missing() {
        let table = memory_table();
        assert!(table.get("nope").unwrap().is_none());
        table.delete("nope").unwrap();
    }

    #[test]
    fn locker_round_trip() {
        let table = Arc::new(memory_table());
        let cfg = LockerConfig {
            retry_delay: Duration::ZERO,
            max_attempts: 2,
            owner: "alice".to_string(),
        };
        let locker = Locker::conditional(table.clone(), cfg);
        let id = pyndex_core::lock_id("foo/");
        locker
            .with_lock("foo/", || {
                assert!(table.get(&id)?.is_some());
                Ok::<_, crate::lock::LockError>(())
            })
            .unwrap();
        assert!(table.get(&id).unwrap().is_none());
    }
}
