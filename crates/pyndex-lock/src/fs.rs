//! Lock table backed by a local (or shared) directory.
//!
//! Each record is `{dir}/{lock_id}.json`. A record is written in full to a
//! temporary file first and then linked into place without clobbering, so
//! the insert fails atomically when the record exists and readers never see
//! a partial record.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use pyndex_core::BackendError;

use crate::table::{InsertOutcome, LockRecord, LockTable};

#[derive(Debug, Clone)]
pub struct FsLockTable {
    name: String,
    dir: PathBuf,
}

impl FsLockTable {
    /// Table stored in `dir`; the directory name is the table name.
    pub fn new(dir: &Path) -> Self {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());
        Self {
            name,
            dir: dir.to_path_buf(),
        }
    }

    /// Create the table directory if needed.
    pub fn create(dir: &Path) -> Result<Self, BackendError> {
        fs::create_dir_all(dir)?;
        Ok(Self::new(dir))
    }

    fn record_path(&self, lock_id: &str) -> PathBuf {
        self.dir.join(format!("{lock_id}.json"))
    }
}

impl LockTable for FsLockTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self) -> Result<bool, BackendError> {
        Ok(self.dir.is_dir())
    }

    fn insert_if_absent(&self, record: &LockRecord) -> Result<InsertOutcome, BackendError> {
        let path = self.record_path(&record.lock_id);
        let json = record.to_json()?;
        let mut file = NamedTempFile::new_in(&self.dir)?;
        file.write_all(json.as_bytes())?;
        file.as_file().sync_all()?;
        // Dropping the temp file on any path below removes it.
        match file.persist_noclobber(&path) {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(InsertOutcome::Exists),
            Err(e) => Err(e.error.into()),
        }
    }

    fn get(&self, lock_id: &str) -> Result<Option<LockRecord>, BackendError> {
        match fs::read(self.record_path(lock_id)) {
            Ok(data) => LockRecord::from_json(&data).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, lock_id: &str) -> Result<(), BackendError> {
        match fs::remove_file(self.record_path(lock_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_directory_name() {
        let dir = tempfile::tempdir().unwrap();
        let table = FsLockTable::create(&dir.path().join("pypi-locks")).unwrap();
        assert_eq!(table.name(), "pypi-locks");
        assert!(table.exists().unwrap());
    }

    #[test]
    fn missing_directory_does_not_exist() {
        let dir = tempfile::tempdir().unwrap();
        let table = FsLockTable::new(&dir.path().join("nope"));
        assert!(!table.exists().unwrap());
    }

    #[test]
    fn exclusive_insert() {
        let dir = tempfile::tempdir().unwrap();
        let table = FsLockTable::create(dir.path()).unwrap();
        let first = LockRecord::new("foo", "a");
        let second = LockRecord::new("foo", "b");

        assert_eq!(table.insert_if_absent(&first).unwrap(), InsertOutcome::Inserted);
        assert_eq!(table.insert_if_absent(&second).unwrap(), InsertOutcome::Exists);
        assert_eq!(table.get(&first.lock_id).unwrap(), Some(first));
    }

    #[test]
    fn insert_leaves_only_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let table = FsLockTable::create(dir.path()).unwrap();
        let record = LockRecord::new("foo", "a");
        table.insert_if_absent(&record).unwrap();
        table.insert_if_absent(&LockRecord::new("foo", "b")).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, [format!("{}.json", record.lock_id)]);
    }

    #[test]
    fn racing_readers_never_see_partial_records() {
        let dir = tempfile::tempdir().unwrap();
        let table = FsLockTable::create(dir.path()).unwrap();
        let id = pyndex_core::lock_id("foo");

        std::thread::scope(|s| {
            let writer = s.spawn(|| {
                for i in 0..200 {
                    let record = LockRecord::new("foo", &format!("owner-{i}"));
                    table.insert_if_absent(&record).unwrap();
                    table.delete(&record.lock_id).unwrap();
                }
            });
            while !writer.is_finished() {
                if let Some(record) = table.get(&id).unwrap() {
                    assert!(record.owner.starts_with("owner-"));
                }
            }
        });
    }

    #[test]
    fn delete_then_reinsert() {
        let dir = tempfile::tempdir().unwrap();
        let table = FsLockTable::create(dir.path()).unwrap();
        let record = LockRecord::new("foo", "a");

        table.insert_if_absent(&record).unwrap();
        table.delete(&record.lock_id).unwrap();
        assert_eq!(table.get(&record.lock_id).unwrap(), None);
        assert_eq!(table.insert_if_absent(&record).unwrap(), InsertOutcome::Inserted);
    }

    #[test]
    fn delete_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let table = FsLockTable::create(dir.path()).unwrap();
        table.delete("0000").unwrap();
    }

    #[test]
    fn insert_into_missing_table_fails() {
        let dir = tempfile::tempdir().unwrap();
        let table = FsLockTable::new(&dir.path().join("nope"));
        assert!(table.insert_if_absent(&LockRecord::new("foo", "a")).is_err());
    }
}
