//! Administrative removal of stuck locks

use pyndex_lock::{LockRecord, LockTable};

use crate::error::PublishError;

/// Delete lock `lock_id` from `table`, whoever holds it.
///
/// This is the only way to recover from a process that died while holding
/// a lock. Returns the removed record, if there was one.
pub fn force_unlock(table: &dyn LockTable, lock_id: &str) -> Result<Option<LockRecord>, PublishError> {
    Ok(pyndex_lock::force_unlock(table, lock_id)?)
}
