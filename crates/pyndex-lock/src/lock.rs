//! Acquire/release protocol over a [`LockTable`]

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use pyndex_core::{BackendError, lock_id};

use crate::table::{InsertOutcome, LockRecord, LockTable};

/// Polling parameters and identity used when acquiring locks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockerConfig {
    /// Sleep after each refused insert attempt.
    pub retry_delay: Duration,
    /// Insert attempts before giving up (at least one is always made). A
    /// held lock is waited on for `max_attempts * retry_delay` in total.
    pub max_attempts: u32,
    /// Identity recorded in the lock record, reported to waiters on timeout.
    pub owner: String,
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(1),
            max_attempts: 10,
            owner: default_owner(),
        }
    }
}

/// `user@host:pid` of the current process, from the environment.
pub fn default_owner() -> String {
    let env_or = |names: &[&str], fallback: &str| {
        names
            .iter()
            .find_map(|n| std::env::var(n).ok().filter(|v| !v.is_empty()))
            .unwrap_or_else(|| fallback.to_string())
    };
    let user = env_or(&["USER", "USERNAME"], "unknown");
    let host = env_or(&["HOSTNAME", "COMPUTERNAME"], "localhost");
    format!("{user}@{host}:{}", std::process::id())
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error(
        "timed out acquiring lock on '{key}' after {attempts} attempts: held by {owner} since \
         {locked_at}; if that process is gone, run `pyndex force-unlock {table} {lock_id}`"
    )]
    Timeout {
        key: String,
        lock_id: String,
        table: String,
        owner: String,
        locked_at: String,
        attempts: u32,
    },
    #[error("lock table: {0}")]
    Table(#[from] BackendError),
}

/// Proof of acquisition returned by [`Locker::acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub key: String,
    /// Table record id; `None` when locking is disabled.
    pub lock_id: Option<String>,
    pub acquired_at: DateTime<Utc>,
}

/// Lock provider selected by configuration.
pub enum Locker {
    /// Locking disabled: every acquire succeeds immediately.
    Noop,
    /// Mutual exclusion through conditional inserts into `table`.
    Conditional {
        table: Arc<dyn LockTable>,
        cfg: LockerConfig,
    },
}

impl fmt::Debug for Locker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Noop => f.write_str("Noop"),
            Self::Conditional { table, cfg } => f
                .debug_struct("Conditional")
                .field("table", &table.name())
                .field("cfg", cfg)
                .finish(),
        }
    }
}

impl Locker {
    pub fn conditional(table: Arc<dyn LockTable>, cfg: LockerConfig) -> Self {
        Self::Conditional { table, cfg }
    }

    /// Select the variant for a configuration.
    ///
    /// No table means locking is disabled. With `discover`, a table that
    /// does not exist also disables locking instead of failing later.
    pub fn build(
        table: Option<Arc<dyn LockTable>>,
        discover: bool,
        cfg: LockerConfig,
    ) -> Result<Self, LockError> {
        let Some(table) = table else {
            return Ok(Self::Noop);
        };
        if discover && !table.exists()? {
            log::info!("lock table {} not found, index locking disabled", table.name());
            return Ok(Self::Noop);
        }
        log::debug!("using lock table {}", table.name());
        Ok(Self::Conditional { table, cfg })
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Conditional { .. })
    }

    /// Table backing this locker, if any.
    pub fn table(&self) -> Option<&Arc<dyn LockTable>> {
        match self {
            Self::Noop => None,
            Self::Conditional { table, .. } => Some(table),
        }
    }

    /// Acquire the lock on `key`, polling until it is free or attempts run out.
    pub fn acquire(&self, key: &str) -> Result<LockToken, LockError> {
        let (table, cfg) = match self {
            Self::Noop => {
                return Ok(LockToken {
                    key: key.to_string(),
                    lock_id: None,
                    acquired_at: Utc::now(),
                });
            }
            Self::Conditional { table, cfg } => (table, cfg),
        };

        let max_attempts = cfg.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let record = LockRecord::new(key, &cfg.owner);
            match table.insert_if_absent(&record)? {
                InsertOutcome::Inserted => {
                    log::info!("locked {key} ({})", record.lock_id);
                    return Ok(LockToken {
                        key: key.to_string(),
                        lock_id: Some(record.lock_id),
                        acquired_at: record.locked_at,
                    });
                }
                InsertOutcome::Exists => {
                    log::debug!("{key}: locked by another process, attempt {attempt}/{max_attempts}");
                    std::thread::sleep(cfg.retry_delay);
                }
            }
        }

        // The timeout is the error to report; a holder that cannot be read
        // only degrades the message.
        let id = lock_id(key);
        let (owner, locked_at) = match table.get(&id) {
            Ok(Some(record)) => (record.owner, record.locked_at.to_rfc3339()),
            Ok(None) => ("<released>".to_string(), "<unknown>".to_string()),
            Err(e) => {
                log::warn!("cannot read holder of lock {id}: {e}");
                ("<unknown>".to_string(), "<unknown>".to_string())
            }
        };
        Err(LockError::Timeout {
            key: key.to_string(),
            lock_id: id,
            table: table.name().to_string(),
            owner,
            locked_at,
            attempts: max_attempts,
        })
    }

    /// Release the lock on `key` unconditionally.
    pub fn release(&self, key: &str) -> Result<(), LockError> {
        if let Self::Conditional { table, .. } = self {
            table.delete(&lock_id(key))?;
            log::info!("unlocked {key}");
        }
        Ok(())
    }

    /// Acquire `key` and return a guard that releases it when dropped.
    pub fn guard(&self, key: &str) -> Result<LockGuard<'_>, LockError> {
        let token = self.acquire(key)?;
        Ok(LockGuard {
            locker: self,
            token,
            released: false,
        })
    }

    /// Run `f` while holding the lock on `key`.
    ///
    /// The lock is released on every exit path. If both `f` and the release
    /// fail, the error from `f` is returned and the release error is logged.
    pub fn with_lock<T, E>(&self, key: &str, f: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<LockError>,
    {
        let guard = self.guard(key)?;
        let result = f();
        let released = guard.release();
        match (result, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                log::error!("failed to release lock on {key}: {release_err}");
                Err(e)
            }
        }
    }
}

/// Held lock; released by [`LockGuard::release`] or, best effort, on drop.
pub struct LockGuard<'a> {
    locker: &'a Locker,
    token: LockToken,
    released: bool,
}

impl LockGuard<'_> {
    pub fn token(&self) -> &LockToken {
        &self.token
    }

    /// Release now, reporting failure.
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        self.locker.release(&self.token.key)
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.locker.release(&self.token.key) {
                log::error!("failed to release lock on {}: {e}", self.token.key);
            }
        }
    }
}

/// Delete the record `lock_id` from `table` regardless of its owner.
///
/// Returns the removed record, or `None` if no such lock was held.
pub fn force_unlock(table: &dyn LockTable, lock_id: &str) -> Result<Option<LockRecord>, LockError> {
    let record = table.get(lock_id)?;
    table.delete(lock_id)?;
    match &record {
        Some(r) => log::info!(
            "removed lock {lock_id} on '{}' held by {} since {}",
            r.key,
            r.owner,
            r.locked_at.to_rfc3339()
        ),
        None => log::warn!("lock {lock_id} not found in table {}", table.name()),
    }
    Ok(record)
}
