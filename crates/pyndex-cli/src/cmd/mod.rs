//! Subcommands and the storage/lock wiring they share

pub mod delete;
pub mod force_unlock;
pub mod upload;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Args;

use pyndex_core::S3Config;
use pyndex_lock::{FsLockTable, LockTable, Locker, LockerConfig, S3LockTable, default_owner};
use pyndex_store::{FsObjectStore, ObjectStore, S3ObjectStore, StoreConfig};

use crate::config::{Backend, Config, LockConfig};

/// Where buckets and lock tables are reached.
#[derive(Args, Debug, Clone, Default)]
pub struct BackendArgs {
    /// Storage backend [default: from config, else s3]
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// S3-compatible endpoint URL [default: AWS]
    #[arg(long)]
    pub endpoint: Option<String>,

    /// S3 region
    #[arg(long)]
    pub region: Option<String>,

    /// S3 access key id
    #[arg(long)]
    pub access_key_id: Option<String>,

    /// S3 secret access key
    #[arg(long)]
    pub secret_access_key: Option<String>,

    /// S3 session token (temporary credentials)
    #[arg(long)]
    pub session_token: Option<String>,

    /// Send unsigned (anonymous) S3 requests
    #[arg(long)]
    pub unsigned: bool,

    /// Directory holding the buckets (fs backend)
    #[arg(long)]
    pub root: Option<PathBuf>,
}

/// Resolved storage location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    S3(S3Config),
    Fs { root: PathBuf },
}

impl BackendArgs {
    /// Command line values over config values.
    pub fn location(&self, config: &Config) -> Location {
        match self.backend.unwrap_or(config.storage.backend) {
            Backend::S3 => {
                let mut s3 = config.storage.s3();
                let overrides = [
                    (&mut s3.endpoint, &self.endpoint),
                    (&mut s3.region, &self.region),
                    (&mut s3.access_key_id, &self.access_key_id),
                    (&mut s3.secret_access_key, &self.secret_access_key),
                    (&mut s3.session_token, &self.session_token),
                ];
                for (setting, arg) in overrides {
                    if arg.is_some() {
                        setting.clone_from(arg);
                    }
                }
                s3.unsigned |= self.unsigned;
                Location::S3(s3)
            }
            Backend::Fs => Location::Fs {
                root: self.root.clone().unwrap_or_else(|| config.storage.root.clone()),
            },
        }
    }
}

impl Location {
    /// Object store for `bucket`; `put_headers` go with every S3 write.
    pub fn object_store(
        &self,
        bucket: &str,
        put_headers: &[(String, String)],
    ) -> Result<Arc<dyn ObjectStore>> {
        Ok(match self {
            Self::S3(s3) => Arc::new(S3ObjectStore::new(s3, bucket, put_headers)?),
            Self::Fs { root } => Arc::new(FsObjectStore::new(&root.join(bucket))),
        })
    }

    pub fn lock_table(&self, table: &str) -> Result<Arc<dyn LockTable>> {
        Ok(match self {
            Self::S3(s3) => Arc::new(S3LockTable::new(s3, table)?),
            Self::Fs { root } => Arc::new(FsLockTable::new(&root.join(table))),
        })
    }
}

/// Options of commands that modify a bucket's index.
#[derive(Args, Debug, Clone)]
pub struct BucketArgs {
    /// Bucket holding the index
    #[arg(short, long)]
    pub bucket: String,

    /// Key prefix of the index inside the bucket
    #[arg(long)]
    pub prefix: Option<String>,

    /// Store index pages as `<dir>/index.html` (static website hosting)
    #[arg(long)]
    pub index_compat: bool,

    /// Fail if the lock table is missing instead of running without locks
    #[arg(long)]
    pub lock_indexes: bool,

    /// Lock table name [default: <bucket>-locks]
    #[arg(long)]
    pub lock_table: Option<String>,

    #[command(flatten)]
    pub backend: BackendArgs,
}

impl BucketArgs {
    pub fn store_config(&self, config: &Config) -> StoreConfig {
        StoreConfig {
            prefix: self.prefix.clone().or_else(|| config.storage.prefix.clone()),
            index_compat: self.index_compat || config.storage.index_compat,
        }
    }

    pub fn lock_table_name(&self) -> String {
        self.lock_table
            .clone()
            .unwrap_or_else(|| format!("{}-locks", self.bucket))
    }

    /// Locker for this bucket.
    ///
    /// Without `--lock-indexes` (or `lock_indexes` in the config) a missing
    /// lock table silently disables locking.
    pub fn locker(&self, config: &Config) -> Result<Locker> {
        let location = self.backend.location(config);
        let name = self.lock_table_name();
        let table = location.lock_table(&name)?;
        let required = self.lock_indexes || config.upload.lock_indexes;
        if required && !table.exists()? {
            bail!("lock table {name} does not exist");
        }
        Ok(Locker::build(Some(table), !required, locker_config(&config.lock))?)
    }
}

pub fn locker_config(lock: &LockConfig) -> LockerConfig {
    LockerConfig {
        retry_delay: Duration::from_millis(lock.retry_delay_ms),
        max_attempts: lock.max_attempts,
        owner: lock.owner.clone().unwrap_or_else(default_owner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket_args(bucket: &str) -> BucketArgs {
        BucketArgs {
            bucket: bucket.to_string(),
            prefix: None,
            index_compat: false,
            lock_indexes: false,
            lock_table: None,
            backend: BackendArgs::default(),
        }
    }

    #[test]
    fn command_line_overrides_config() {
        let mut config = Config::default();
        config.storage.backend = Backend::Fs;
        config.storage.root = PathBuf::from("/srv");

        let args = BackendArgs::default();
        assert_eq!(
            args.location(&config),
            Location::Fs {
                root: PathBuf::from("/srv")
            }
        );

        config.storage.region = Some("us-west-2".into());
        config.storage.access_key_id = Some("from-config".into());
        let args = BackendArgs {
            backend: Some(Backend::S3),
            endpoint: Some("http://localhost:9000".into()),
            access_key_id: Some("from-flag".into()),
            unsigned: true,
            ..Default::default()
        };
        assert_eq!(
            args.location(&config),
            Location::S3(S3Config {
                region: Some("us-west-2".into()),
                endpoint: Some("http://localhost:9000".into()),
                access_key_id: Some("from-flag".into()),
                unsigned: true,
                ..Default::default()
            })
        );
    }

    #[test]
    fn s3_location_builds_backends() {
        let location = Location::S3(S3Config {
            endpoint: Some("http://localhost:9000".into()),
            unsigned: true,
            ..Default::default()
        });
        let headers = pyndex_store::put_headers(Some("private"), None);
        assert!(location.object_store("pypi", &headers).is_ok());
        assert_eq!(location.lock_table("pypi-locks").unwrap().name(), "pypi-locks");
    }

    #[test]
    fn default_lock_table_name() {
        assert_eq!(bucket_args("pypi").lock_table_name(), "pypi-locks");
        let mut args = bucket_args("pypi");
        args.lock_table = Some("shared".into());
        assert_eq!(args.lock_table_name(), "shared");
    }

    #[test]
    fn store_config_merges_prefix() {
        let mut config = Config::default();
        config.storage.prefix = Some("simple".into());
        assert_eq!(
            bucket_args("pypi").store_config(&config).prefix.as_deref(),
            Some("simple")
        );
    }

    #[test]
    fn fs_locker_follows_table_presence() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.backend = Backend::Fs;
        config.storage.root = dir.path().to_path_buf();

        let mut args = bucket_args("pypi");
        assert!(!args.locker(&config).unwrap().is_enabled());

        args.lock_indexes = true;
        let err = args.locker(&config).unwrap_err();
        assert!(err.to_string().contains("pypi-locks"));

        std::fs::create_dir(dir.path().join("pypi-locks")).unwrap();
        assert!(args.locker(&config).unwrap().is_enabled());
    }

    #[test]
    fn locker_config_from_settings() {
        let lock = LockConfig {
            retry_delay_ms: 50,
            max_attempts: 4,
            owner: Some("ci".into()),
        };
        let cfg = locker_config(&lock);
        assert_eq!(cfg.retry_delay, Duration::from_millis(50));
        assert_eq!(cfg.max_attempts, 4);
        assert_eq!(cfg.owner, "ci");
    }
}
