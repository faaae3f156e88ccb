//! Configuration loading from TOML files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use pyndex_core::S3Config;

/// Global configuration for pyndex
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub lock: LockConfig,
    pub upload: UploadConfig,
}

/// Where buckets live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Amazon S3 or an S3-compatible service
    #[default]
    S3,
    /// Local directory tree, one subdirectory per bucket
    Fs,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::S3 => write!(f, "s3"),
            Self::Fs => write!(f, "fs"),
        }
    }
}

/// Storage location and S3 credentials.
///
/// S3 settings left unset fall back to the `AWS_*` environment variables
/// and then to instance or container credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: Backend,
    /// S3-compatible endpoint; unset targets AWS
    #[serde(deserialize_with = "deserialize_env_var")]
    pub endpoint: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub region: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub access_key_id: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub secret_access_key: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub session_token: Option<String>,
    /// Send anonymous requests (public buckets, unauthenticated gateways)
    pub unsigned: bool,
    pub root: PathBuf,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub prefix: Option<String>,
    pub index_compat: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            endpoint: None,
            region: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            unsigned: false,
            root: PathBuf::from("./buckets"),
            prefix: None,
            index_compat: false,
        }
    }
}

impl StorageConfig {
    /// S3 client settings from this section.
    pub fn s3(&self) -> S3Config {
        S3Config {
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            session_token: self.session_token.clone(),
            unsigned: self.unsigned,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub retry_delay_ms: u64,
    pub max_attempts: u32,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub owner: Option<String>,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: 1000,
            max_attempts: 10,
            owner: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(default)]
pub struct UploadConfig {
    pub lock_indexes: bool,
    pub put_root_index: bool,
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./pyndex.toml (current directory)
    /// 2. ~/.config/pyndex/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("pyndex.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "pyndex") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}
