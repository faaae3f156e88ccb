//! `pyndex upload` - publish distributions

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;

use pyndex_publish::{PublishConfig, Publisher};
use pyndex_store::{IndexStore, put_headers};

use super::BucketArgs;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Distribution files or glob patterns (sdists and wheels)
    #[arg(required = true)]
    pub files: Vec<String>,

    #[command(flatten)]
    pub bucket: BucketArgs,

    /// Overwrite files already in the index
    #[arg(long)]
    pub force: bool,

    /// Exit with an error if any file was already in the index
    #[arg(long, conflicts_with = "force")]
    pub strict: bool,

    /// Rebuild the root index from the bucket listing
    #[arg(long)]
    pub put_root_index: bool,

    /// Canned ACL for uploaded objects (s3 backend)
    #[arg(long)]
    pub acl: Option<String>,

    /// Storage class for uploaded objects (s3 backend)
    #[arg(long)]
    pub storage_class: Option<String>,
}

pub fn run(args: UploadArgs, config: &Config) -> Result<()> {
    let paths = expand_files(&args.files)?;

    let location = args.bucket.backend.location(config);
    let headers = put_headers(args.acl.as_deref(), args.storage_class.as_deref());
    let store = IndexStore::new(
        location.object_store(&args.bucket.bucket, &headers)?,
        &args.bucket.store_config(config),
    );
    let locker = args.bucket.locker(config)?;
    let publish = PublishConfig {
        force: args.force,
        strict: args.strict,
        put_root_index: args.put_root_index || config.upload.put_root_index,
    };

    let summary = Publisher::new(store, locker, publish).upload_paths(&paths)?;
    log::info!(
        "{} file(s) uploaded, {} skipped",
        summary.uploaded.len(),
        summary.conflicts.len()
    );
    Ok(())
}

/// Resolve file arguments: existing paths are taken as-is, anything else is
/// expanded as a glob pattern that must match at least one file.
fn expand_files(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        if Path::new(pattern).is_file() {
            paths.push(PathBuf::from(pattern));
            continue;
        }
        let matched: Vec<PathBuf> = glob::glob(pattern)
            .with_context(|| format!("invalid file pattern: {pattern}"))?
            .filter_map(|entry| entry.ok())
            .filter(|p| p.is_file())
            .collect();
        if matched.is_empty() {
            bail!("no files match {pattern}");
        }
        paths.extend(matched);
    }
    Ok(paths)
}
