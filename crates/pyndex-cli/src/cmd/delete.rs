//! `pyndex delete` - remove one version of a package

use anyhow::Result;
use clap::Args;

use pyndex_publish::{PublishConfig, Publisher};
use pyndex_store::IndexStore;

use super::BucketArgs;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Package name
    pub name: String,

    /// Version whose files are removed
    pub version: String,

    #[command(flatten)]
    pub bucket: BucketArgs,
}

pub fn run(args: DeleteArgs, config: &Config) -> Result<()> {
    let location = args.bucket.backend.location(config);
    let store = IndexStore::new(
        location.object_store(&args.bucket.bucket, &[])?,
        &args.bucket.store_config(config),
    );
    let locker = args.bucket.locker(config)?;

    let summary = Publisher::new(store, locker, PublishConfig::default())
        .delete(&args.name, &args.version)?;
    log::info!(
        "deleted {} file(s) of {} {}",
        summary.deleted.len(),
        summary.directory,
        args.version
    );
    if summary.index_removed {
        log::info!("{} has no files left, index removed", summary.directory);
    }
    Ok(())
}
