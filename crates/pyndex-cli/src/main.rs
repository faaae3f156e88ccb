//! pyndex - PyPI-compatible package index in an object store
//!
//! Uploads distributions and maintains per-package index pages and a root
//! index, serialized across machines by a lock table.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "pyndex")]
#[command(about = "PyPI-compatible package index in an object store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "debug")]
    quiet: bool,

    /// Config file path (default: ./pyndex.toml or ~/.config/pyndex/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Upload distributions and update their index pages
    Upload(cmd::upload::UploadArgs),
    /// Delete all files of one package version
    Delete(cmd::delete::DeleteArgs),
    /// Remove a stuck lock from a lock table
    ForceUnlock(cmd::force_unlock::ForceUnlockArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    pyndex_core::init_logging(cli.quiet, cli.debug);

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Upload(args) => cmd::upload::run(args, &config),
        Command::Delete(args) => cmd::delete::run(args, &config),
        Command::ForceUnlock(args) => cmd::force_unlock::run(args, &config),
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            let storage = &config.storage;
            table.add_row(vec!["Backend", &storage.backend.to_string()]);
            table.add_row(vec![
                "Endpoint",
                storage.endpoint.as_deref().unwrap_or("(AWS)"),
            ]);
            table.add_row(vec![
                "Region",
                storage.region.as_deref().unwrap_or("(from environment)"),
            ]);
            let credentials = if storage.unsigned {
                "none (unsigned)"
            } else if storage.access_key_id.is_some() {
                "from config"
            } else {
                "from environment"
            };
            table.add_row(vec!["S3 credentials", credentials]);
            table.add_row(vec!["Bucket root", &storage.root.display().to_string()]);
            table.add_row(vec!["Prefix", storage.prefix.as_deref().unwrap_or("(none)")]);
            table.add_row(vec!["Index compat", &storage.index_compat.to_string()]);
            table.add_row(vec![
                "Lock retry delay",
                &format!("{}ms", config.lock.retry_delay_ms),
            ]);
            table.add_row(vec!["Lock attempts", &config.lock.max_attempts.to_string()]);
            table.add_row(vec![
                "Lock owner",
                &config
                    .lock
                    .owner
                    .clone()
                    .unwrap_or_else(pyndex_lock::default_owner),
            ]);
            table.add_row(vec![
                "Require lock table",
                &config.upload.lock_indexes.to_string(),
            ]);
            table.add_row(vec![
                "Rebuild root index",
                &config.upload.put_root_index.to_string(),
            ]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}
