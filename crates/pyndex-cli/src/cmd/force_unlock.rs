//! `pyndex force-unlock` - remove a lock left behind by a dead process

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use pyndex_lock::LockRecord;

use super::BackendArgs;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct ForceUnlockArgs {
    /// Lock table name (e.g. `<bucket>-locks`)
    pub table: String,

    /// Lock id, as printed by the timed-out command
    pub lock_id: String,

    #[command(flatten)]
    pub backend: BackendArgs,
}

pub fn run(args: ForceUnlockArgs, config: &Config) -> Result<()> {
    let table = args.backend.location(config).lock_table(&args.table)?;
    match pyndex_publish::force_unlock(&*table, &args.lock_id)? {
        Some(record) => eprintln!("\n{}", record_table(&record)),
        None => eprintln!("No lock {} in {}.", args.lock_id, args.table),
    }
    Ok(())
}

fn record_table(record: &LockRecord) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Removed lock").fg(Color::Cyan),
            Cell::new("").fg(Color::Cyan),
        ]);
    table.add_row(vec!["Key", record.key.as_str()]);
    table.add_row(vec!["Lock id", record.lock_id.as_str()]);
    table.add_row(vec!["Owner", record.owner.as_str()]);
    table.add_row(vec!["Locked at", &record.locked_at.to_rfc3339()]);
    table
}
