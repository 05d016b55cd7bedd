mod efivarfs;
mod store;
mod update;

use anyhow::Result;
use clap::Parser;
use efiboot_shared::PartitionUuid;
use efivarfs::{Efivarfs, EFIVARS_DIR};
use env_logger::Env;
use std::{io, path::PathBuf};
use update::{update_load_options, UpdateOptions};

/// Replace the partition UUID of every UEFI boot entry that refers to CUR_UUID with NEW_UUID.
#[derive(Parser, Debug)]
#[clap(name = "eos-update-efi-uuid")]
struct Options {
    /// Dump every boot entry before and after the change.
    #[clap(short, long)]
    verbose: bool,
    /// Report what would change without writing any variable.
    #[clap(short = 'n', long)]
    dry_run: bool,
    /// Where efivarfs is mounted.
    #[clap(long, default_value = EFIVARS_DIR)]
    efivars_dir: PathBuf,
    /// UUID of the partition the boot entries currently use.
    #[clap(value_name = "CUR_UUID")]
    current: PartitionUuid,
    /// UUID the boot entries should use instead.
    #[clap(value_name = "NEW_UUID")]
    replacement: PartitionUuid,
}

fn main() -> Result<()> {
    let options = Options::parse();

    let level = if options.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let mut store = Efivarfs::open(&options.efivars_dir)?;
    let update_options = UpdateOptions {
        current: options.current,
        replacement: options.replacement,
        verbose: options.verbose,
        dry_run: options.dry_run,
    };

    let report = update_load_options(&mut store, &update_options, &mut io::stdout().lock())?;

    let problems = report
        .skipped
        .iter()
        .filter(|(_, skip)| skip.is_problem())
        .count();
    log::info!(
        "Updated {} boot entries, skipped {} ({problems} unusable)",
        report.updated.len(),
        report.skipped.len()
    );

    Ok(())
}
