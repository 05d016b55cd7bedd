//! Rewriting the partition UUID of every boot entry using it.
//!
//! Each variable goes through these steps, stopping at the first one that does not apply:
//! - the name must be `BootXXXX` in the global namespace, otherwise it is not even read;
//! - the contents must parse as a load option with a well formed device path;
//! - the device path must contain a GPT Hard Drive Media node with the current UUID;
//! - the UUID is rewritten in place and, unless in dry run mode, written back.
//!
//! Malformed or unsupported entries are skipped. Errors from the store are fatal: after a
//! failed read or write nothing else is touched.

use crate::store::{VariableName, VariableStore, VARIABLE_MODE};
use anyhow::{Context, Result};
use efiboot_shared::{
    diagnostics::Dump, is_load_option, HardDriveMedia, LoadOption, MutationError, ParseError,
    PartitionUuid, WalkError,
};
use std::{fmt::Display, io::Write};

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub current: PartitionUuid,
    pub replacement: PartitionUuid,
    /// Dump every matching entry before and after the change.
    pub verbose: bool,
    /// Do everything except writing the variables back.
    pub dry_run: bool,
}

/// Why a boot entry was left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    Malformed(ParseError),
    MalformedPath(WalkError),
    NoHardDrive,
    /// MBR partition, or a GPT one not identified by GUID.
    Unsupported(HardDriveMedia),
    Rejected(MutationError),
    NotMatching(PartitionUuid),
}

impl Skip {
    /// Whether the entry is broken or of a kind that can never be updated.
    pub fn is_problem(&self) -> bool {
        !matches!(self, Skip::NoHardDrive | Skip::NotMatching(_))
    }
}

impl Display for Skip {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Skip::Malformed(e) => write!(fmt, "{e}"),
            Skip::MalformedPath(e) => write!(fmt, "{e}"),
            Skip::NoHardDrive => write!(fmt, "no Hard Drive Media device path"),
            Skip::Unsupported(hd) => write!(
                fmt,
                "partition {} is not a GPT partition identified by UUID ({:?}, {:?})",
                hd.partition_number, hd.partition_format, hd.signature_type
            ),
            Skip::Rejected(e) => write!(fmt, "{e}"),
            Skip::NotMatching(uuid) => write!(fmt, "uses partition {uuid}"),
        }
    }
}

enum Outcome {
    NotLoadOption,
    Skipped(Skip),
    Updated,
}

/// What happened to the boot entries during a run.
#[derive(Debug, Default)]
pub struct Report {
    pub updated: Vec<String>,
    pub skipped: Vec<(String, Skip)>,
}

fn update_one<S: VariableStore, W: Write>(
    store: &mut S,
    var: &VariableName,
    options: &UpdateOptions,
    out: &mut W,
) -> Result<Outcome> {
    if !is_load_option(&var.vendor, &var.name) {
        return Ok(Outcome::NotLoadOption);
    }

    let variable = store
        .read(var)
        .with_context(|| format!("Reading load option {}", var.name))?;

    let mut option = match LoadOption::parse(variable.data) {
        Ok(option) => option,
        Err(e) => return Ok(Outcome::Skipped(Skip::Malformed(e))),
    };

    let hd = match option.hard_drive_media() {
        Ok(Some(hd)) => hd,
        Ok(None) => return Ok(Outcome::Skipped(Skip::NoHardDrive)),
        Err(e) => return Ok(Outcome::Skipped(Skip::MalformedPath(e))),
    };
    let Some(uuid) = hd.partition_uuid() else {
        return Ok(Outcome::Skipped(Skip::Unsupported(hd)));
    };
    if uuid != options.current {
        return Ok(Outcome::Skipped(Skip::NotMatching(uuid)));
    }

    if options.verbose {
        write!(out, "{}", Dump { name: &var.name, option: &option })?;
    }

    match option.hard_drive_media_mut() {
        Ok(Some(mut hd)) => {
            if let Err(e) = hd.rewrite(&options.replacement) {
                return Ok(Outcome::Skipped(Skip::Rejected(e)));
            }
        }
        Ok(None) => return Ok(Outcome::Skipped(Skip::NoHardDrive)),
        Err(e) => return Ok(Outcome::Skipped(Skip::MalformedPath(e))),
    }

    if options.verbose {
        write!(out, "{}", Dump { name: &var.name, option: &option })?;
    }

    writeln!(
        out,
        "Updating {} HD UUID from {} to {}",
        var.name, options.current, options.replacement
    )?;

    if options.dry_run {
        log::info!("Dry run, not writing {}", var.name);
    } else {
        store
            .write(var, option.as_bytes(), variable.attributes, VARIABLE_MODE)
            .with_context(|| format!("Setting load option {}", var.name))?;
    }

    Ok(Outcome::Updated)
}

/// Runs one pass over all the variables of `store`.
///
/// Operator facing output (confirmations and, if verbose, dumps) goes to `out`.
pub fn update_load_options<S: VariableStore, W: Write>(
    store: &mut S,
    options: &UpdateOptions,
    out: &mut W,
) -> Result<Report> {
    let mut report = Report::default();

    while let Some(var) = store
        .next_variable()
        .context("Getting next EFI variable")?
    {
        match update_one(store, &var, options, out)? {
            Outcome::NotLoadOption => {
                log::info!("Variable {} is not a load option", var.name);
            }
            Outcome::Skipped(skip @ (Skip::NoHardDrive | Skip::NotMatching(_))) => {
                log::info!(
                    "Load option {} does not match partition {}: {skip}",
                    var.name,
                    options.current
                );
                report.skipped.push((var.name, skip));
            }
            Outcome::Skipped(skip) => {
                log::warn!("Skipping load option {}: {skip}", var.name);
                report.skipped.push((var.name, skip));
            }
            Outcome::Updated => report.updated.push(var.name),
        }
    }

    Ok(report)
}
