//! Snapshot orchestration
//!
//! header extraction → binary export check → snapshot assembly.
//! The binary step is skipped when the run asks for it and reported as
//! not configured when the target has no `[binary]` table.

use crate::context::{select_targets, RunContext};
use abiguard_core::config::BinaryConfig;
use abiguard_core::errors::Result;
use abiguard_core::exports::ExportSource;
use abiguard_core::header::{extract_header, HeaderRequest, ParserSettings};
use abiguard_core::logging_facility::ops;
use abiguard_core::snapshot::{assemble_snapshot, check_binary, BinaryPlan};
use abiguard_core::{log_op_end, log_op_error, log_op_start, AbiSnapshot, TargetConfig};
use abiguard_store::artifacts::{ArtifactOutcome, WriteMode};
use abiguard_store::config::LoadedConfig;
use abiguard_store::persist::save_snapshot;
use std::path::Path;
use std::time::Instant;

fn binary_plan(loaded: &LoadedConfig, binary: Option<&BinaryConfig>, skip: bool) -> BinaryPlan {
    let Some(binary) = binary else {
        return BinaryPlan::NotConfigured;
    };
    if skip {
        return BinaryPlan::Skip;
    }
    let (source, display_path) = match (&binary.exports_listing, binary.listing_format, &binary.path) {
        (Some(listing), Some(format), _) => (
            ExportSource::Listing {
                path: loaded.resolve(listing),
                format,
            },
            listing.clone(),
        ),
        (_, _, Some(path)) => (ExportSource::Binary(loaded.resolve(path)), path.clone()),
        // Validation guarantees a path or a complete listing
        _ => return BinaryPlan::NotConfigured,
    };
    BinaryPlan::Check {
        source,
        display_path,
        allow_non_prefixed_exports: binary.allow_non_prefixed_exports,
    }
}

fn snapshot_inner(
    loaded: &LoadedConfig,
    name: &str,
    target: &TargetConfig,
    ctx: &RunContext,
) -> Result<AbiSnapshot> {
    let request = HeaderRequest::from_config(name, &target.header, &loaded.base_dir)?;
    let settings = ParserSettings::from_config(&target.header, &loaded.base_dir);
    let extraction = extract_header(&request, &settings, ctx.flags.no_fallback)?;

    let plan = binary_plan(loaded, target.binary.as_ref(), ctx.flags.skip_binary);
    let binary = check_binary(
        &plan,
        name,
        &extraction.header.functions,
        &target.header.symbol_prefix,
    )?;

    assemble_snapshot(name, &target.header.path, extraction, binary, ctx.now)
}

/// Build a fresh snapshot of one target
///
/// # Errors
///
/// Extraction, export-reader and assembly errors, tagged with the target.
pub fn snapshot_target(
    loaded: &LoadedConfig,
    name: &str,
    target: &TargetConfig,
    ctx: &RunContext,
) -> Result<AbiSnapshot> {
    let start = Instant::now();
    log_op_start!(ops::SNAPSHOT, target = %name, run_id = %ctx.run_id);

    let result = snapshot_inner(loaded, name, target, ctx).map_err(|e| {
        if e.target().is_none() {
            e.with_target(name.to_string())
        } else {
            e
        }
    });

    let duration_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(snapshot) => {
            log_op_end!(
                ops::SNAPSHOT,
                duration_ms = duration_ms,
                target = %name,
                run_id = %ctx.run_id,
                function_count = snapshot.functions.len(),
                binary = snapshot.binary.status()
            );
        }
        Err(err) => {
            log_op_error!(ops::SNAPSHOT, err, duration_ms = duration_ms);
        }
    }
    result
}

/// Snapshot every selected target
///
/// # Errors
///
/// The first fatal per-target error.
pub fn run_snapshot(
    loaded: &LoadedConfig,
    only: Option<&str>,
    ctx: &RunContext,
) -> Result<Vec<AbiSnapshot>> {
    select_targets(&loaded.config, only)?
        .into_iter()
        .map(|(name, target)| snapshot_target(loaded, name, target, ctx))
        .collect()
}

/// Write a snapshot to `out`, leaving an unchanged file alone
///
/// # Errors
///
/// `Serialization`/`Io` from the store.
pub fn write_snapshot(out: &Path, snapshot: &AbiSnapshot) -> Result<ArtifactOutcome> {
    save_snapshot(out, &out.display().to_string(), snapshot, WriteMode::Write)
}
