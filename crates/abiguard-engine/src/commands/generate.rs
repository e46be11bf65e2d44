//! IDL generation

use super::missing_target_key;
use super::snapshot::snapshot_target;
use crate::context::{select_targets, RunContext};
use abiguard_core::errors::Result;
use abiguard_core::logging_facility::ops;
use abiguard_core::{generate_idl, log_op_end, log_op_error, log_op_start, AbiSnapshot, IdlDocument, TargetConfig};
use abiguard_store::artifacts::{ArtifactOutcome, WriteMode};
use abiguard_store::config::LoadedConfig;
use abiguard_store::persist::save_idl;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub target: String,
    pub idl: IdlDocument,
    pub artifact: ArtifactOutcome,
}

/// Configured IDL location as `(filesystem path, display path)`
///
/// # Errors
///
/// `MissingConfigKey` when the target has no `[codegen]` table.
pub fn idl_location(loaded: &LoadedConfig, name: &str, target: &TargetConfig) -> Result<(PathBuf, String)> {
    let codegen = target
        .codegen
        .as_ref()
        .ok_or_else(|| missing_target_key(name, "codegen.idl"))?;
    Ok((loaded.resolve(&codegen.idl), codegen.idl.clone()))
}

/// Render and persist the IDL of an existing snapshot
///
/// # Errors
///
/// Configuration, selection-pattern and store errors.
pub fn write_idl(
    loaded: &LoadedConfig,
    name: &str,
    target: &TargetConfig,
    snapshot: &AbiSnapshot,
    mode: WriteMode,
) -> Result<GenerateOutcome> {
    let (path, display) = idl_location(loaded, name, target)?;
    let idl = generate_idl(snapshot, target.codegen.as_ref())?;
    let artifact = save_idl(&path, &display, &idl, mode)?;
    Ok(GenerateOutcome {
        target: name.to_string(),
        idl,
        artifact,
    })
}

/// Snapshot a target and write its IDL
///
/// # Errors
///
/// Snapshot errors plus everything [`write_idl`] reports.
pub fn generate_target(
    loaded: &LoadedConfig,
    name: &str,
    target: &TargetConfig,
    ctx: &RunContext,
    mode: WriteMode,
) -> Result<GenerateOutcome> {
    let start = Instant::now();
    log_op_start!(ops::GENERATE, target = %name, run_id = %ctx.run_id);

    let result = snapshot_target(loaded, name, target, ctx)
        .and_then(|snapshot| write_idl(loaded, name, target, &snapshot, mode))
        .map_err(|e| {
            if e.target().is_none() {
                e.with_target(name.to_string())
            } else {
                e
            }
        });

    let duration_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(outcome) => {
            log_op_end!(
                ops::GENERATE,
                duration_ms = duration_ms,
                target = %name,
                run_id = %ctx.run_id,
                path = %outcome.artifact.path,
                status = ?outcome.artifact.status
            );
        }
        Err(err) => {
            log_op_error!(ops::GENERATE, err, duration_ms = duration_ms);
        }
    }
    result
}

/// Generate the IDL of every selected target
///
/// # Errors
///
/// The first fatal per-target error.
pub fn run_generate(
    loaded: &LoadedConfig,
    only: Option<&str>,
    ctx: &RunContext,
    mode: WriteMode,
) -> Result<Vec<GenerateOutcome>> {
    select_targets(&loaded.config, only)?
        .into_iter()
        .map(|(name, target)| generate_target(loaded, name, target, ctx, mode))
        .collect()
}
