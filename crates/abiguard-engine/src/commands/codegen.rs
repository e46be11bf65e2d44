//! Codegen orchestration
//!
//! Reads the persisted IDL (never the header), discovers managed sources,
//! runs the configured generators and writes their files idempotently.

use super::generate::idl_location;
use crate::context::{select_targets, RunContext};
use abiguard_core::codegen::run_codegen;
use abiguard_core::errors::Result;
use abiguard_core::logging_facility::ops;
use abiguard_core::{log_op_end, log_op_error, log_op_start, IdlDocument, TargetConfig};
use abiguard_store::artifacts::{write_artifact, ArtifactOutcome, WriteMode};
use abiguard_store::config::LoadedConfig;
use abiguard_store::managed::discover_managed_sources;
use abiguard_store::persist::load_idl;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct CodegenOutcome {
    pub target: String,
    pub artifacts: Vec<ArtifactOutcome>,
    pub warnings: Vec<String>,
}

impl CodegenOutcome {
    pub fn has_drift(&self) -> bool {
        self.artifacts.iter().any(ArtifactOutcome::is_drift)
    }
}

/// Run the generators over `idl` and write (or compare) their output
///
/// # Errors
///
/// Handle contract violations, codegen failures and store errors.
pub fn render_target(
    loaded: &LoadedConfig,
    name: &str,
    target: &TargetConfig,
    idl: &IdlDocument,
    mode: WriteMode,
) -> Result<CodegenOutcome> {
    let managed = match &target.bindings.csharp {
        Some(csharp) => discover_managed_sources(&loaded.base_dir, &csharp.managed_sources)?,
        None => Vec::new(),
    };

    let output = run_codegen(name, idl, target, &managed)?;
    for warning in &output.warnings {
        tracing::warn!(target = %name, "{}", warning);
    }

    let artifacts = output
        .files
        .iter()
        .map(|file| write_artifact(&loaded.resolve(&file.path), &file.path, &file.contents, mode))
        .collect::<Result<Vec<_>>>()?;

    Ok(CodegenOutcome {
        target: name.to_string(),
        artifacts,
        warnings: output.warnings,
    })
}

/// Load a target's IDL and run its generators
///
/// # Errors
///
/// `MissingConfigKey`/`NotFound` for a missing IDL, plus everything
/// [`render_target`] reports.
pub fn codegen_target(
    loaded: &LoadedConfig,
    name: &str,
    target: &TargetConfig,
    ctx: &RunContext,
    mode: WriteMode,
) -> Result<CodegenOutcome> {
    let start = Instant::now();
    log_op_start!(ops::CODEGEN, target = %name, run_id = %ctx.run_id);

    let result = idl_location(loaded, name, target)
        .and_then(|(path, _)| load_idl(&path))
        .and_then(|idl| render_target(loaded, name, target, &idl, mode))
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
                ops::CODEGEN,
                duration_ms = duration_ms,
                target = %name,
                run_id = %ctx.run_id,
                file_count = outcome.artifacts.len(),
                drift = outcome.has_drift()
            );
        }
        Err(err) => {
            log_op_error!(ops::CODEGEN, err, duration_ms = duration_ms);
        }
    }
    result
}

/// Run codegen for every selected target
///
/// # Errors
///
/// The first fatal per-target error.
pub fn run_codegen_all(
    loaded: &LoadedConfig,
    only: Option<&str>,
    ctx: &RunContext,
    mode: WriteMode,
) -> Result<Vec<CodegenOutcome>> {
    select_targets(&loaded.config, only)?
        .into_iter()
        .map(|(name, target)| codegen_target(loaded, name, target, ctx, mode))
        .collect()
}
