//! Sync: accept the current ABI
//!
//! Verifies first; only a passing verdict updates the baseline, the IDL
//! and the generated code. In check mode nothing is written and any
//! difference is reported as drift.

use super::codegen::{render_target, CodegenOutcome};
use super::generate::{write_idl, GenerateOutcome};
use super::missing_target_key;
use super::snapshot::snapshot_target;
use super::verify::verify_current;
use crate::context::{select_targets, RunContext};
use abiguard_core::errors::Result;
use abiguard_core::logging_facility::ops;
use abiguard_core::{log_op_end, log_op_error, log_op_start, TargetConfig, VerifyReport};
use abiguard_store::artifacts::{ArtifactOutcome, WriteMode};
use abiguard_store::config::LoadedConfig;
use abiguard_store::persist::save_snapshot;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub target: String,
    pub report: VerifyReport,
    /// `None` when the verdict blocked the sync
    pub baseline: Option<ArtifactOutcome>,
    pub idl: Option<GenerateOutcome>,
    pub codegen: Option<CodegenOutcome>,
}

impl SyncOutcome {
    pub fn applied(&self) -> bool {
        self.baseline.is_some()
    }

    pub fn has_drift(&self) -> bool {
        self.baseline.as_ref().is_some_and(ArtifactOutcome::is_drift)
            || self.idl.as_ref().is_some_and(|g| g.artifact.is_drift())
            || self.codegen.as_ref().is_some_and(CodegenOutcome::has_drift)
    }
}

fn sync_inner(
    loaded: &LoadedConfig,
    name: &str,
    target: &TargetConfig,
    ctx: &RunContext,
    check: bool,
) -> Result<SyncOutcome> {
    let current = snapshot_target(loaded, name, target, ctx)?;
    let report = verify_current(loaded, name, target, &current, ctx)?;

    if !report.verdict.is_pass() {
        tracing::warn!(
            target = %name,
            verdict = %report.verdict,
            "sync blocked by policy; baseline and generated artifacts left untouched"
        );
        return Ok(SyncOutcome {
            target: name.to_string(),
            report,
            baseline: None,
            idl: None,
            codegen: None,
        });
    }

    let mode = if check { WriteMode::Check } else { WriteMode::Write };
    let baseline_rel = target
        .baseline
        .as_deref()
        .ok_or_else(|| missing_target_key(name, "baseline"))?;
    let baseline = save_snapshot(&loaded.resolve(baseline_rel), baseline_rel, &current, mode)?;

    let (idl, codegen) = if target.codegen.is_some() {
        let generated = write_idl(loaded, name, target, &current, mode)?;
        let rendered = render_target(loaded, name, target, &generated.idl, mode)?;
        (Some(generated), Some(rendered))
    } else {
        (None, None)
    };

    Ok(SyncOutcome {
        target: name.to_string(),
        report,
        baseline: Some(baseline),
        idl,
        codegen,
    })
}

/// Verify one target and, on pass, update its persisted artifacts
///
/// # Errors
///
/// Snapshot, verify, codegen and store errors. A failing verdict is not an
/// error; it is reported through [`SyncOutcome::report`].
pub fn sync_target(
    loaded: &LoadedConfig,
    name: &str,
    target: &TargetConfig,
    ctx: &RunContext,
    check: bool,
) -> Result<SyncOutcome> {
    let start = Instant::now();
    log_op_start!(ops::SYNC, target = %name, run_id = %ctx.run_id, check = check);

    let result = sync_inner(loaded, name, target, ctx, check).map_err(|e| {
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
                ops::SYNC,
                duration_ms = duration_ms,
                target = %name,
                run_id = %ctx.run_id,
                verdict = %outcome.report.verdict,
                applied = outcome.applied(),
                drift = outcome.has_drift()
            );
        }
        Err(err) => {
            log_op_error!(ops::SYNC, err, duration_ms = duration_ms);
        }
    }
    result
}

/// Sync every selected target
///
/// # Errors
///
/// The first fatal per-target error.
pub fn run_sync(
    loaded: &LoadedConfig,
    only: Option<&str>,
    ctx: &RunContext,
    check: bool,
) -> Result<Vec<SyncOutcome>> {
    select_targets(&loaded.config, only)?
        .into_iter()
        .map(|(name, target)| sync_target(loaded, name, target, ctx, check))
        .collect()
}
