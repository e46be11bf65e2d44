//! Verify orchestration
//!
//! snapshot → load baseline → diff + policy → optional report files.
//! The effective policy is the root policy overlaid with the target's,
//! then tightened by the run's strict flags.

use super::missing_target_key;
use super::snapshot::snapshot_target;
use crate::context::{select_targets, RunContext, RunFlags};
use abiguard_core::errors::Result;
use abiguard_core::logging_facility::ops;
use abiguard_core::report::{aggregate, render_changelog, render_markdown, render_sarif, AggregateSummary};
use abiguard_core::snapshot::{canonical_json, format_timestamp};
use abiguard_core::verify::REPORT_SCHEMA_VERSION;
use abiguard_core::{
    log_op_end, log_op_error, log_op_start, verify_snapshots, AbiSnapshot, DiffOptions,
    EffectivePolicy, TargetConfig, Verdict, VerifyContext, VerifyReport,
};
use abiguard_store::artifacts::{write_artifact, ArtifactOutcome, WriteMode};
use abiguard_store::config::LoadedConfig;
use abiguard_store::persist::load_snapshot;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

/// Report files requested for a verify run
#[derive(Debug, Clone, Default)]
pub struct ReportOutputs {
    pub json: Option<PathBuf>,
    pub markdown: Option<PathBuf>,
    pub sarif: Option<PathBuf>,
    /// Changelog path and release tag
    pub changelog: Option<(PathBuf, String)>,
}

/// Reports of every selected target plus the cross-target summary
#[derive(Debug, Clone)]
pub struct VerifyRun {
    pub reports: Vec<VerifyReport>,
    pub summary: AggregateSummary,
    pub written: Vec<ArtifactOutcome>,
}

impl VerifyRun {
    pub fn verdict(&self) -> Verdict {
        self.summary.verdict
    }
}

#[derive(Serialize)]
struct VerifyDocument<'a> {
    report_schema_version: u32,
    generated_at: String,
    run_id: String,
    summary: &'a AggregateSummary,
    reports: &'a [VerifyReport],
}

pub fn effective_policy(loaded: &LoadedConfig, target: &TargetConfig, flags: RunFlags) -> EffectivePolicy {
    EffectivePolicy::merge(&loaded.config.policy, &target.policy)
        .with_overrides(flags.fail_on_expired, flags.fail_on_missing_metadata)
}

/// Load the configured baseline of a target
///
/// # Errors
///
/// `MissingConfigKey` when no baseline is configured, `NotFound` when the
/// file does not exist, plus snapshot parse errors.
pub fn load_baseline(loaded: &LoadedConfig, name: &str, target: &TargetConfig) -> Result<AbiSnapshot> {
    let relative = target
        .baseline
        .as_deref()
        .ok_or_else(|| missing_target_key(name, "baseline").with_op("load_baseline"))?;
    load_snapshot(&loaded.resolve(relative)).map_err(|e| e.with_target(name.to_string()))
}

/// Verify an already-built snapshot against the target's baseline
///
/// # Errors
///
/// Baseline loading errors and policy compilation errors.
pub fn verify_current(
    loaded: &LoadedConfig,
    name: &str,
    target: &TargetConfig,
    current: &AbiSnapshot,
    ctx: &RunContext,
) -> Result<VerifyReport> {
    let baseline = load_baseline(loaded, name, target)?;
    let policy = effective_policy(loaded, target, ctx.flags);
    let context = VerifyContext {
        diff_options: DiffOptions {
            struct_tail_addition_is_breaking: target.header.struct_tail_addition_is_breaking,
        },
        policy: &policy,
        bindings_symbols: target.bindings.symbols.as_deref(),
        now: ctx.now,
    };
    verify_snapshots(&baseline, current, &context)
}

/// Snapshot one target and verify it against its baseline
///
/// # Errors
///
/// Snapshot, baseline and policy errors.
pub fn verify_target(
    loaded: &LoadedConfig,
    name: &str,
    target: &TargetConfig,
    ctx: &RunContext,
) -> Result<VerifyReport> {
    let start = Instant::now();
    log_op_start!(ops::VERIFY, target = %name, run_id = %ctx.run_id);

    let result = snapshot_target(loaded, name, target, ctx)
        .and_then(|current| verify_current(loaded, name, target, &current, ctx));

    let duration_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(report) => {
            log_op_end!(
                ops::VERIFY,
                duration_ms = duration_ms,
                target = %name,
                run_id = %ctx.run_id,
                verdict = %report.verdict,
                required_bump = %report.policy.required_bump
            );
        }
        Err(err) => {
            log_op_error!(ops::VERIFY, err, duration_ms = duration_ms);
        }
    }
    result
}

/// Render the requested report files
///
/// # Errors
///
/// `Serialization`/`Io` while rendering or writing.
pub fn write_reports(
    reports: &[VerifyReport],
    summary: &AggregateSummary,
    outputs: &ReportOutputs,
    ctx: &RunContext,
) -> Result<Vec<ArtifactOutcome>> {
    let mut written = Vec::new();
    let mut emit = |path: &PathBuf, contents: &str| -> Result<()> {
        written.push(write_artifact(
            path,
            &path.display().to_string(),
            contents,
            WriteMode::Write,
        )?);
        Ok(())
    };

    if let Some(path) = &outputs.json {
        let document = VerifyDocument {
            report_schema_version: REPORT_SCHEMA_VERSION,
            generated_at: format_timestamp(ctx.now),
            run_id: ctx.run_id.to_string(),
            summary,
            reports,
        };
        emit(path, &canonical_json(&document)?)?;
    }
    if let Some(path) = &outputs.markdown {
        let markdown: Vec<String> = reports.iter().map(render_markdown).collect();
        emit(path, &markdown.join("\n"))?;
    }
    if let Some(path) = &outputs.sarif {
        emit(path, &render_sarif(reports)?)?;
    }
    if let Some((path, release_tag)) = &outputs.changelog {
        emit(
            path,
            &render_changelog(reports, release_tag, &format_timestamp(ctx.now)),
        )?;
    }
    Ok(written)
}

/// Verify every selected target, then write the requested reports
///
/// # Errors
///
/// The first fatal per-target error, or a report write failure.
pub fn run_verify(
    loaded: &LoadedConfig,
    only: Option<&str>,
    ctx: &RunContext,
    outputs: &ReportOutputs,
) -> Result<VerifyRun> {
    let mut reports = Vec::new();
    for (name, target) in select_targets(&loaded.config, only)? {
        reports.push(verify_target(loaded, name, target, ctx)?);
    }
    let summary = aggregate(&reports);
    let written = write_reports(&reports, &summary, outputs, ctx)?;
    Ok(VerifyRun {
        reports,
        summary,
        written,
    })
}
