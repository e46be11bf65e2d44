//! Verification: diff a current snapshot against its baseline and apply policy.
//!
//! Collects every pre-policy diagnostic (export reconciliation, bindings
//! coverage, reduced-confidence runs) so that waivers and rules see them.

use crate::diff::{compute_diff, ensure_diff_deterministic, DiffOptions, DiffResult};
use crate::errors::Result;
use crate::exports::diagnostic_messages;
use crate::logging_facility::ops;
use crate::model::{AbiSnapshot, AbiVersion, BinaryCheck, ParserInfo};
use crate::policy::{evaluate_policy, EffectivePolicy, PolicyInput, PolicyOutcome, Verdict};
use crate::snapshot::{check_binding_symbols, Findings};
use crate::{log_op_end, log_op_error, log_op_start};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Schema version of [`VerifyReport`]
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Inputs besides the two snapshots
#[derive(Debug, Clone)]
pub struct VerifyContext<'a> {
    pub diff_options: DiffOptions,
    pub policy: &'a EffectivePolicy,
    /// Configured `bindings.symbols`, if any
    pub bindings_symbols: Option<&'a [String]>,
    pub now: DateTime<Utc>,
}

/// Structured payload of one target's verification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifyReport {
    pub report_schema_version: u32,
    pub target_name: String,
    pub header_path: String,
    pub verdict: Verdict,
    pub baseline_version: AbiVersion,
    pub current_version: AbiVersion,
    pub baseline_digest: String,
    pub current_digest: String,
    pub binary_status: String,
    pub parser: ParserInfo,
    pub diff: DiffResult,
    pub policy: PolicyOutcome,
}

/// Diagnostics the policy engine should see, as `(errors, warnings)`
pub fn collect_diagnostics(current: &AbiSnapshot, bindings_symbols: Option<&[String]>) -> Findings {
    let target = current.target_name.as_str();
    let mut findings = Findings::default();

    match &current.binary {
        BinaryCheck::Checked {
            allow_non_prefixed_exports,
            diagnostics,
            ..
        } => {
            let (errors, warnings) =
                diagnostic_messages(target, diagnostics, *allow_non_prefixed_exports);
            findings.errors.extend(errors);
            findings.warnings.extend(warnings);
        }
        BinaryCheck::Skipped { reason } => findings.warnings.push(format!(
            "binary export check skipped ({}); reduced confidence (target={})",
            reason, target
        )),
        BinaryCheck::NotConfigured => findings.warnings.push(format!(
            "no binary configured; reduced confidence (target={})",
            target
        )),
    }

    if current.parser.fallback_used {
        findings.warnings.push(format!(
            "heuristic parser fallback used: {} (target={})",
            current.parser.details.as_deref().unwrap_or("backend unavailable"),
            target
        ));
    }

    findings.extend(check_binding_symbols(
        target,
        &current.functions,
        bindings_symbols,
    ));
    findings
}

/// Diff `current` against `baseline` and evaluate the effective policy
///
/// # Errors
///
/// `DeterminismViolation` if the diff does not encode stably;
/// `InvalidConfig` if a waiver or rule cannot be compiled.
pub fn verify_snapshots(
    baseline: &AbiSnapshot,
    current: &AbiSnapshot,
    context: &VerifyContext<'_>,
) -> Result<VerifyReport> {
    let start = Instant::now();
    log_op_start!(ops::VERIFY_SNAPSHOTS, target = %current.target_name);

    let result = verify_inner(baseline, current, context);

    let duration_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(report) => {
            log_op_end!(
                ops::VERIFY_SNAPSHOTS,
                duration_ms = duration_ms,
                target = %report.target_name,
                verdict = %report.verdict,
                classification = %report.diff.classification,
                change_count = report.diff.records.len()
            );
        }
        Err(err) => {
            log_op_error!(ops::VERIFY_SNAPSHOTS, err, duration_ms = duration_ms);
        }
    }
    result
}

fn verify_inner(
    baseline: &AbiSnapshot,
    current: &AbiSnapshot,
    context: &VerifyContext<'_>,
) -> Result<VerifyReport> {
    let diff = compute_diff(baseline, current, &context.diff_options);
    ensure_diff_deterministic(&diff)?;

    let findings = collect_diagnostics(current, context.bindings_symbols);
    let policy = evaluate_policy(
        PolicyInput {
            target_name: &current.target_name,
            diff: &diff,
            errors: findings.errors,
            warnings: findings.warnings,
            now: context.now,
        },
        context.policy,
    )?;

    Ok(VerifyReport {
        report_schema_version: REPORT_SCHEMA_VERSION,
        target_name: current.target_name.clone(),
        header_path: current.header_path.clone(),
        verdict: policy.verdict,
        baseline_version: baseline.version,
        current_version: current.version,
        baseline_digest: baseline.content_digest.clone(),
        current_digest: current.content_digest.clone(),
        binary_status: current.binary.status().to_string(),
        parser: current.parser.clone(),
        diff,
        policy,
    })
}
