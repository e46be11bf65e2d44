//! Policy engine
//!
//! Evaluates change records and diagnostics against the effective policy of
//! a target: waivers first, then the version-bump requirement, then rules
//! and the classification ceiling. The result is a tri-state [`Verdict`]
//! plus a structured reason list.
//!
//! A change is *acknowledged* when an active waiver covers it or when the
//! declared version bump covers the bump the change requires.

pub mod rules;
pub mod waivers;

use crate::config::{PolicyConfig, RuleConfig, WaiverConfig, WaiverRequirements};
use crate::diff::{ChangeRecord, DiffResult, Severity};
use crate::errors::Result;
use crate::model::AbiVersion;
use chrono::{DateTime, Utc};
use rules::{apply_rules, AppliedRule, RuleInputs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use waivers::{
    compile_waivers, CompiledWaiver, MatchClass, WaiverApplication, WaiverState,
    DEFAULT_WARN_EXPIRING_WITHIN_DAYS,
};

pub use waivers::parse_utc_timestamp;

// ========== Versions ==========

/// Version bump between two declared versions, or the bump a change needs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VersionBump {
    Regression,
    None,
    Patch,
    Minor,
    Major,
}

impl VersionBump {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionBump::Regression => "regression",
            VersionBump::None => "none",
            VersionBump::Patch => "patch",
            VersionBump::Minor => "minor",
            VersionBump::Major => "major",
        }
    }

    /// Bump a change of this severity requires
    pub fn required_for(severity: Severity) -> VersionBump {
        match severity {
            Severity::None => VersionBump::None,
            Severity::Additive => VersionBump::Minor,
            Severity::Breaking => VersionBump::Major,
        }
    }

    /// Declared bump from `baseline` to `current`
    pub fn between(baseline: AbiVersion, current: AbiVersion) -> VersionBump {
        if current < baseline {
            VersionBump::Regression
        } else if current.major > baseline.major {
            VersionBump::Major
        } else if current.minor > baseline.minor {
            VersionBump::Minor
        } else if current.patch > baseline.patch {
            VersionBump::Patch
        } else {
            VersionBump::None
        }
    }

    /// A declared bump covers a required one; a regression covers nothing
    pub fn covers(&self, required: VersionBump) -> bool {
        *self != VersionBump::Regression && *self >= required
    }
}

impl fmt::Display for VersionBump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Next version for a required bump
pub fn recommended_version(baseline: AbiVersion, required: VersionBump) -> AbiVersion {
    match required {
        VersionBump::Major => AbiVersion::new(baseline.major + 1, 0, 0),
        VersionBump::Minor => AbiVersion::new(baseline.major, baseline.minor + 1, 0),
        VersionBump::Patch | VersionBump::None | VersionBump::Regression => {
            AbiVersion::new(baseline.major, baseline.minor, baseline.patch + 1)
        }
    }
}

// ========== Effective policy ==========

/// Root and per-target policy merged into concrete values
#[derive(Debug, Clone, PartialEq)]
pub struct EffectivePolicy {
    pub max_allowed_classification: Severity,
    pub fail_on_warnings: bool,
    pub fail_on_expired: bool,
    pub fail_on_missing_metadata: bool,
    pub waiver_requirements: WaiverRequirements,
    pub rules: Vec<RuleConfig>,
    pub waivers: Vec<WaiverConfig>,
}

impl Default for EffectivePolicy {
    fn default() -> Self {
        Self {
            max_allowed_classification: Severity::Breaking,
            fail_on_warnings: false,
            fail_on_expired: false,
            fail_on_missing_metadata: false,
            waiver_requirements: WaiverRequirements::default(),
            rules: Vec::new(),
            waivers: Vec::new(),
        }
    }
}

impl EffectivePolicy {
    /// Per-target scalars override root ones; rules and waivers concatenate, root first
    pub fn merge(root: &PolicyConfig, target: &PolicyConfig) -> Self {
        let defaults = EffectivePolicy::default();
        let pick = |t: Option<bool>, r: Option<bool>, d: bool| t.or(r).unwrap_or(d);
        Self {
            max_allowed_classification: target
                .max_allowed_classification
                .or(root.max_allowed_classification)
                .unwrap_or(defaults.max_allowed_classification),
            fail_on_warnings: pick(target.fail_on_warnings, root.fail_on_warnings, false),
            fail_on_expired: pick(target.fail_on_expired, root.fail_on_expired, false),
            fail_on_missing_metadata: pick(
                target.fail_on_missing_metadata,
                root.fail_on_missing_metadata,
                false,
            ),
            waiver_requirements: root
                .waiver_requirements
                .overlay(&target.waiver_requirements),
            rules: root.rules.iter().chain(&target.rules).cloned().collect(),
            waivers: root.waivers.iter().chain(&target.waivers).cloned().collect(),
        }
    }

    /// Run-level strict flags only ever tighten the policy
    pub fn with_overrides(mut self, fail_on_expired: bool, fail_on_missing_metadata: bool) -> Self {
        self.fail_on_expired |= fail_on_expired;
        self.fail_on_missing_metadata |= fail_on_missing_metadata;
        self
    }

    fn warn_expiring_within_days(&self) -> u32 {
        self.waiver_requirements
            .warn_expiring_within_days
            .unwrap_or(DEFAULT_WARN_EXPIRING_WITHIN_DAYS)
    }
}

// ========== Outcome ==========

/// Tri-state verdict of a verify-style operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Pass,
    FailUnacknowledgedAdditive,
    FailBreaking,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::FailUnacknowledgedAdditive => "fail-unacknowledged-additive",
            Verdict::FailBreaking => "fail-breaking",
        }
    }

    pub fn is_pass(&self) -> bool {
        *self == Verdict::Pass
    }

    /// Process exit code: 0 pass, 1 fail-breaking, 2 fail-unacknowledged-additive
    pub fn exit_code(&self) -> i32 {
        match self {
            Verdict::Pass => 0,
            Verdict::FailBreaking => 1,
            Verdict::FailUnacknowledgedAdditive => 2,
        }
    }

    /// The worse of two verdicts
    pub fn combine(self, other: Verdict) -> Verdict {
        let rank = |v: Verdict| match v {
            Verdict::Pass => 0,
            Verdict::FailUnacknowledgedAdditive => 1,
            Verdict::FailBreaking => 2,
        };
        if rank(other) > rank(self) {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    UnacknowledgedBreaking,
    UnacknowledgedAdditive,
    InsufficientVersionBump,
    VersionRegression,
    WaiverExpired,
    WaiverMissingMetadata,
    PolicyError,
    WarningAsError,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::UnacknowledgedBreaking => "UNACKNOWLEDGED_BREAKING",
            ReasonCode::UnacknowledgedAdditive => "UNACKNOWLEDGED_ADDITIVE",
            ReasonCode::InsufficientVersionBump => "INSUFFICIENT_VERSION_BUMP",
            ReasonCode::VersionRegression => "VERSION_REGRESSION",
            ReasonCode::WaiverExpired => "WAIVER_EXPIRED",
            ReasonCode::WaiverMissingMetadata => "WAIVER_MISSING_METADATA",
            ReasonCode::PolicyError => "POLICY_ERROR",
            ReasonCode::WarningAsError => "WARNING_AS_ERROR",
        }
    }
}

/// One structured failure reason
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reason {
    pub code: ReasonCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl Reason {
    fn new(code: ReasonCode, message: impl Into<String>, subject: Option<&str>) -> Self {
        Self {
            code,
            message: message.into(),
            subject: subject.map(str::to_string),
        }
    }
}

/// Everything the policy engine decided for one target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyOutcome {
    pub verdict: Verdict,
    /// Classification of the raw diff
    pub classification: Severity,
    /// Classification after waivers
    pub effective_classification: Severity,
    pub required_bump: VersionBump,
    pub declared_bump: VersionBump,
    pub recommended_version: AbiVersion,
    pub reasons: Vec<Reason>,
    /// Errors left after waivers
    pub errors: Vec<String>,
    /// Warnings left after waivers (plus waiver lifecycle warnings)
    pub warnings: Vec<String>,
    pub waived_changes: Vec<ChangeRecord>,
    pub waivers_applied: Vec<WaiverApplication>,
    pub rules_applied: Vec<AppliedRule>,
}

/// Everything the engine needs for one evaluation
#[derive(Debug, Clone)]
pub struct PolicyInput<'a> {
    pub target_name: &'a str,
    pub diff: &'a DiffResult,
    /// Diagnostics raised before policy (exports, bindings)
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// The run's single wall-clock reading
    pub now: DateTime<Utc>,
}

// ========== Evaluation ==========

struct WaiverDesk<'a> {
    target: &'a str,
    now: DateTime<Utc>,
    policy: &'a EffectivePolicy,
    waivers: Vec<CompiledWaiver>,
    applied: Vec<WaiverApplication>,
    reasons: Vec<Reason>,
    warnings: Vec<String>,
    reported: BTreeSet<String>,
}

impl WaiverDesk<'_> {
    /// First active waiver covering the item, recording lifecycle problems on the way
    fn cover(&mut self, class: MatchClass, description: &str, subject: Option<&str>) -> bool {
        for waiver in &self.waivers {
            if !waiver.matches(self.target, class, description) {
                continue;
            }
            match waiver.state(self.now, self.policy.fail_on_missing_metadata) {
                WaiverState::Active => {
                    self.applied
                        .push(WaiverApplication::new(waiver, class, description, subject));
                    return true;
                }
                WaiverState::Expired { expires_utc } => {
                    if self.reported.insert(format!("expired:{}", waiver.id())) {
                        let message = format!(
                            "waiver '{}' expired at {} (target={})",
                            waiver.id(),
                            expires_utc,
                            self.target
                        );
                        tracing::warn!(waiver = %waiver.id(), target = %self.target, "{}", message);
                        if self.policy.fail_on_expired {
                            self.reasons
                                .push(Reason::new(ReasonCode::WaiverExpired, message, Some(waiver.id())));
                        } else {
                            self.warnings.push(message);
                        }
                    }
                }
                WaiverState::MissingMetadata { fields } => {
                    if self.reported.insert(format!("metadata:{}", waiver.id())) {
                        let message = format!(
                            "waiver '{}' is missing required metadata: {} (target={})",
                            waiver.id(),
                            fields.join(", "),
                            self.target
                        );
                        tracing::warn!(waiver = %waiver.id(), target = %self.target, "{}", message);
                        self.reasons.push(Reason::new(
                            ReasonCode::WaiverMissingMetadata,
                            message,
                            Some(waiver.id()),
                        ));
                    }
                }
            }
        }
        false
    }

    fn filter(&mut self, class: MatchClass, items: Vec<String>) -> Vec<String> {
        items
            .into_iter()
            .filter(|item| !self.cover(class, item, None))
            .collect()
    }

    fn expiring_soon(&mut self) {
        let within = self.policy.warn_expiring_within_days();
        for waiver in &self.waivers {
            if !waiver.applies_to_target(self.target) {
                continue;
            }
            if let Some(days) = waiver.expires_within(self.now, within) {
                let message = format!(
                    "waiver '{}' expires in {} day(s) (target={})",
                    waiver.id(),
                    days,
                    self.target
                );
                tracing::warn!(waiver = %waiver.id(), target = %self.target, "{}", message);
                self.warnings.push(message);
            }
        }
    }
}

/// Evaluate one target's diff and diagnostics against its effective policy
///
/// # Errors
///
/// `InvalidConfig` when a waiver or rule cannot be compiled.
pub fn evaluate_policy(input: PolicyInput<'_>, policy: &EffectivePolicy) -> Result<PolicyOutcome> {
    let diff = input.diff;
    let mut desk = WaiverDesk {
        target: input.target_name,
        now: input.now,
        policy,
        waivers: compile_waivers(&policy.waivers)?,
        applied: Vec::new(),
        reasons: Vec::new(),
        warnings: Vec::new(),
        reported: BTreeSet::new(),
    };

    // 1. Waive change records
    let mut remaining: Vec<&ChangeRecord> = Vec::new();
    let mut waived_changes = Vec::new();
    for record in &diff.records {
        let class = match record.severity {
            Severity::Breaking => MatchClass::Breaking,
            Severity::Additive => MatchClass::Additive,
            Severity::None => continue,
        };
        if desk.cover(class, &record.describe(), Some(record.subject_name.as_str())) {
            waived_changes.push(record.clone());
        } else {
            remaining.push(record);
        }
    }

    // 2. Version bump
    let effective_classification = remaining
        .iter()
        .map(|r| r.severity)
        .max()
        .unwrap_or(Severity::None);
    let required_bump = VersionBump::required_for(effective_classification);
    let declared_bump = VersionBump::between(diff.baseline_version, diff.current_version);

    let mut reasons = Vec::new();
    if declared_bump == VersionBump::Regression {
        reasons.push(Reason::new(
            ReasonCode::VersionRegression,
            format!(
                "declared version {} is lower than baseline {}",
                diff.current_version, diff.baseline_version
            ),
            None,
        ));
    }
    for record in &remaining {
        let needed = VersionBump::required_for(record.severity);
        if declared_bump.covers(needed) {
            continue;
        }
        let code = if record.severity == Severity::Additive {
            ReasonCode::UnacknowledgedAdditive
        } else {
            ReasonCode::UnacknowledgedBreaking
        };
        reasons.push(Reason::new(code, record.describe(), Some(record.subject_name.as_str())));
    }
    if !declared_bump.covers(required_bump) && declared_bump != VersionBump::Regression {
        reasons.push(Reason::new(
            ReasonCode::InsufficientVersionBump,
            format!(
                "changes require a {} bump but the declared bump is {} ({} -> {}, recommended {})",
                required_bump,
                declared_bump,
                diff.baseline_version,
                diff.current_version,
                recommended_version(diff.baseline_version, required_bump)
            ),
            None,
        ));
    }

    // 3. Classification ceiling and rules
    let mut errors = input.errors;
    let mut warnings = input.warnings;
    if diff.classification > policy.max_allowed_classification {
        errors.push(format!(
            "classification '{}' exceeds allowed '{}' (target={})",
            diff.classification, policy.max_allowed_classification, input.target_name
        ));
    }

    let reason_lines = |severity: Severity| -> Vec<String> {
        diff.records_with(severity).map(ChangeRecord::describe).collect()
    };
    let rule_inputs = RuleInputs {
        classification: diff.classification,
        removed_symbols: diff.removed_functions(),
        added_symbols: diff.added_functions(),
        changed_signatures: diff.changed_functions(),
        breaking_reasons: reason_lines(Severity::Breaking),
        additive_reasons: reason_lines(Severity::Additive),
        warnings: warnings.clone(),
        errors: errors.clone(),
    };
    let rules_applied = apply_rules(
        &policy.rules,
        &rule_inputs,
        input.target_name,
        &mut errors,
        &mut warnings,
    )?;

    // 4. Waive diagnostics
    let errors = desk.filter(MatchClass::Error, errors);
    let mut warnings = desk.filter(MatchClass::Warning, warnings);
    desk.expiring_soon();
    warnings.append(&mut desk.warnings);
    reasons.append(&mut desk.reasons);

    for error in &errors {
        reasons.push(Reason::new(ReasonCode::PolicyError, error.clone(), None));
    }
    if policy.fail_on_warnings {
        for warning in &warnings {
            reasons.push(Reason::new(ReasonCode::WarningAsError, warning.clone(), None));
        }
    }

    // 5. Verdict
    let additive_only = |reason: &Reason| match reason.code {
        ReasonCode::UnacknowledgedAdditive => true,
        ReasonCode::InsufficientVersionBump => required_bump == VersionBump::Minor,
        _ => false,
    };
    let verdict = if reasons.is_empty() {
        Verdict::Pass
    } else if reasons.iter().all(additive_only) {
        Verdict::FailUnacknowledgedAdditive
    } else {
        Verdict::FailBreaking
    };

    Ok(PolicyOutcome {
        verdict,
        classification: diff.classification,
        effective_classification,
        required_bump,
        declared_bump,
        recommended_version: recommended_version(diff.baseline_version, required_bump),
        reasons,
        errors,
        warnings,
        waived_changes,
        waivers_applied: desk.applied,
        rules_applied,
    })
}
