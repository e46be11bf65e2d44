//! Short human summary of one verify report

use crate::verify::VerifyReport;

/// Reasons listed before the summary truncates
const MAX_REASONS: usize = 5;

/// A few lines for terminals and CI logs
pub fn render_summary(report: &VerifyReport) -> String {
    let policy = &report.policy;
    let summary = &report.diff.summary;
    let mut output = String::new();

    output.push_str(&format!(
        "[{}] {} (classification: {}, required bump: {})\n",
        report.target_name, report.verdict, policy.classification, policy.required_bump
    ));
    output.push_str(&format!(
        "  versions: baseline {} -> current {} (recommended {})\n",
        report.baseline_version, report.current_version, policy.recommended_version
    ));
    output.push_str(&format!(
        "  changes: {} breaking, {} additive, {} informational; {} waived\n",
        summary.breaking,
        summary.additive,
        summary.none,
        policy.waived_changes.len()
    ));
    if !policy.errors.is_empty() || !policy.warnings.is_empty() {
        output.push_str(&format!(
            "  diagnostics: {} error(s), {} warning(s)\n",
            policy.errors.len(),
            policy.warnings.len()
        ));
    }

    for reason in policy.reasons.iter().take(MAX_REASONS) {
        output.push_str(&format!("  - {}: {}\n", reason.code.as_str(), reason.message));
    }
    if policy.reasons.len() > MAX_REASONS {
        output.push_str(&format!(
            "  ... and {} more reason(s)\n",
            policy.reasons.len() - MAX_REASONS
        ));
    }
    output
}
