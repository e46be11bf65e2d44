//! Markdown report for one target

use super::unwaived;
use crate::diff::{render_human_summary, Severity};
use crate::verify::VerifyReport;

fn section(output: &mut String, title: &str, lines: &[String]) {
    output.push_str(&format!("\n## {}\n\n", title));
    if lines.is_empty() {
        output.push_str("None.\n");
        return;
    }
    for line in lines {
        output.push_str(&format!("- {}\n", line));
    }
}

/// Render the Markdown verify report
///
/// Sections: Breaking Changes, Additive Changes, Waived, Warnings and
/// Errors, followed by the raw diff summary.
pub fn render_markdown(report: &VerifyReport) -> String {
    let policy = &report.policy;
    let mut output = String::new();

    output.push_str(&format!("# ABI Report: {}\n\n", report.target_name));
    output.push_str(&format!("- **Verdict**: `{}`\n", report.verdict));
    output.push_str(&format!("- **Classification**: {}\n", policy.classification));
    output.push_str(&format!(
        "- **Required bump**: {} (declared: {})\n",
        policy.required_bump, policy.declared_bump
    ));
    output.push_str(&format!(
        "- **Versions**: {} -> {} (recommended {})\n",
        report.baseline_version, report.current_version, policy.recommended_version
    ));
    output.push_str(&format!(
        "- **Parser**: {}{}\n",
        report.parser.backend,
        if report.parser.fallback_used { " (fallback)" } else { "" }
    ));
    output.push_str(&format!("- **Binary check**: {}\n", report.binary_status));

    let describe = |severity| {
        unwaived(report, severity)
            .iter()
            .map(|r| r.describe())
            .collect::<Vec<_>>()
    };
    section(&mut output, "Breaking Changes", &describe(Severity::Breaking));
    section(&mut output, "Additive Changes", &describe(Severity::Additive));

    let waived: Vec<String> = policy
        .waivers_applied
        .iter()
        .map(|w| {
            let mut line = format!("`{}` ({}): {}", w.waiver_id, w.severity, w.message);
            if let Some(expires) = &w.expires_utc {
                line.push_str(&format!(", expires {}", expires));
            }
            if let Some(owner) = &w.owner {
                line.push_str(&format!(", owner {}", owner));
            }
            line
        })
        .collect();
    section(&mut output, "Waived", &waived);
    section(&mut output, "Warnings", &policy.warnings);

    let mut errors = policy.errors.clone();
    errors.extend(
        policy
            .reasons
            .iter()
            .map(|r| format!("`{}` {}", r.code.as_str(), r.message)),
    );
    section(&mut output, "Errors", &errors);

    output.push('\n');
    output.push_str(&render_human_summary(&report.diff));
    output
}
