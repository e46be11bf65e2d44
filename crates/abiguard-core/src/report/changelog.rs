//! Changelog document across targets

use super::{sorted, unwaived};
use crate::diff::Severity;
use crate::verify::VerifyReport;

/// Render a release changelog entry
///
/// Targets are listed by name whatever the order of `reports`.
pub fn render_changelog(reports: &[VerifyReport], release_tag: &str, generated_at: &str) -> String {
    let ordered = sorted(reports);
    let mut output = String::new();

    output.push_str(&format!("# ABI Changelog: {}\n\n", release_tag));
    output.push_str(&format!("Generated at: {}\n\n", generated_at));
    output.push_str(&format!("Release: `{}`\n\n", release_tag));

    output.push_str("| Target | Classification | Required bump | Verdict |\n");
    output.push_str("|---|---|---|---|\n");
    for report in &ordered {
        output.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            report.target_name,
            report.policy.classification,
            report.policy.required_bump,
            report.verdict
        ));
    }

    for report in &ordered {
        output.push_str(&format!(
            "\n## {} ({} -> {})\n",
            report.target_name, report.baseline_version, report.current_version
        ));
        for (severity, title) in [(Severity::Breaking, "Breaking"), (Severity::Additive, "Additive")] {
            output.push_str(&format!("\n### {}\n\n", title));
            let records = unwaived(report, severity);
            if records.is_empty() {
                output.push_str("- None.\n");
            }
            for record in records {
                output.push_str(&format!("- {}\n", record.describe()));
            }
        }
        if !report.policy.waived_changes.is_empty() {
            output.push_str("\n### Waived\n\n");
            for record in &report.policy.waived_changes {
                output.push_str(&format!("- {}\n", record.describe()));
            }
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_report;

    #[test]
    fn test_targets_sorted_and_sections_present() {
        let reports = vec![sample_report("zeta"), sample_report("alpha")];
        let text = render_changelog(&reports, "v2.0.0", "2026-06-01T00:00:00Z");

        assert!(text.starts_with("# ABI Changelog: v2.0.0\n\nGenerated at: 2026-06-01T00:00:00Z\n"));
        assert!(text.find("| alpha |").unwrap() < text.find("| zeta |").unwrap());
        assert!(text.contains("### Breaking\n\n- function lrtc_log removed\n"));
        assert!(text.contains("### Additive\n\n- function lrtc_track_add added\n"));
    }

    #[test]
    fn test_empty_sections_say_none() {
        let mut report = sample_report("lumenrtc");
        report.diff.records.clear();
        let text = render_changelog(&[report], "v1", "2026-06-01T00:00:00Z");
        assert!(text.contains("### Breaking\n\n- None.\n"));
        assert!(text.contains("### Additive\n\n- None.\n"));
    }
}
