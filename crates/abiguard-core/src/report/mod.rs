//! Report rendering for verify results.
//!
//! Every renderer is a pure function of one or more [`VerifyReport`]s, so
//! the same run always renders the same bytes. Multi-target renderers take
//! reports in any order and sort them by target name.

pub mod aggregate;
pub mod changelog;
pub mod markdown;
pub mod sarif;
pub mod summary;

pub use aggregate::{aggregate, AggregateSummary, TargetLine};
pub use changelog::render_changelog;
pub use markdown::render_markdown;
pub use sarif::{build_sarif, render_sarif};
pub use summary::render_summary;

use crate::diff::{ChangeRecord, Severity};
use crate::verify::VerifyReport;

/// Records of `severity` that no waiver covered
pub(crate) fn unwaived(report: &VerifyReport, severity: Severity) -> Vec<&ChangeRecord> {
    report
        .diff
        .records_with(severity)
        .filter(|r| !report.policy.waived_changes.contains(r))
        .collect()
}

/// Reports ordered by target name
pub(crate) fn sorted(reports: &[VerifyReport]) -> Vec<&VerifyReport> {
    let mut ordered: Vec<&VerifyReport> = reports.iter().collect();
    ordered.sort_by(|a, b| a.target_name.cmp(&b.target_name));
    ordered
}
