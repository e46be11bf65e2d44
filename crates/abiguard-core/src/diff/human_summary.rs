//! Human-readable summary renderer for ABI diffs.

use crate::diff::model::{DiffResult, Severity};

/// Render a short Markdown/text summary of a [`DiffResult`].
///
/// Informational only; policy decisions use the structured records.
pub fn render_human_summary(diff: &DiffResult) -> String {
    let mut out = String::new();

    out.push_str("## ABI Diff\n\n");
    out.push_str(&format!(
        "**Classification**: {}  \n**Versions**: {} -> {}\n\n",
        diff.classification, diff.baseline_version, diff.current_version
    ));

    if diff.is_empty() {
        out.push_str("_No ABI changes detected._\n");
        return out;
    }

    out.push_str(&format!(
        "| Breaking | Additive | None |\n|---|---|---|\n| {} | {} | {} |\n\n",
        diff.summary.breaking, diff.summary.additive, diff.summary.none
    ));

    for (severity, title) in [
        (Severity::Breaking, "Breaking"),
        (Severity::Additive, "Additive"),
        (Severity::None, "Informational"),
    ] {
        let lines: Vec<String> = diff
            .records_with(severity)
            .map(|r| format!("- `{}`: {}\n", r.kind, r.describe()))
            .collect();
        if lines.is_empty() {
            continue;
        }
        out.push_str(&format!("### {} ({})\n\n", title, lines.len()));
        for line in lines {
            out.push_str(&line);
        }
        out.push('\n');
    }
    out
}
