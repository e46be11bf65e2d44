//! Cross-target summary

use super::sorted;
use crate::diff::Severity;
use crate::policy::{Verdict, VersionBump};
use crate::verify::VerifyReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetLine {
    pub target: String,
    pub verdict: Verdict,
    pub classification: Severity,
    pub required_bump: VersionBump,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregateSummary {
    /// Worst verdict across targets
    pub verdict: Verdict,
    pub passed: usize,
    pub failed: usize,
    pub classifications: BTreeMap<String, usize>,
    pub targets: Vec<TargetLine>,
}

impl AggregateSummary {
    /// One line per target plus a totals line
    pub fn render(&self) -> String {
        let mut output = String::new();
        for line in &self.targets {
            output.push_str(&format!(
                "{:<24} {:<30} {:<9} {}\n",
                line.target,
                line.verdict.as_str(),
                line.classification.as_str(),
                line.required_bump
            ));
        }
        output.push_str(&format!(
            "{} target(s): {} passed, {} failed; overall {}\n",
            self.targets.len(),
            self.passed,
            self.failed,
            self.verdict
        ));
        output
    }
}

/// Summarize reports ordered by target name
pub fn aggregate(reports: &[VerifyReport]) -> AggregateSummary {
    let ordered = sorted(reports);
    let mut classifications = BTreeMap::new();
    for report in &ordered {
        *classifications
            .entry(report.policy.classification.as_str().to_string())
            .or_insert(0) += 1;
    }
    let passed = ordered.iter().filter(|r| r.verdict.is_pass()).count();

    AggregateSummary {
        verdict: ordered
            .iter()
            .map(|r| r.verdict)
            .fold(Verdict::Pass, Verdict::combine),
        passed,
        failed: ordered.len() - passed,
        classifications,
        targets: ordered
            .iter()
            .map(|r| TargetLine {
                target: r.target_name.clone(),
                verdict: r.verdict,
                classification: r.policy.classification,
                required_bump: r.policy.required_bump,
            })
            .collect(),
    }
}
