//! SARIF 2.1.0 output for code-scanning integrations.
//!
//! Rule `ABI001` carries every failure reason (unacknowledged changes,
//! version problems, policy errors); rule `ABI002` carries warnings.

use super::sorted;
use crate::errors::Result;
use crate::snapshot::canonical_json;
use crate::verify::VerifyReport;
use serde::{Deserialize, Serialize};

pub const SARIF_VERSION: &str = "2.1.0";
pub const SARIF_SCHEMA: &str = "https://json.schemastore.org/sarif-2.1.0.json";
pub const RULE_ERROR: &str = "ABI001";
pub const RULE_WARNING: &str = "ABI002";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SarifLog {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub version: String,
    pub runs: Vec<SarifRun>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SarifRun {
    pub tool: SarifTool,
    pub results: Vec<SarifResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SarifTool {
    pub driver: SarifDriver,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SarifDriver {
    pub name: String,
    pub version: String,
    pub rules: Vec<SarifRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SarifRule {
    pub id: String,
    pub name: String,
    pub short_description: SarifMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SarifMessage {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SarifResult {
    pub rule_id: String,
    pub level: String,
    pub message: SarifMessage,
    pub locations: Vec<SarifLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SarifLocation {
    pub physical_location: SarifPhysicalLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SarifPhysicalLocation {
    pub artifact_location: SarifArtifactLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SarifArtifactLocation {
    pub uri: String,
}

fn result(rule: &str, level: &str, report: &VerifyReport, text: String) -> SarifResult {
    SarifResult {
        rule_id: rule.to_string(),
        level: level.to_string(),
        message: SarifMessage {
            text: format!("[{}] {}", report.target_name, text),
        },
        locations: vec![SarifLocation {
            physical_location: SarifPhysicalLocation {
                artifact_location: SarifArtifactLocation {
                    uri: report.header_path.replace('\\', "/"),
                },
            },
        }],
    }
}

/// Build one SARIF run covering every report, ordered by target
pub fn build_sarif(reports: &[VerifyReport]) -> SarifLog {
    let mut results = Vec::new();
    for report in sorted(reports) {
        for reason in &report.policy.reasons {
            results.push(result(
                RULE_ERROR,
                "error",
                report,
                format!("{}: {}", reason.code.as_str(), reason.message),
            ));
        }
        for warning in &report.policy.warnings {
            results.push(result(RULE_WARNING, "warning", report, warning.clone()));
        }
    }

    SarifLog {
        schema: SARIF_SCHEMA.to_string(),
        version: SARIF_VERSION.to_string(),
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: "abiguard".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    rules: vec![
                        SarifRule {
                            id: RULE_ERROR.to_string(),
                            name: "AbiPolicyViolation".to_string(),
                            short_description: SarifMessage {
                                text: "ABI change or diagnostic that fails policy".to_string(),
                            },
                        },
                        SarifRule {
                            id: RULE_WARNING.to_string(),
                            name: "AbiPolicyWarning".to_string(),
                            short_description: SarifMessage {
                                text: "ABI diagnostic that does not fail policy".to_string(),
                            },
                        },
                    ],
                },
            },
            results,
        }],
    }
}

/// Canonical JSON encoding of [`build_sarif`]
///
/// # Errors
///
/// `Serialization` if encoding fails.
pub fn render_sarif(reports: &[VerifyReport]) -> Result<String> {
    canonical_json(&build_sarif(reports))
}
