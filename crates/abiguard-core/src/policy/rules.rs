//! Declarative policy rules.
//!
//! A rule fires when every condition in its `when` block holds. Firing
//! appends `[policy:<id>] <message> (target=<name>)` to the errors or the
//! warnings, depending on the rule severity.

use crate::config::{compile_patterns, RuleConfig, RuleSeverity, WhenValue};
use crate::diff::Severity;
use crate::errors::{ExError, ExErrorKind, Result};
use serde::{Deserialize, Serialize};

/// Lists a rule condition can inspect
#[derive(Debug, Clone, Default)]
pub struct RuleInputs {
    pub classification: Severity,
    pub removed_symbols: Vec<String>,
    pub added_symbols: Vec<String>,
    pub changed_signatures: Vec<String>,
    pub breaking_reasons: Vec<String>,
    pub additive_reasons: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl RuleInputs {
    fn list(&self, name: &str) -> Option<&[String]> {
        let list = match name {
            "removed_symbols" => &self.removed_symbols,
            "added_symbols" => &self.added_symbols,
            "changed_signatures" => &self.changed_signatures,
            "breaking_reasons" => &self.breaking_reasons,
            "additive_reasons" => &self.additive_reasons,
            "warnings" => &self.warnings,
            "errors" => &self.errors,
            _ => return None,
        };
        Some(list)
    }
}

/// A rule that fired
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppliedRule {
    pub id: String,
    pub severity: RuleSeverity,
    pub message: String,
}

fn bad_condition(rule: &RuleConfig, cond: &str) -> ExError {
    ExError::new(ExErrorKind::InvalidConfig)
        .with_op("apply_rules")
        .with_key(format!("rules.{}.when.{}", rule.id, cond))
        .with_message(format!("unsupported condition '{}'", cond))
}

fn condition_holds(rule: &RuleConfig, cond: &str, value: &WhenValue, inputs: &RuleInputs) -> Result<bool> {
    let classification = inputs.classification.as_str();
    match (cond, value) {
        ("classification_in", WhenValue::List(items)) => {
            Ok(items.iter().any(|c| c == classification))
        }
        ("classification_not_in", WhenValue::List(items)) => {
            Ok(!items.iter().any(|c| c == classification))
        }
        (name, WhenValue::Count(threshold)) if name.ends_with("_count_gt") => {
            let list = inputs
                .list(name.trim_end_matches("_count_gt"))
                .ok_or_else(|| bad_condition(rule, cond))?;
            Ok(i64::try_from(list.len()).unwrap_or(i64::MAX) > *threshold)
        }
        (name, WhenValue::List(patterns))
            if name.ends_with("_regex_any") || name.ends_with("_regex_all") =>
        {
            let list = inputs
                .list(&name[..name.len() - "_regex_any".len()])
                .ok_or_else(|| bad_condition(rule, cond))?;
            let regexes = compile_patterns(patterns, &format!("rules.{}.when.{}", rule.id, cond))?;
            let hit = |re: &regex::Regex| list.iter().any(|v| re.is_match(v));
            if name.ends_with("_regex_all") {
                Ok(regexes.iter().all(hit))
            } else {
                Ok(regexes.is_empty() || regexes.iter().any(hit))
            }
        }
        _ => Err(bad_condition(rule, cond)),
    }
}

/// Evaluate enabled rules in order and append their messages
///
/// # Errors
///
/// `InvalidConfig` for conditions that validation would have rejected.
pub fn apply_rules(
    rules: &[RuleConfig],
    inputs: &RuleInputs,
    target_name: &str,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) -> Result<Vec<AppliedRule>> {
    let mut applied = Vec::new();
    for rule in rules.iter().filter(|r| r.enabled) {
        let mut fires = true;
        for (cond, value) in &rule.when {
            if !condition_holds(rule, cond, value, inputs)? {
                fires = false;
                break;
            }
        }
        if !fires {
            continue;
        }

        let message = format!("[policy:{}] {} (target={})", rule.id, rule.message, target_name);
        match rule.severity {
            RuleSeverity::Error => errors.push(message.clone()),
            RuleSeverity::Warning => warnings.push(message.clone()),
        }
        tracing::debug!(rule = %rule.id, target = %target_name, "policy rule fired");
        applied.push(AppliedRule {
            id: rule.id.clone(),
            severity: rule.severity,
            message,
        });
    }
    Ok(applied)
}
