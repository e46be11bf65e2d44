//! Bindings symbol list check.
//!
//! A target may list the functions its bindings expect. Both directions of
//! mismatch are errors; an absent list only produces a warning.

use crate::model::Symbol;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Error and warning messages produced by a check
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Findings {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Findings {
    pub fn extend(&mut self, other: Findings) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// Compare the configured bindings symbol list with the header functions
pub fn check_binding_symbols(
    target: &str,
    functions: &BTreeMap<String, Symbol>,
    symbols: Option<&[String]>,
) -> Findings {
    let mut findings = Findings::default();
    let Some(symbols) = symbols else {
        findings.warnings.push(format!(
            "bindings symbol list not configured; binding coverage not checked (target={})",
            target
        ));
        return findings;
    };

    let bound: BTreeSet<&str> = symbols.iter().map(String::as_str).collect();
    for name in functions.keys() {
        if !bound.contains(name.as_str()) {
            findings.errors.push(format!(
                "header symbol '{}' is missing from bindings (target={})",
                name, target
            ));
        }
    }
    for name in &bound {
        if !functions.contains_key(*name) {
            findings.errors.push(format!(
                "bindings reference '{}' which the header does not declare (target={})",
                name, target
            ));
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn functions(names: &[&str]) -> BTreeMap<String, Symbol> {
        names
            .iter()
            .map(|n| {
                (
                    n.to_string(),
                    Symbol {
                        name: n.to_string(),
                        return_type: "void".to_string(),
                        parameters: Vec::new(),
                        calling_convention: "LRTC_CALL".to_string(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_unconfigured_list_warns() {
        let findings = check_binding_symbols("core", &functions(&["lrtc_a"]), None);
        assert!(findings.errors.is_empty());
        assert_eq!(findings.warnings.len(), 1);
    }

    #[test]
    fn test_both_directions_are_errors() {
        let list = vec!["lrtc_a".to_string(), "lrtc_stale".to_string()];
        let findings =
            check_binding_symbols("core", &functions(&["lrtc_a", "lrtc_b"]), Some(&list));
        assert_eq!(findings.errors.len(), 2);
        assert!(findings.errors[0].contains("lrtc_b"));
        assert!(findings.errors[1].contains("lrtc_stale"));
    }
}
