//! Diff output types.
//!
//! All types implement `Debug, Clone, Serialize, Deserialize, PartialEq`.
//! Records are kept in a sorted `Vec` for deterministic serialization.

use crate::model::AbiVersion;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema version of [`DiffResult`]
pub const DIFF_SCHEMA_VERSION: u32 = 1;

/// Three-level severity applied to every change.
///
/// Ordering is significant: `Breaking > Additive > None`.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    None,
    Additive,
    Breaking,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Additive => "additive",
            Severity::Breaking => "breaking",
        }
    }

    /// Parse the lowercase name used in configuration and reports
    pub fn parse(text: &str) -> Option<Severity> {
        match text {
            "none" => Some(Severity::None),
            "additive" => Some(Severity::Additive),
            "breaking" => Some(Severity::Breaking),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the subject
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeKind {
    SymbolAdded,
    SymbolRemoved,
    ParamChanged,
    EnumMemberAdded,
    EnumMemberRemoved,
    EnumMemberChanged,
    StructFieldAdded,
    StructFieldRemoved,
    StructFieldReordered,
    StructFieldRetyped,
    VersionMismatch,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::SymbolAdded => "SymbolAdded",
            ChangeKind::SymbolRemoved => "SymbolRemoved",
            ChangeKind::ParamChanged => "ParamChanged",
            ChangeKind::EnumMemberAdded => "EnumMemberAdded",
            ChangeKind::EnumMemberRemoved => "EnumMemberRemoved",
            ChangeKind::EnumMemberChanged => "EnumMemberChanged",
            ChangeKind::StructFieldAdded => "StructFieldAdded",
            ChangeKind::StructFieldRemoved => "StructFieldRemoved",
            ChangeKind::StructFieldReordered => "StructFieldReordered",
            ChangeKind::StructFieldRetyped => "StructFieldRetyped",
            ChangeKind::VersionMismatch => "VersionMismatch",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which kind of declaration `subject_name` names
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Function,
    Enum,
    Struct,
    OpaqueType,
    Callback,
    /// The declared ABI version itself
    Version,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Function => "function",
            Scope::Enum => "enum",
            Scope::Struct => "struct",
            Scope::OpaqueType => "opaque_type",
            Scope::Callback => "callback",
            Scope::Version => "version",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified difference between baseline and current
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChangeRecord {
    pub scope: Scope,
    /// Declaration name; members and fields are `Parent.member`
    pub subject_name: String,
    pub kind: ChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    pub severity: Severity,
}

impl ChangeRecord {
    pub fn new(kind: ChangeKind, scope: Scope, subject: impl Into<String>, severity: Severity) -> Self {
        Self {
            scope,
            subject_name: subject.into(),
            kind,
            before: None,
            after: None,
            severity,
        }
    }

    pub fn with_before(mut self, before: impl Into<String>) -> Self {
        self.before = Some(before.into());
        self
    }

    pub fn with_after(mut self, after: impl Into<String>) -> Self {
        self.after = Some(after.into());
        self
    }

    /// One-line description; waiver patterns and rule regexes match against it
    pub fn describe(&self) -> String {
        let subject = &self.subject_name;
        let scope = self.scope;
        let before = self.before.as_deref().unwrap_or("");
        let after = self.after.as_deref().unwrap_or("");
        match self.kind {
            ChangeKind::SymbolAdded => format!("{} {} added", scope, subject),
            ChangeKind::SymbolRemoved => format!("{} {} removed", scope, subject),
            ChangeKind::ParamChanged => {
                format!("{} {} signature changed: {} -> {}", scope, subject, before, after)
            }
            ChangeKind::EnumMemberAdded => format!("enum member {} added", subject),
            ChangeKind::EnumMemberRemoved => format!("enum member {} removed", subject),
            ChangeKind::EnumMemberChanged => {
                format!("enum member {} value changed: {} -> {}", subject, before, after)
            }
            ChangeKind::StructFieldAdded => format!("struct field {} added", subject),
            ChangeKind::StructFieldRemoved => format!("struct field {} removed", subject),
            ChangeKind::StructFieldReordered => {
                format!("struct {} fields reordered: {} -> {}", subject, before, after)
            }
            ChangeKind::StructFieldRetyped => {
                format!("struct field {} retyped: {} -> {}", subject, before, after)
            }
            ChangeKind::VersionMismatch => {
                format!("abi version changed: {} -> {}", before, after)
            }
        }
    }
}

/// Record counts per severity
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffSummary {
    pub total: usize,
    pub breaking: usize,
    pub additive: usize,
    pub none: usize,
}

/// Structured diff between a baseline and a current snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiffResult {
    pub diff_schema_version: u32,
    pub baseline_version: AbiVersion,
    pub current_version: AbiVersion,
    /// Maximum severity across all records
    pub classification: Severity,
    pub summary: DiffSummary,
    /// Sorted by `(scope, subject_name, kind, before, after)`
    pub records: Vec<ChangeRecord>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn function_names(&self, kind: ChangeKind) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.scope == Scope::Function && r.kind == kind)
            .map(|r| r.subject_name.clone())
            .collect()
    }

    pub fn removed_functions(&self) -> Vec<String> {
        self.function_names(ChangeKind::SymbolRemoved)
    }

    pub fn added_functions(&self) -> Vec<String> {
        self.function_names(ChangeKind::SymbolAdded)
    }

    pub fn changed_functions(&self) -> Vec<String> {
        self.function_names(ChangeKind::ParamChanged)
    }

    /// Records at exactly `severity`
    pub fn records_with(&self, severity: Severity) -> impl Iterator<Item = &ChangeRecord> {
        self.records.iter().filter(move |r| r.severity == severity)
    }
}
