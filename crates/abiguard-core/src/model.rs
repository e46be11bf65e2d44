//! ABI surface data model
//!
//! These types are the persisted shape of a snapshot (and therefore of a
//! baseline). All keyed collections are `BTreeMap`/`BTreeSet` so that JSON
//! encoding is stable; ordered members (enum members, struct fields,
//! parameters) stay `Vec` because their order is part of the ABI.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Current on-disk snapshot schema version
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Declared ABI version, read from the header's version macros
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AbiVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl AbiVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for AbiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// How a parameter was declared
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParamModifier {
    #[default]
    None,
    /// `T name[N]`; the recorded type is the decayed pointer `T*`
    Array,
    /// `R (*name)(...)`; the recorded type is the declarator without the name
    FunctionPointer,
    /// `...`
    Variadic,
}

impl ParamModifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamModifier::None => "none",
            ParamModifier::Array => "array",
            ParamModifier::FunctionPointer => "function_pointer",
            ParamModifier::Variadic => "variadic",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub c_type: String,
    #[serde(default)]
    pub modifier: ParamModifier,
}

impl Param {
    /// Render the parameter as it would appear in a C prototype
    pub fn render_c(&self) -> String {
        match self.modifier {
            ParamModifier::Variadic => "...".to_string(),
            ParamModifier::FunctionPointer => match self.c_type.find("(*") {
                Some(idx) => format!(
                    "{}{}{}",
                    &self.c_type[..idx + 2],
                    self.name,
                    &self.c_type[idx + 2..]
                ),
                None => format!("{} {}", self.c_type, self.name),
            },
            ParamModifier::None | ParamModifier::Array => format!("{} {}", self.c_type, self.name),
        }
    }
}

/// An exported function
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub return_type: String,
    pub parameters: Vec<Param>,
    pub calling_convention: String,
}

impl Symbol {
    /// Canonical one-line signature used in change records and reports
    pub fn signature(&self) -> String {
        let params = if self.parameters.is_empty() {
            "void".to_string()
        } else {
            self.parameters
                .iter()
                .map(Param::render_c)
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "{} {} {}({})",
            self.return_type, self.calling_convention, self.name, params
        )
    }

    /// True when return type, parameters and calling convention all match
    pub fn same_signature(&self, other: &Symbol) -> bool {
        self.return_type == other.return_type
            && self.parameters == other.parameters
            && self.calling_convention == other.calling_convention
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnumMember {
    pub name: String,
    /// Statically evaluated value; absent when the initializer could not be evaluated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    /// Initializer text as declared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_expr: Option<String>,
}

impl EnumMember {
    pub fn is_resolved(&self) -> bool {
        self.value.is_some()
    }

    /// Human-readable value for reports
    pub fn describe_value(&self) -> String {
        match (&self.value, &self.value_expr) {
            (Some(v), Some(expr)) if expr != &v.to_string() => format!("{} ({})", v, expr),
            (Some(v), _) => v.to_string(),
            (None, Some(expr)) => format!("unresolved ({})", expr),
            (None, None) => "unresolved".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnumType {
    pub name: String,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StructField {
    pub name: String,
    #[serde(rename = "type")]
    pub c_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_width: Option<u32>,
    /// Whitespace-normalized declaration (without trailing ';')
    pub declaration: String,
}

impl StructField {
    /// Layout-relevant identity of a field (type, array extent, bit width)
    pub fn layout_key(&self) -> (&str, Option<&str>, Option<u32>) {
        (
            self.c_type.as_str(),
            self.array_size.as_deref(),
            self.bit_width,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<StructField>,
}

/// A prefixed function-pointer typedef
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallbackTypedef {
    pub name: String,
    pub return_type: String,
    pub parameters: Vec<Param>,
    pub declaration: String,
}

/// Header parser backends
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ParserBackend {
    /// Syntax-aware scan of externally preprocessed output
    Preprocessed,
    /// Direct scan of the raw header text
    Heuristic,
}

impl ParserBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParserBackend::Preprocessed => "preprocessed",
            ParserBackend::Heuristic => "heuristic",
        }
    }
}

impl fmt::Display for ParserBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which backend was asked for and which one produced the snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParserInfo {
    pub backend_requested: ParserBackend,
    pub backend: ParserBackend,
    pub fallback_used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Outcome of the binary export check
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BinaryCheck {
    Checked {
        path: String,
        allow_non_prefixed_exports: bool,
        diagnostics: ExportDiagnostics,
    },
    Skipped {
        reason: String,
    },
    NotConfigured,
}

impl BinaryCheck {
    pub fn status(&self) -> &'static str {
        match self {
            BinaryCheck::Checked { .. } => "checked",
            BinaryCheck::Skipped { .. } => "skipped",
            BinaryCheck::NotConfigured => "not_configured",
        }
    }
}

/// Reconciliation between header declarations and binary exports
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ExportDiagnostics {
    pub missing_in_binary: Vec<String>,
    pub extra_prefixed_in_binary: Vec<String>,
    pub non_prefixed_exports: Vec<String>,
    pub potential_calling_convention_mismatch: bool,
}

impl ExportDiagnostics {
    /// True when reconciliation found nothing that needs attention
    pub fn is_clean(&self, allow_non_prefixed_exports: bool) -> bool {
        self.missing_in_binary.is_empty()
            && self.extra_prefixed_in_binary.is_empty()
            && (allow_non_prefixed_exports || self.non_prefixed_exports.is_empty())
    }
}

/// Deterministic record of a target's ABI surface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AbiSnapshot {
    pub schema_version: u32,
    pub target_name: String,
    pub version: AbiVersion,
    pub header_path: String,
    pub functions: BTreeMap<String, Symbol>,
    pub enums: BTreeMap<String, EnumType>,
    pub structs: BTreeMap<String, StructType>,
    #[serde(default)]
    pub opaque_types: BTreeSet<String>,
    #[serde(default)]
    pub callbacks: BTreeMap<String, CallbackTypedef>,
    #[serde(default)]
    pub constants: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_exports: Option<BTreeSet<String>>,
    pub binary: BinaryCheck,
    pub parser: ParserInfo,
    /// SHA-256 over the canonical encoding, excluding this field and `generated_at`
    #[serde(default)]
    pub content_digest: String,
    /// RFC 3339 UTC timestamp of the run that produced this content
    pub generated_at: String,
}

impl AbiSnapshot {
    /// Function names in sorted order
    pub fn function_names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, ty: &str, modifier: ParamModifier) -> Param {
        Param {
            name: name.to_string(),
            c_type: ty.to_string(),
            modifier,
        }
    }

    #[test]
    fn test_signature_rendering() {
        let symbol = Symbol {
            name: "lrtc_set_cb".to_string(),
            return_type: "int".to_string(),
            parameters: vec![
                param("handle", "lrtc_factory_t*", ParamModifier::None),
                param("cb", "void(*)(void* user, int code)", ParamModifier::FunctionPointer),
                param("count", "uint32_t", ParamModifier::None),
            ],
            calling_convention: "LRTC_CALL".to_string(),
        };

        assert_eq!(
            symbol.signature(),
            "int LRTC_CALL lrtc_set_cb(lrtc_factory_t* handle, void(*cb)(void* user, int code), uint32_t count)"
        );
    }

    #[test]
    fn test_empty_parameter_list_renders_void() {
        let symbol = Symbol {
            name: "lrtc_init".to_string(),
            return_type: "void".to_string(),
            parameters: vec![],
            calling_convention: "LRTC_CALL".to_string(),
        };
        assert!(symbol.signature().ends_with("lrtc_init(void)"));
    }

    #[test]
    fn test_parameter_swap_changes_signature() {
        let a = Symbol {
            name: "f".to_string(),
            return_type: "int".to_string(),
            parameters: vec![
                param("width", "int", ParamModifier::None),
                param("height", "int", ParamModifier::None),
            ],
            calling_convention: "CALL".to_string(),
        };
        let mut b = a.clone();
        b.parameters.swap(0, 1);
        assert!(!a.same_signature(&b));
        assert!(a.same_signature(&a.clone()));
    }

    #[test]
    fn test_version_ordering() {
        assert!(AbiVersion::new(1, 2, 0) > AbiVersion::new(1, 1, 9));
        assert!(AbiVersion::new(2, 0, 0) > AbiVersion::new(1, 9, 9));
        assert_eq!(AbiVersion::new(1, 2, 3).to_string(), "1.2.3");
    }

    #[test]
    fn test_binary_check_serializes_with_status_tag() {
        let check = BinaryCheck::Skipped {
            reason: "explicit_skip".to_string(),
        };
        let json = serde_json::to_value(&check).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "explicit_skip");
    }
}
