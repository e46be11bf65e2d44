//! Typed configuration model
//!
//! The document is deserialized by the store (TOML or YAML); this module
//! owns the shape, the defaults and the validation. Validation errors name
//! the dotted key path of the offending entry.

use crate::diff::model::Severity;
use crate::errors::{ExError, ExErrorKind, Result};
use crate::model::ParserBackend;
use crate::policy::waivers::parse_utc_timestamp;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_true() -> bool {
    true
}

/// Whole configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Root policy, merged into every target
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TargetConfig {
    /// Baseline snapshot path
    #[serde(default)]
    pub baseline: Option<String>,
    #[serde(default)]
    pub header: HeaderConfig,
    #[serde(default)]
    pub binary: Option<BinaryConfig>,
    #[serde(default)]
    pub codegen: Option<CodegenConfig>,
    #[serde(default)]
    pub bindings: BindingsConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionMacros {
    #[serde(default)]
    pub major: String,
    #[serde(default)]
    pub minor: String,
    #[serde(default)]
    pub patch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeaderConfig {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub api_macro: String,
    #[serde(default)]
    pub call_macro: String,
    #[serde(default)]
    pub symbol_prefix: String,
    #[serde(default)]
    pub version_macros: VersionMacros,
    #[serde(default)]
    pub enum_include: Vec<String>,
    #[serde(default)]
    pub enum_exclude: Vec<String>,
    #[serde(default)]
    pub enum_ignore: Vec<String>,
    #[serde(default)]
    pub struct_include: Vec<String>,
    #[serde(default)]
    pub struct_exclude: Vec<String>,
    #[serde(default)]
    pub struct_ignore: Vec<String>,
    #[serde(default = "default_true")]
    pub struct_tail_addition_is_breaking: bool,
    #[serde(default)]
    pub parser: ParserConfig,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            api_macro: String::new(),
            call_macro: String::new(),
            symbol_prefix: String::new(),
            version_macros: VersionMacros::default(),
            enum_include: Vec::new(),
            enum_exclude: Vec::new(),
            enum_ignore: Vec::new(),
            struct_include: Vec::new(),
            struct_exclude: Vec::new(),
            struct_ignore: Vec::new(),
            struct_tail_addition_is_breaking: true,
            parser: ParserConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParserConfig {
    #[serde(default = "default_backend")]
    pub backend: ParserBackend,
    #[serde(default = "default_true")]
    pub fallback_to_heuristic: bool,
    /// Preprocessor executable; `clang`, `gcc`, `cc` are tried when unset
    #[serde(default)]
    pub compiler: Option<String>,
    #[serde(default)]
    pub include_dirs: Vec<String>,
    /// `NAME` or `NAME=VALUE`
    #[serde(default)]
    pub defines: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_backend() -> ParserBackend {
    ParserBackend::Preprocessed
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            fallback_to_heuristic: true,
            compiler: None,
            include_dirs: Vec::new(),
            defines: Vec::new(),
            args: Vec::new(),
        }
    }
}

/// Text format of a pre-captured export listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListingFormat {
    Nm,
    Readelf,
    Objdump,
    Dumpbin,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BinaryConfig {
    /// Compiled shared library
    #[serde(default)]
    pub path: Option<String>,
    /// Export listing captured by `nm`/`readelf`/`objdump`/`dumpbin`
    #[serde(default)]
    pub exports_listing: Option<String>,
    #[serde(default)]
    pub listing_format: Option<ListingFormat>,
    #[serde(default)]
    pub allow_non_prefixed_exports: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CodegenConfig {
    /// IDL document path
    #[serde(default)]
    pub idl: String,
    #[serde(default)]
    pub include_symbols: Vec<String>,
    #[serde(default)]
    pub exclude_symbols: Vec<String>,
    #[serde(default)]
    pub generators: Vec<GeneratorEntry>,
    /// Per-function IDL annotations
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionAnnotations>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratorEntry {
    pub name: String,
    pub output: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionAnnotations {
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub deprecated: Option<String>,
    #[serde(default)]
    pub since_abi: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BindingsConfig {
    /// Symbols the bindings expect; compared against the header when set
    #[serde(default)]
    pub symbols: Option<Vec<String>>,
    #[serde(default)]
    pub csharp: Option<CSharpBindings>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CSharpBindings {
    pub namespace: String,
    pub library_name: String,
    #[serde(default = "default_class_name")]
    pub class_name: String,
    /// Files or directories holding hand-written wrapper types
    #[serde(default)]
    pub managed_sources: Vec<String>,
    #[serde(default)]
    pub handles: Vec<HandleMetadata>,
    #[serde(default)]
    pub overrides: BTreeMap<String, FunctionBinding>,
}

fn default_class_name() -> String {
    "NativeMethods".to_string()
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Accessibility {
    Public,
    #[default]
    Internal,
}

impl Accessibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Accessibility::Public => "public",
            Accessibility::Internal => "internal",
        }
    }
}

/// Mapping of an opaque native handle to a managed wrapper type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandleMetadata {
    pub namespace: String,
    pub type_name: String,
    #[serde(default)]
    pub access: Accessibility,
    pub release_function_name: String,
    pub c_handle_type: String,
    #[serde(default = "default_base_type")]
    pub base_type: String,
}

fn default_base_type() -> String {
    "SafeHandle".to_string()
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParamDirection {
    #[default]
    None,
    In,
    Out,
    Ref,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParamBinding {
    #[serde(default)]
    pub managed_type: Option<String>,
    #[serde(default)]
    pub modifier: ParamDirection,
    #[serde(default)]
    pub marshal_as: Option<String>,
}

/// Managed-side overrides for one native function
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionBinding {
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub return_marshal_as: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamBinding>,
}

// ========== Policy ==========

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleSeverity {
    #[default]
    Error,
    Warning,
}

impl RuleSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleSeverity::Error => "error",
            RuleSeverity::Warning => "warning",
        }
    }
}

/// Value of one `when` condition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum WhenValue {
    Count(i64),
    List(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleConfig {
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub severity: RuleSeverity,
    pub message: String,
    #[serde(default)]
    pub when: BTreeMap<String, WhenValue>,
}

/// Which diagnostics a waiver may cover
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WaiverSeverity {
    #[default]
    Any,
    Breaking,
    Additive,
    Error,
    Warning,
}

impl WaiverSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaiverSeverity::Any => "any",
            WaiverSeverity::Breaking => "breaking",
            WaiverSeverity::Additive => "additive",
            WaiverSeverity::Error => "error",
            WaiverSeverity::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WaiverMatcher {
    /// Regex searched in the change or diagnostic description
    pub pattern: String,
    /// Regexes over the target name; empty matches every target
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub severity: WaiverSeverity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WaiverConfig {
    pub id: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub ticket: Option<String>,
    #[serde(default)]
    pub created_utc: Option<String>,
    #[serde(default)]
    pub expires_utc: Option<String>,
    pub applies_to: WaiverMatcher,
}

impl WaiverConfig {
    /// Names of the metadata fields this waiver lacks
    pub fn missing_metadata(&self) -> Vec<&'static str> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        [
            ("owner", &self.owner),
            ("reason", &self.reason),
            ("approved_by", &self.approved_by),
            ("ticket", &self.ticket),
            ("created_utc", &self.created_utc),
            ("expires_utc", &self.expires_utc),
        ]
        .into_iter()
        .filter(|(_, v)| !present(v))
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WaiverRequirements {
    #[serde(default)]
    pub require_owner: Option<bool>,
    #[serde(default)]
    pub require_reason: Option<bool>,
    #[serde(default)]
    pub require_expires_utc: Option<bool>,
    #[serde(default)]
    pub require_approved_by: Option<bool>,
    #[serde(default)]
    pub require_ticket: Option<bool>,
    #[serde(default)]
    pub max_ttl_days: Option<u32>,
    #[serde(default)]
    pub warn_expiring_within_days: Option<u32>,
}

impl WaiverRequirements {
    /// Field-wise overlay; values set in `other` win
    pub fn overlay(&self, other: &WaiverRequirements) -> WaiverRequirements {
        WaiverRequirements {
            require_owner: other.require_owner.or(self.require_owner),
            require_reason: other.require_reason.or(self.require_reason),
            require_expires_utc: other.require_expires_utc.or(self.require_expires_utc),
            require_approved_by: other.require_approved_by.or(self.require_approved_by),
            require_ticket: other.require_ticket.or(self.require_ticket),
            max_ttl_days: other.max_ttl_days.or(self.max_ttl_days),
            warn_expiring_within_days: other
                .warn_expiring_within_days
                .or(self.warn_expiring_within_days),
        }
    }
}

/// Policy block; scalars are optional so per-target values can override root ones
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PolicyConfig {
    #[serde(default)]
    pub max_allowed_classification: Option<Severity>,
    #[serde(default)]
    pub fail_on_warnings: Option<bool>,
    #[serde(default)]
    pub fail_on_expired: Option<bool>,
    #[serde(default)]
    pub fail_on_missing_metadata: Option<bool>,
    /// YAML file with a list of waivers
    #[serde(default)]
    pub waivers_file: Option<String>,
    #[serde(default)]
    pub waiver_requirements: WaiverRequirements,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub waivers: Vec<WaiverConfig>,
}

// ========== Validation ==========

fn missing_key(key: String) -> ExError {
    ExError::new(ExErrorKind::MissingConfigKey)
        .with_op("validate_config")
        .with_message(format!("missing required key '{}'", key))
        .with_key(key)
}

fn invalid(key: String, message: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::InvalidConfig)
        .with_op("validate_config")
        .with_message(message)
        .with_key(key)
}

/// Compile a list of regexes, naming `key[i]` on failure
///
/// # Errors
///
/// Returns `InvalidConfig` for the first pattern that does not compile.
pub fn compile_patterns(patterns: &[String], key: &str) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .enumerate()
        .map(|(i, p)| {
            Regex::new(p).map_err(|e| {
                invalid(
                    format!("{}[{}]", key, i),
                    format!("invalid regex '{}': {}", p, e),
                )
            })
        })
        .collect()
}

const RULE_LISTS: &[&str] = &[
    "removed_symbols",
    "added_symbols",
    "changed_signatures",
    "breaking_reasons",
    "additive_reasons",
    "warnings",
    "errors",
];

fn validate_rule(rule: &RuleConfig, key: &str) -> Result<()> {
    if rule.id.trim().is_empty() {
        return Err(missing_key(format!("{}.id", key)));
    }
    for (cond, value) in &rule.when {
        let cond_key = format!("{}.when.{}", key, cond);
        match (cond.as_str(), value) {
            ("classification_in" | "classification_not_in", WhenValue::List(items)) => {
                for item in items {
                    if !matches!(item.as_str(), "none" | "additive" | "breaking") {
                        return Err(invalid(
                            cond_key,
                            format!("unknown classification '{}'", item),
                        ));
                    }
                }
            }
            (name, WhenValue::Count(n)) if name.ends_with("_count_gt") => {
                let list = name.trim_end_matches("_count_gt");
                if !RULE_LISTS.contains(&list) || *n < 0 {
                    return Err(invalid(cond_key, "unknown list or negative threshold"));
                }
            }
            (name, WhenValue::List(patterns))
                if name.ends_with("_regex_any") || name.ends_with("_regex_all") =>
            {
                let list = &name[..name.len() - "_regex_any".len()];
                if !RULE_LISTS.contains(&list) {
                    return Err(invalid(cond_key, format!("unknown list '{}'", list)));
                }
                compile_patterns(patterns, &cond_key)?;
            }
            _ => {
                return Err(invalid(
                    cond_key,
                    format!("unsupported condition '{}'", cond),
                ))
            }
        }
    }
    Ok(())
}

/// Validate one waiver against the effective requirements
///
/// # Errors
///
/// Returns `InvalidConfig` naming the waiver and the offending key.
pub fn validate_waiver(
    waiver: &WaiverConfig,
    requirements: &WaiverRequirements,
    key: &str,
) -> Result<()> {
    if waiver.id.trim().is_empty() {
        return Err(missing_key(format!("{}.id", key)));
    }
    if waiver.applies_to.pattern.is_empty() {
        return Err(missing_key(format!("{}.applies_to.pattern", key)));
    }
    compile_patterns(
        std::slice::from_ref(&waiver.applies_to.pattern),
        &format!("{}.applies_to.pattern", key),
    )?;
    compile_patterns(
        &waiver.applies_to.targets,
        &format!("{}.applies_to.targets", key),
    )?;

    let mut timestamps = Vec::new();
    for (field, value) in [
        ("created_utc", &waiver.created_utc),
        ("expires_utc", &waiver.expires_utc),
    ] {
        if let Some(raw) = value {
            let parsed = parse_utc_timestamp(raw).ok_or_else(|| {
                invalid(
                    format!("{}.{}", key, field),
                    format!("waiver '{}' has an invalid timestamp '{}'", waiver.id, raw),
                )
            })?;
            timestamps.push(Some(parsed));
        } else {
            timestamps.push(None);
        }
    }

    let required = [
        ("owner", requirements.require_owner, &waiver.owner),
        ("reason", requirements.require_reason, &waiver.reason),
        ("expires_utc", requirements.require_expires_utc, &waiver.expires_utc),
        ("approved_by", requirements.require_approved_by, &waiver.approved_by),
        ("ticket", requirements.require_ticket, &waiver.ticket),
    ];
    for (field, flag, value) in required {
        let present = value.as_deref().is_some_and(|v| !v.trim().is_empty());
        if flag.unwrap_or(false) && !present {
            return Err(invalid(
                format!("{}.{}", key, field),
                format!(
                    "waiver '{}' is missing '{}' required by waiver_requirements",
                    waiver.id, field
                ),
            ));
        }
    }

    if let Some(max_ttl) = requirements.max_ttl_days {
        let (Some(created), Some(expires)) = (timestamps[0], timestamps[1]) else {
            return Err(invalid(
                key.to_string(),
                format!(
                    "waiver '{}' needs created_utc and expires_utc when max_ttl_days is set",
                    waiver.id
                ),
            ));
        };
        let ttl = expires - created;
        if ttl < chrono::Duration::zero() {
            return Err(invalid(
                format!("{}.expires_utc", key),
                format!("waiver '{}' expires before it was created", waiver.id),
            ));
        }
        if ttl > chrono::Duration::days(i64::from(max_ttl)) {
            return Err(invalid(
                format!("{}.expires_utc", key),
                format!(
                    "waiver '{}' lasts {} days, more than max_ttl_days={}",
                    waiver.id,
                    ttl.num_days(),
                    max_ttl
                ),
            ));
        }
    }
    Ok(())
}

impl PolicyConfig {
    fn validate(&self, key: &str, requirements: &WaiverRequirements) -> Result<()> {
        for (i, rule) in self.rules.iter().enumerate() {
            validate_rule(rule, &format!("{}.rules[{}]", key, i))?;
        }
        for (i, waiver) in self.waivers.iter().enumerate() {
            validate_waiver(waiver, requirements, &format!("{}.waivers[{}]", key, i))?;
        }
        Ok(())
    }
}

impl HeaderConfig {
    fn validate(&self, key: &str) -> Result<()> {
        let required = [
            ("path", &self.path),
            ("api_macro", &self.api_macro),
            ("call_macro", &self.call_macro),
            ("symbol_prefix", &self.symbol_prefix),
            ("version_macros.major", &self.version_macros.major),
            ("version_macros.minor", &self.version_macros.minor),
            ("version_macros.patch", &self.version_macros.patch),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(missing_key(format!("{}.{}", key, name)));
            }
        }
        for (name, patterns) in [
            ("enum_include", &self.enum_include),
            ("enum_exclude", &self.enum_exclude),
            ("struct_include", &self.struct_include),
            ("struct_exclude", &self.struct_exclude),
        ] {
            compile_patterns(patterns, &format!("{}.{}", key, name))?;
        }
        Ok(())
    }
}

impl Config {
    /// Look up a target by name
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no such target is configured.
    pub fn target(&self, name: &str) -> Result<&TargetConfig> {
        self.targets.get(name).ok_or_else(|| {
            ExError::new(ExErrorKind::NotFound)
                .with_op("select_target")
                .with_target(name)
                .with_message(format!("unknown target '{}'", name))
        })
    }

    /// Check required keys, patterns, generator names and waiver metadata
    ///
    /// # Errors
    ///
    /// Returns `MissingConfigKey` or `InvalidConfig` naming the key path.
    pub fn validate(&self) -> Result<()> {
        let root_requirements = &self.policy.waiver_requirements;
        self.policy.validate("policy", root_requirements)?;

        for (name, target) in &self.targets {
            let key = format!("targets.{}", name);
            target.header.validate(&format!("{}.header", key))?;

            if let Some(binary) = &target.binary {
                if binary.path.is_none() && binary.exports_listing.is_none() {
                    return Err(missing_key(format!("{}.binary.path", key)));
                }
                if binary.exports_listing.is_some() && binary.listing_format.is_none() {
                    return Err(missing_key(format!("{}.binary.listing_format", key)));
                }
            }

            if let Some(codegen) = &target.codegen {
                if codegen.idl.trim().is_empty() {
                    return Err(missing_key(format!("{}.codegen.idl", key)));
                }
                compile_patterns(
                    &codegen.include_symbols,
                    &format!("{}.codegen.include_symbols", key),
                )?;
                compile_patterns(
                    &codegen.exclude_symbols,
                    &format!("{}.codegen.exclude_symbols", key),
                )?;
                for (i, entry) in codegen.generators.iter().enumerate() {
                    if !crate::codegen::registry::is_known(&entry.name) {
                        return Err(ExError::new(ExErrorKind::UnknownGenerator)
                            .with_op("validate_config")
                            .with_target(name.clone())
                            .with_key(format!("{}.codegen.generators[{}].name", key, i))
                            .with_message(format!("unknown generator '{}'", entry.name)));
                    }
                    if entry.output.trim().is_empty() {
                        return Err(missing_key(format!(
                            "{}.codegen.generators[{}].output",
                            key, i
                        )));
                    }
                }
            }

            let requirements = root_requirements.overlay(&target.policy.waiver_requirements);
            target
                .policy
                .validate(&format!("{}.policy", key), &requirements)?;
            // Root waivers must also satisfy a stricter per-target overlay
            for (i, waiver) in self.policy.waivers.iter().enumerate() {
                validate_waiver(waiver, &requirements, &format!("policy.waivers[{}]", i))?;
            }
        }
        Ok(())
    }
}
