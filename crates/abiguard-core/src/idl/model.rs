//! IDL document types
//!
//! The IDL is the only input the code generators read. It carries the whole
//! snapshot so that a snapshot can be rebuilt from it without loss.

use crate::model::{
    AbiVersion, BinaryCheck, CallbackTypedef, EnumType, ParamModifier, ParserBackend, ParserInfo,
    StructType,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Current IDL schema version
pub const IDL_SCHEMA_VERSION: u32 = 1;

/// Schema identifier written into every document
pub const IDL_SCHEMA_URI: &str = "urn:abiguard:idl:v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

impl Default for ToolInfo {
    fn default() -> Self {
        Self {
            name: "abiguard".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdlSource {
    pub header_path: String,
    pub parser_backend: ParserBackend,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdlSummary {
    pub function_count: usize,
    pub codegen_function_count: usize,
    pub enum_count: usize,
    pub struct_count: usize,
    pub opaque_type_count: usize,
    pub callback_count: usize,
    pub constant_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdlParameter {
    pub name: String,
    pub c_type: String,
    pub modifier: ParamModifier,
    /// Number of `*` in the type; zero for function pointers
    pub pointer_depth: u32,
    pub variadic: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Availability {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since_abi: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdlFunction {
    pub name: String,
    /// SHA-256 over name, return type and parameter names/types
    pub stable_id: String,
    pub c_return_type: String,
    pub calling_convention: String,
    pub parameters: Vec<IdlParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,
    #[serde(default)]
    pub availability: Availability,
    /// Selected by the codegen include/exclude patterns
    pub codegen: bool,
}

impl IdlFunction {
    pub fn is_variadic(&self) -> bool {
        self.parameters.iter().any(|p| p.variadic)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeaderTypes {
    pub enums: BTreeMap<String, EnumType>,
    pub structs: BTreeMap<String, StructType>,
    pub opaque_types: BTreeSet<String>,
    pub callbacks: BTreeMap<String, CallbackTypedef>,
    pub constants: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodegenSelection {
    pub include_symbols: Vec<String>,
    pub exclude_symbols: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationMetadata {
    pub generated_at: String,
    pub snapshot_schema_version: u32,
    pub snapshot_digest: String,
    pub binary: BinaryCheck,
    pub parser: ParserInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_exports: Option<BTreeSet<String>>,
}

/// Versioned, language-neutral description of one target's ABI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdlDocument {
    pub idl_schema_version: u32,
    pub idl_schema: String,
    pub tool: ToolInfo,
    /// SHA-256 of the canonical `{target, abi_version, functions}` payload
    pub content_fingerprint: String,
    pub target: String,
    pub abi_version: AbiVersion,
    pub source: IdlSource,
    pub summary: IdlSummary,
    pub functions: Vec<IdlFunction>,
    pub header_types: HeaderTypes,
    pub codegen: CodegenSelection,
    pub generation_metadata: GenerationMetadata,
}

impl IdlDocument {
    pub fn function(&self, name: &str) -> Option<&IdlFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Functions the generators should emit
    pub fn codegen_functions(&self) -> impl Iterator<Item = &IdlFunction> {
        self.functions.iter().filter(|f| f.codegen)
    }

    /// Whether `c_type` (with or without a trailing `*`) names an opaque type
    pub fn is_opaque_handle_type(&self, c_type: &str) -> bool {
        let base = c_type.trim().trim_end_matches('*').trim_end();
        self.header_types.opaque_types.contains(base)
    }
}
