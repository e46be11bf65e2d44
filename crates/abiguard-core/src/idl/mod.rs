//! IDL generation and snapshot reconstruction.
//!
//! `reconstruct_snapshot(generate_idl(s))` must diff against `s` with zero
//! changes, so every function is written (codegen filtering only sets the
//! `codegen` flag) and every snapshot field has a home in the document.

pub mod model;

pub use model::{
    Availability, CodegenSelection, GenerationMetadata, HeaderTypes, IdlDocument, IdlFunction,
    IdlParameter, IdlSource, IdlSummary, ToolInfo, IDL_SCHEMA_URI, IDL_SCHEMA_VERSION,
};

use crate::config::{compile_patterns, CodegenConfig};
use crate::errors::{ExError, ExErrorKind, Result};
use crate::model::{AbiSnapshot, AbiVersion, Param, ParamModifier, Symbol};
use crate::snapshot::{canonical_json, hash_string};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

fn pointer_depth(param: &Param) -> u32 {
    match param.modifier {
        ParamModifier::FunctionPointer | ParamModifier::Variadic => 0,
        ParamModifier::None | ParamModifier::Array => {
            u32::try_from(param.c_type.matches('*').count()).unwrap_or(u32::MAX)
        }
    }
}

fn stable_id(symbol: &Symbol) -> String {
    let params = symbol
        .parameters
        .iter()
        .map(|p| format!("{}:{}", p.name, p.c_type))
        .collect::<Vec<_>>()
        .join(",");
    hash_string(&format!("{}|{}|{}", symbol.name, symbol.return_type, params))
}

struct Selection {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl Selection {
    fn compile(codegen: Option<&CodegenConfig>) -> Result<Self> {
        let Some(codegen) = codegen else {
            return Ok(Self {
                include: Vec::new(),
                exclude: Vec::new(),
            });
        };
        Ok(Self {
            include: compile_patterns(&codegen.include_symbols, "codegen.include_symbols")?,
            exclude: compile_patterns(&codegen.exclude_symbols, "codegen.exclude_symbols")?,
        })
    }

    fn selects(&self, name: &str) -> bool {
        (self.include.is_empty() || self.include.iter().any(|re| re.is_match(name)))
            && !self.exclude.iter().any(|re| re.is_match(name))
    }
}

#[derive(Serialize)]
struct FingerprintPayload<'a> {
    target: &'a str,
    abi_version: &'a AbiVersion,
    functions: &'a [IdlFunction],
}

fn fingerprint(target: &str, abi_version: &AbiVersion, functions: &[IdlFunction]) -> Result<String> {
    let payload = FingerprintPayload {
        target,
        abi_version,
        functions,
    };
    Ok(hash_string(&canonical_json(&payload)?))
}

fn idl_function(symbol: &Symbol, codegen: Option<&CodegenConfig>, selection: &Selection) -> IdlFunction {
    let annotations = codegen.and_then(|c| c.functions.get(&symbol.name));
    IdlFunction {
        name: symbol.name.clone(),
        stable_id: stable_id(symbol),
        c_return_type: symbol.return_type.clone(),
        calling_convention: symbol.calling_convention.clone(),
        parameters: symbol
            .parameters
            .iter()
            .map(|p| IdlParameter {
                name: p.name.clone(),
                c_type: p.c_type.clone(),
                modifier: p.modifier,
                pointer_depth: pointer_depth(p),
                variadic: p.modifier == ParamModifier::Variadic,
            })
            .collect(),
        documentation: annotations.and_then(|a| a.documentation.clone()),
        deprecated: annotations.and_then(|a| a.deprecated.clone()),
        availability: Availability {
            since_abi: annotations.and_then(|a| a.since_abi.clone()),
        },
        codegen: selection.selects(&symbol.name),
    }
}

/// Render a snapshot into an IDL document
///
/// # Errors
///
/// `InvalidConfig` for bad include/exclude patterns; `Serialization` if
/// the fingerprint payload cannot be encoded.
pub fn generate_idl(snapshot: &AbiSnapshot, codegen: Option<&CodegenConfig>) -> Result<IdlDocument> {
    let selection = Selection::compile(codegen)
        .map_err(|e| e.with_target(snapshot.target_name.clone()))?;

    let functions: Vec<IdlFunction> = snapshot
        .functions
        .values()
        .map(|symbol| idl_function(symbol, codegen, &selection))
        .collect();

    let summary = IdlSummary {
        function_count: functions.len(),
        codegen_function_count: functions.iter().filter(|f| f.codegen).count(),
        enum_count: snapshot.enums.len(),
        struct_count: snapshot.structs.len(),
        opaque_type_count: snapshot.opaque_types.len(),
        callback_count: snapshot.callbacks.len(),
        constant_count: snapshot.constants.len(),
    };

    let content_fingerprint = fingerprint(&snapshot.target_name, &snapshot.version, &functions)?;

    Ok(IdlDocument {
        idl_schema_version: IDL_SCHEMA_VERSION,
        idl_schema: IDL_SCHEMA_URI.to_string(),
        tool: ToolInfo::default(),
        content_fingerprint,
        target: snapshot.target_name.clone(),
        abi_version: snapshot.version,
        source: IdlSource {
            header_path: snapshot.header_path.clone(),
            parser_backend: snapshot.parser.backend,
        },
        summary,
        functions,
        header_types: HeaderTypes {
            enums: snapshot.enums.clone(),
            structs: snapshot.structs.clone(),
            opaque_types: snapshot.opaque_types.clone(),
            callbacks: snapshot.callbacks.clone(),
            constants: snapshot.constants.clone(),
        },
        codegen: CodegenSelection {
            include_symbols: codegen.map(|c| c.include_symbols.clone()).unwrap_or_default(),
            exclude_symbols: codegen.map(|c| c.exclude_symbols.clone()).unwrap_or_default(),
        },
        generation_metadata: GenerationMetadata {
            generated_at: snapshot.generated_at.clone(),
            snapshot_schema_version: snapshot.schema_version,
            snapshot_digest: snapshot.content_digest.clone(),
            binary: snapshot.binary.clone(),
            parser: snapshot.parser.clone(),
            binary_exports: snapshot.binary_exports.clone(),
        },
    })
}

/// Parse an IDL document, rejecting unknown schema versions
///
/// # Errors
///
/// `Serialization` for malformed JSON; `UnsupportedSchemaVersion` when the
/// document declares a version this build cannot read.
pub fn parse_idl(text: &str) -> Result<IdlDocument> {
    let raw: serde_json::Value = serde_json::from_str(text)?;
    let version = raw
        .get("idl_schema_version")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| {
            ExError::new(ExErrorKind::InvalidSnapshot)
                .with_op("parse_idl")
                .with_message("IDL document has no idl_schema_version")
        })?;
    if version != u64::from(IDL_SCHEMA_VERSION) {
        return Err(unsupported_version(version));
    }
    Ok(serde_json::from_value(raw)?)
}

fn unsupported_version(version: u64) -> ExError {
    ExError::new(ExErrorKind::UnsupportedSchemaVersion)
        .with_op("reconstruct_snapshot")
        .with_message(format!(
            "unsupported idl_schema_version {} (supported: {})",
            version, IDL_SCHEMA_VERSION
        ))
}

/// Rebuild the snapshot an IDL document was generated from
///
/// # Errors
///
/// `UnsupportedSchemaVersion` for a foreign schema version;
/// `InvalidSnapshot` when the content fingerprint does not match the
/// function records.
pub fn reconstruct_snapshot(idl: &IdlDocument) -> Result<AbiSnapshot> {
    if idl.idl_schema_version != IDL_SCHEMA_VERSION {
        return Err(unsupported_version(u64::from(idl.idl_schema_version)));
    }
    let expected = fingerprint(&idl.target, &idl.abi_version, &idl.functions)?;
    if expected != idl.content_fingerprint {
        return Err(ExError::new(ExErrorKind::InvalidSnapshot)
            .with_op("reconstruct_snapshot")
            .with_target(idl.target.clone())
            .with_message("content_fingerprint does not match the function records"));
    }

    let functions: BTreeMap<String, Symbol> = idl
        .functions
        .iter()
        .map(|f| {
            let symbol = Symbol {
                name: f.name.clone(),
                return_type: f.c_return_type.clone(),
                parameters: f
                    .parameters
                    .iter()
                    .map(|p| Param {
                        name: p.name.clone(),
                        c_type: p.c_type.clone(),
                        modifier: p.modifier,
                    })
                    .collect(),
                calling_convention: f.calling_convention.clone(),
            };
            (f.name.clone(), symbol)
        })
        .collect();

    let meta = &idl.generation_metadata;
    Ok(AbiSnapshot {
        schema_version: meta.snapshot_schema_version,
        target_name: idl.target.clone(),
        version: idl.abi_version,
        header_path: idl.source.header_path.clone(),
        functions,
        enums: idl.header_types.enums.clone(),
        structs: idl.header_types.structs.clone(),
        opaque_types: idl.header_types.opaque_types.clone(),
        callbacks: idl.header_types.callbacks.clone(),
        constants: idl.header_types.constants.clone(),
        binary_exports: meta.binary_exports.clone(),
        binary: meta.binary.clone(),
        parser: meta.parser.clone(),
        content_digest: meta.snapshot_digest.clone(),
        generated_at: meta.generated_at.clone(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::FunctionAnnotations;
    use crate::diff::{compute_diff, DiffOptions};
    use crate::model::{
        BinaryCheck, EnumMember, EnumType, ParserBackend, ParserInfo, SNAPSHOT_SCHEMA_VERSION,
    };

    fn param(name: &str, c_type: &str, modifier: ParamModifier) -> Param {
        Param {
            name: name.to_string(),
            c_type: c_type.to_string(),
            modifier,
        }
    }

    pub(crate) fn sample_snapshot() -> AbiSnapshot {
        let mut functions = BTreeMap::new();
        for symbol in [
            Symbol {
                name: "lrtc_factory_create".to_string(),
                return_type: "lrtc_factory_t*".to_string(),
                parameters: Vec::new(),
                calling_convention: "LUMENRTC_CALL".to_string(),
            },
            Symbol {
                name: "lrtc_factory_release".to_string(),
                return_type: "void".to_string(),
                parameters: vec![param("factory", "lrtc_factory_t*", ParamModifier::None)],
                calling_convention: "LUMENRTC_CALL".to_string(),
            },
            Symbol {
                name: "lrtc_log".to_string(),
                return_type: "int".to_string(),
                parameters: vec![
                    param("fmt", "const char*", ParamModifier::None),
                    param("", "...", ParamModifier::Variadic),
                ],
                calling_convention: "LUMENRTC_CALL".to_string(),
            },
            Symbol {
                name: "lrtc_set_observer".to_string(),
                return_type: "void".to_string(),
                parameters: vec![
                    param("factory", "lrtc_factory_t*", ParamModifier::None),
                    param("cb", "void (*)(void* user_data, int state)", ParamModifier::FunctionPointer),
                ],
                calling_convention: "LUMENRTC_CALL".to_string(),
            },
        ] {
            functions.insert(symbol.name.clone(), symbol);
        }

        let mut enums = BTreeMap::new();
        enums.insert(
            "lrtc_state_t".to_string(),
            EnumType {
                name: "lrtc_state_t".to_string(),
                members: vec![
                    EnumMember {
                        name: "LRTC_STATE_OK".to_string(),
                        value: Some(0),
                        value_expr: Some("0".to_string()),
                    },
                    EnumMember {
                        name: "LRTC_STATE_ERROR".to_string(),
                        value: Some(1),
                        value_expr: None,
                    },
                ],
            },
        );

        AbiSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            target_name: "lumenrtc".to_string(),
            version: AbiVersion::new(1, 2, 0),
            header_path: "include/lumenrtc.h".to_string(),
            functions,
            enums,
            structs: BTreeMap::new(),
            opaque_types: ["lrtc_factory_t".to_string()].into_iter().collect(),
            callbacks: BTreeMap::new(),
            constants: BTreeMap::new(),
            binary_exports: None,
            binary: BinaryCheck::NotConfigured,
            parser: ParserInfo {
                backend_requested: ParserBackend::Preprocessed,
                backend: ParserBackend::Heuristic,
                fallback_used: true,
                details: Some("clang not found".to_string()),
            },
            content_digest: "d1".to_string(),
            generated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_round_trip_yields_no_changes() {
        let snapshot = sample_snapshot();
        let idl = generate_idl(&snapshot, None).unwrap();
        let rebuilt = reconstruct_snapshot(&idl).unwrap();
        let diff = compute_diff(&snapshot, &rebuilt, &DiffOptions::default());
        assert!(diff.is_empty());
        assert_eq!(rebuilt, snapshot);
    }

    #[test]
    fn test_exclusion_only_marks_functions() {
        let codegen = CodegenConfig {
            exclude_symbols: vec!["_log$".to_string()],
            ..CodegenConfig::default()
        };
        let idl = generate_idl(&sample_snapshot(), Some(&codegen)).unwrap();
        assert_eq!(idl.summary.function_count, 4);
        assert_eq!(idl.summary.codegen_function_count, 3);
        assert!(!idl.function("lrtc_log").unwrap().codegen);
    }

    #[test]
    fn test_parameter_shape() {
        let idl = generate_idl(&sample_snapshot(), None).unwrap();
        let log = idl.function("lrtc_log").unwrap();
        assert!(log.is_variadic());
        assert_eq!(log.parameters[0].pointer_depth, 1);

        let observer = idl.function("lrtc_set_observer").unwrap();
        assert_eq!(observer.parameters[1].pointer_depth, 0);
        assert!(idl.is_opaque_handle_type("lrtc_factory_t*"));
    }

    #[test]
    fn test_annotations_are_copied() {
        let mut codegen = CodegenConfig::default();
        codegen.functions.insert(
            "lrtc_log".to_string(),
            FunctionAnnotations {
                documentation: Some("Write a log line.".to_string()),
                deprecated: None,
                since_abi: Some("1.1.0".to_string()),
            },
        );
        let idl = generate_idl(&sample_snapshot(), Some(&codegen)).unwrap();
        let log = idl.function("lrtc_log").unwrap();
        assert_eq!(log.documentation.as_deref(), Some("Write a log line."));
        assert_eq!(log.availability.since_abi.as_deref(), Some("1.1.0"));
    }

    #[test]
    fn test_stable_id_ignores_calling_convention() {
        let mut snapshot = sample_snapshot();
        let before = generate_idl(&snapshot, None).unwrap();
        if let Some(f) = snapshot.functions.get_mut("lrtc_factory_create") {
            f.calling_convention = "__stdcall".to_string();
        }
        let after = generate_idl(&snapshot, None).unwrap();
        assert_eq!(
            before.function("lrtc_factory_create").unwrap().stable_id,
            after.function("lrtc_factory_create").unwrap().stable_id
        );
        assert_ne!(before.content_fingerprint, after.content_fingerprint);
    }

    #[test]
    fn test_unsupported_schema_version_rejected() {
        let mut idl = generate_idl(&sample_snapshot(), None).unwrap();
        idl.idl_schema_version = 2;
        let err = reconstruct_snapshot(&idl).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::UnsupportedSchemaVersion);

        let text = serde_json::to_string(&idl).unwrap();
        assert_eq!(
            parse_idl(&text).unwrap_err().kind(),
            ExErrorKind::UnsupportedSchemaVersion
        );
    }

    #[test]
    fn test_tampered_fingerprint_rejected() {
        let mut idl = generate_idl(&sample_snapshot(), None).unwrap();
        idl.functions.pop();
        let err = reconstruct_snapshot(&idl).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidSnapshot);
    }
}
