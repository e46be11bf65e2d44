//! Code generation from IDL documents.
//!
//! Generators are plain trait objects held in a compile-time registry
//! ([`registry::GENERATORS`]). Each one turns the IDL plus binding metadata
//! into file contents; the caller decides where and whether to write them.
//!
//! Handle contracts are validated once per run before any generator
//! renders, so an invalid wrapper type aborts the whole target.

pub mod csharp;
pub mod handles;
pub mod native;
pub mod registry;

pub use handles::{
    check_required_functions, plan_handles, scan_managed_sources, validate_handle_metadata,
    HandlePlan, HandleWrapper, ManagedScan, ManagedSource, WrapperStatus,
};
pub use registry::{is_known, lookup, GENERATORS};

use crate::config::{CSharpBindings, TargetConfig};
use crate::errors::{ExError, ExErrorKind, Result};
use crate::idl::IdlDocument;
use crate::logging_facility::ops;
use crate::{log_op_end, log_op_error, log_op_start};
use std::time::Instant;

/// Header line written at the top of every generated file
pub const GENERATED_BANNER: &str = "Generated by abiguard from the ABI IDL. Do not edit.";

/// One rendered output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Output path as configured (relative to the configuration directory)
    pub path: String,
    pub contents: String,
}

/// Everything a generator may read besides the IDL
#[derive(Debug, Clone, Copy)]
pub struct GeneratorContext<'a> {
    /// Configured output path of this generator entry
    pub output: &'a str,
    pub csharp: Option<&'a CSharpBindings>,
    pub handles: &'a HandlePlan,
}

/// Files plus non-fatal findings from one generator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub files: Vec<GeneratedFile>,
    pub warnings: Vec<String>,
}

pub trait Generator: Sync {
    fn name(&self) -> &'static str;

    /// Render output for one configured entry
    ///
    /// # Errors
    ///
    /// `CodegenFailed` when the IDL cannot be expressed in the target
    /// language or required binding metadata is absent.
    fn render(&self, idl: &IdlDocument, ctx: &GeneratorContext<'_>) -> Result<Rendered>;
}

/// Result of a full codegen run for one target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodegenOutput {
    pub files: Vec<GeneratedFile>,
    pub warnings: Vec<String>,
    pub handles: HandlePlan,
}

pub(crate) fn missing_bindings(generator: &str) -> ExError {
    ExError::new(ExErrorKind::CodegenFailed)
        .with_op("codegen")
        .with_key("bindings.csharp")
        .with_message(format!(
            "generator '{}' requires [bindings.csharp] configuration",
            generator
        ))
}

/// Validate handles and run every configured generator for a target
///
/// `managed` holds the already-read sources listed in
/// `bindings.csharp.managed_sources`.
///
/// # Errors
///
/// `HandleContractViolation` for invalid handle metadata or wrapper types;
/// `CodegenFailed` for missing required functions or render failures;
/// `UnknownGenerator` for unregistered generator names.
pub fn run_codegen(
    target_name: &str,
    idl: &IdlDocument,
    target: &TargetConfig,
    managed: &[ManagedSource],
) -> Result<CodegenOutput> {
    let start = Instant::now();
    log_op_start!(ops::RUN_CODEGEN, target = %target_name);

    let result = run_codegen_inner(idl, target, managed).map_err(|e| {
        if e.target().is_none() {
            e.with_target(target_name.to_string())
        } else {
            e
        }
    });

    let duration_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(output) => {
            log_op_end!(
                ops::RUN_CODEGEN,
                duration_ms = duration_ms,
                target = %target_name,
                file_count = output.files.len(),
                warning_count = output.warnings.len()
            );
        }
        Err(err) => {
            log_op_error!(ops::RUN_CODEGEN, err, duration_ms = duration_ms);
        }
    }
    result
}

fn run_codegen_inner(
    idl: &IdlDocument,
    target: &TargetConfig,
    managed: &[ManagedSource],
) -> Result<CodegenOutput> {
    let csharp = target.bindings.csharp.as_ref();
    let entries = target
        .codegen
        .as_ref()
        .map(|c| c.generators.as_slice())
        .unwrap_or_default();

    let mut output = CodegenOutput::default();
    if let Some(bindings) = csharp {
        validate_handle_metadata(idl, &bindings.handles)?;
        let scan = scan_managed_sources(managed, &bindings.class_name)?;
        check_required_functions(idl, &scan, &bindings.class_name)?;
        output.handles = plan_handles(&bindings.handles, &scan)?;
        output.warnings.extend(output.handles.warnings.iter().cloned());
    }

    for entry in entries {
        let generator = lookup(&entry.name).ok_or_else(|| {
            ExError::new(ExErrorKind::UnknownGenerator)
                .with_op(ops::RUN_CODEGEN)
                .with_key("codegen.generators")
                .with_message(format!("unknown generator '{}'", entry.name))
        })?;
        let ctx = GeneratorContext {
            output: &entry.output,
            csharp,
            handles: &output.handles,
        };
        let rendered = generator.render(idl, &ctx)?;
        tracing::debug!(
            generator = generator.name(),
            files = rendered.files.len(),
            "generator rendered"
        );
        output.files.extend(rendered.files);
        output.warnings.extend(rendered.warnings);
    }

    for warning in &output.warnings {
        tracing::warn!(warning = %warning, "codegen warning");
    }
    Ok(output)
}
