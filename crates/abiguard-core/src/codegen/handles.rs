//! Handle contracts between opaque native handles and managed wrappers.
//!
//! Three checks run before any generator renders:
//! - handle metadata against the IDL (opaque type, release function, unique names)
//! - `NativeMethods.<fn>` references in managed sources against the IDL
//! - existing wrapper declarations against the expected shape
//!
//! A wrapper that does not exist yet is not an error: it is synthesized.

use crate::config::HandleMetadata;
use crate::errors::{ExError, ExErrorKind, Result};
use crate::idl::IdlDocument;
use regex::Regex;
use std::collections::BTreeSet;

/// A managed source file, already read by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedSource {
    pub path: String,
    pub text: String,
}

/// A class declaration found in managed sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredType {
    pub namespace: Option<String>,
    pub name: String,
    pub is_partial: bool,
    /// Explicit accessibility keyword(s), if any
    pub accessibility: Option<String>,
    pub base_types: Vec<String>,
    pub path: String,
    pub line: u32,
}

impl DeclaredType {
    /// Accessibility as the compiler sees it (top-level default is `internal`)
    pub fn effective_accessibility(&self) -> &str {
        self.accessibility.as_deref().unwrap_or("internal")
    }

    pub fn derives_from(&self, base: &str) -> bool {
        let suffix = format!(".{}", base);
        self.base_types
            .first()
            .is_some_and(|b| b == base || b.ends_with(&suffix))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedScan {
    pub types: Vec<DeclaredType>,
    /// Function names referenced as `<class_name>.<fn>`
    pub native_references: BTreeSet<String>,
}

impl ManagedScan {
    /// All declarations of `name`, restricted to `namespace` when they declare one
    pub fn declarations_of(&self, namespace: &str, name: &str) -> Vec<&DeclaredType> {
        self.types
            .iter()
            .filter(|t| t.name == name && t.namespace.as_deref().map_or(true, |ns| ns == namespace))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrapperStatus {
    /// A valid partial declaration exists at `path`
    Existing { path: String },
    /// No declaration exists; the generator emits the whole type
    Synthesized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleWrapper {
    pub metadata: HandleMetadata,
    pub status: WrapperStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlePlan {
    pub wrappers: Vec<HandleWrapper>,
    pub warnings: Vec<String>,
}

fn violation(op: &str, message: String, diagnostics: Vec<String>) -> ExError {
    ExError::new(ExErrorKind::HandleContractViolation)
        .with_op(op.to_string())
        .with_message(message)
        .with_diagnostics(diagnostics)
}

fn compact(c_type: &str) -> String {
    c_type.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Check handle metadata against the IDL
///
/// # Errors
///
/// `HandleContractViolation` listing every problem found.
pub fn validate_handle_metadata(idl: &IdlDocument, handles: &[HandleMetadata]) -> Result<()> {
    let mut problems = Vec::new();
    let mut seen = BTreeSet::new();

    for handle in handles {
        if !seen.insert(handle.type_name.as_str()) {
            problems.push(format!("duplicate handle type_name '{}'", handle.type_name));
        }
        if !idl.is_opaque_handle_type(&handle.c_handle_type) {
            problems.push(format!(
                "{}: c_handle_type '{}' is not a declared opaque type",
                handle.type_name, handle.c_handle_type
            ));
        }
        match idl.function(&handle.release_function_name) {
            None => problems.push(format!(
                "{}: release function '{}' is not in the IDL",
                handle.type_name, handle.release_function_name
            )),
            Some(release) => {
                let first = release.parameters.first().map(|p| compact(&p.c_type));
                if first.as_deref() != Some(compact(&handle.c_handle_type).as_str()) {
                    problems.push(format!(
                        "{}: first parameter of '{}' must be '{}'",
                        handle.type_name, handle.release_function_name, handle.c_handle_type
                    ));
                }
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(violation(
            "validate_handle_metadata",
            format!("{} invalid handle metadata entr(ies)", problems.len()),
            problems,
        ))
    }
}

fn strip_comments(text: &str) -> Result<String> {
    let block = Regex::new(r"(?s)/\*.*?\*/").map_err(internal_regex)?;
    let line = Regex::new(r"//[^\n]*").map_err(internal_regex)?;
    let without_blocks = block.replace_all(text, |caps: &regex::Captures<'_>| {
        "\n".repeat(caps[0].matches('\n').count())
    });
    Ok(line.replace_all(&without_blocks, "").into_owned())
}

fn internal_regex(err: regex::Error) -> ExError {
    ExError::new(ExErrorKind::Internal)
        .with_op("scan_managed_sources")
        .with_message(err.to_string())
}

const CLASS_PATTERN: &str = r"(?m)^[ \t]*(?:\[[^\]\n]*\][ \t]*)*((?:(?:public|internal|private|protected|sealed|abstract|static|partial|unsafe|new|file)[ \t]+)*)class[ \t]+([A-Za-z_]\w*)(?:<[^>\n]*>)?[ \t]*(?::[ \t]*([^{\n]+))?";
const NAMESPACE_PATTERN: &str = r"(?m)^[ \t]*namespace[ \t]+([A-Za-z_][\w.]*)";

/// Find class declarations and `<class_name>.<fn>` references
///
/// # Errors
///
/// `Internal` if a scan pattern fails to compile.
pub fn scan_managed_sources(sources: &[ManagedSource], class_name: &str) -> Result<ManagedScan> {
    let class_re = Regex::new(CLASS_PATTERN).map_err(internal_regex)?;
    let namespace_re = Regex::new(NAMESPACE_PATTERN).map_err(internal_regex)?;
    let reference_re = Regex::new(&format!(r"\b{}\s*\.\s*([A-Za-z_]\w*)", regex::escape(class_name)))
        .map_err(internal_regex)?;

    let mut scan = ManagedScan::default();
    for source in sources {
        let text = strip_comments(&source.text)?;
        let namespaces: Vec<(usize, String)> = namespace_re
            .captures_iter(&text)
            .filter_map(|c| c.get(1).map(|m| (m.start(), m.as_str().to_string())))
            .collect();

        for caps in class_re.captures_iter(&text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            let modifiers: Vec<&str> = caps
                .get(1)
                .map(|m| m.as_str().split_whitespace().collect())
                .unwrap_or_default();
            let access: Vec<&str> = modifiers
                .iter()
                .copied()
                .filter(|m| matches!(*m, "public" | "internal" | "private" | "protected" | "file"))
                .collect();
            let base_types = caps
                .get(3)
                .map(|m| {
                    let list = m.as_str().split(" where ").next().unwrap_or_default();
                    list.split(',')
                        .map(|b| b.trim().to_string())
                        .filter(|b| !b.is_empty())
                        .collect()
                })
                .unwrap_or_default();

            scan.types.push(DeclaredType {
                namespace: namespaces
                    .iter()
                    .rev()
                    .find(|(pos, _)| *pos < whole.start())
                    .map(|(_, ns)| ns.clone()),
                name: name.as_str().to_string(),
                is_partial: modifiers.contains(&"partial"),
                accessibility: (!access.is_empty()).then(|| access.join(" ")),
                base_types,
                path: source.path.clone(),
                line: u32::try_from(text[..whole.start()].matches('\n').count() + 1).unwrap_or(u32::MAX),
            });
        }

        scan.native_references.extend(
            reference_re
                .captures_iter(&text)
                .filter_map(|c| c.get(1).map(|m| m.as_str().to_string())),
        );
    }
    Ok(scan)
}

/// Every `NativeMethods.<fn>` the managed code calls must be generated
///
/// # Errors
///
/// `CodegenFailed` naming the missing or excluded functions.
pub fn check_required_functions(idl: &IdlDocument, scan: &ManagedScan, class_name: &str) -> Result<()> {
    let mut problems = Vec::new();
    for name in &scan.native_references {
        match idl.function(name) {
            None => problems.push(format!("{}.{} is not in the IDL", class_name, name)),
            Some(f) if !f.codegen => problems.push(format!(
                "{}.{} is excluded from codegen",
                class_name, name
            )),
            Some(_) => {}
        }
    }
    if problems.is_empty() {
        return Ok(());
    }
    Err(ExError::new(ExErrorKind::CodegenFailed)
        .with_op("check_required_functions")
        .with_message(format!(
            "managed sources reference {} function(s) that will not be generated",
            problems.len()
        ))
        .with_diagnostics(problems))
}

/// Decide, per handle, whether to extend an existing wrapper or synthesize one
///
/// # Errors
///
/// `HandleContractViolation` when an existing wrapper is not partial,
/// derives from the wrong base type, or has the wrong accessibility.
pub fn plan_handles(handles: &[HandleMetadata], scan: &ManagedScan) -> Result<HandlePlan> {
    let mut plan = HandlePlan::default();
    let mut problems = Vec::new();

    for handle in handles {
        let decls = scan.declarations_of(&handle.namespace, &handle.type_name);
        if decls.is_empty() {
            let warning = format!(
                "wrapper type {}.{} not found in managed sources; synthesizing {} partial class",
                handle.namespace,
                handle.type_name,
                handle.access.as_str()
            );
            tracing::warn!(handle = %handle.type_name, "handle wrapper missing, synthesizing");
            plan.warnings.push(warning);
            plan.wrappers.push(HandleWrapper {
                metadata: handle.clone(),
                status: WrapperStatus::Synthesized,
            });
            continue;
        }

        let qualified = format!("{}.{}", handle.namespace, handle.type_name);
        let mut ok = true;
        for decl in &decls {
            if !decl.is_partial {
                problems.push(format!(
                    "{} ({}:{}) is not declared partial",
                    qualified, decl.path, decl.line
                ));
                ok = false;
            }
            if let Some(access) = &decl.accessibility {
                if access != handle.access.as_str() {
                    problems.push(format!(
                        "{} ({}:{}) is {}, expected {}",
                        qualified,
                        decl.path,
                        decl.line,
                        access,
                        handle.access.as_str()
                    ));
                    ok = false;
                }
            }
        }

        let with_base: Vec<&&DeclaredType> = decls.iter().filter(|d| !d.base_types.is_empty()).collect();
        if !with_base.iter().any(|d| d.derives_from(&handle.base_type)) {
            let found = with_base
                .first()
                .and_then(|d| d.base_types.first().cloned())
                .unwrap_or_else(|| "no base type".to_string());
            problems.push(format!(
                "{} must derive from {} (found {})",
                qualified, handle.base_type, found
            ));
            ok = false;
        }
        if decls.iter().all(|d| d.accessibility.is_none())
            && decls[0].effective_accessibility() != handle.access.as_str()
        {
            problems.push(format!(
                "{} is implicitly internal, expected {}",
                qualified,
                handle.access.as_str()
            ));
            ok = false;
        }

        if ok {
            let path = decls[0].path.clone();
            plan.wrappers.push(HandleWrapper {
                metadata: handle.clone(),
                status: WrapperStatus::Existing { path },
            });
        }
    }

    if problems.is_empty() {
        Ok(plan)
    } else {
        Err(violation(
            "plan_handles",
            format!("{} handle wrapper contract violation(s)", problems.len()),
            problems,
        ))
    }
}
