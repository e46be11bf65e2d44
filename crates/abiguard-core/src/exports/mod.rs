//! Binary Exports Reader
//!
//! Lists a shared library's public exports (natively through `object`, or
//! from a captured tool listing), strips platform decoration and reconciles
//! the result against the header-declared functions.

pub mod listing;

use crate::config::ListingFormat;
use crate::errors::{ExError, ExErrorKind, Result};
use crate::model::ExportDiagnostics;
use object::{Object, ObjectKind};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Where exports come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportSource {
    /// A compiled shared library (ELF, PE or Mach-O)
    Binary(PathBuf),
    /// A captured `nm`/`readelf`/`objdump`/`dumpbin` listing
    Listing { path: PathBuf, format: ListingFormat },
}

impl ExportSource {
    pub fn path(&self) -> &Path {
        match self {
            ExportSource::Binary(path) | ExportSource::Listing { path, .. } => path,
        }
    }
}

/// Raw export names as the platform spells them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawExports {
    pub names: BTreeSet<String>,
    /// Mach-O prefixes every C symbol with `_`; that is not a decoration
    pub underscore_is_native: bool,
}

fn unreadable(path: &Path, message: String) -> ExError {
    ExError::new(ExErrorKind::ExportsUnreadable)
        .with_op("read_exports")
        .with_path(path.display().to_string())
        .with_message(message)
}

/// Read the public export names of a binary
///
/// # Errors
///
/// `NotFound` when the file is missing, `ExportsUnreadable` when it is not
/// a parseable object file.
pub fn read_binary_exports(path: &Path) -> Result<RawExports> {
    let data = std::fs::read(path).map_err(|e| {
        ExError::new(ExErrorKind::NotFound)
            .with_op("read_exports")
            .with_path(path.display().to_string())
            .with_message(format!("cannot read binary: {}", e))
    })?;
    let file = object::File::parse(&*data)
        .map_err(|e| unreadable(path, format!("not an object file: {}", e)))?;
    if file.kind() == ObjectKind::Unknown {
        return Err(unreadable(path, "unrecognised object kind".to_string()));
    }
    let exports = file
        .exports()
        .map_err(|e| unreadable(path, format!("cannot read export table: {}", e)))?;

    Ok(RawExports {
        names: exports
            .iter()
            .map(|export| String::from_utf8_lossy(export.name()).into_owned())
            .filter(|name| !name.is_empty())
            .collect(),
        underscore_is_native: matches!(file.format(), object::BinaryFormat::MachO),
    })
}

/// Read exports from either source kind
///
/// # Errors
///
/// See [`read_binary_exports`]; a missing listing file is `NotFound`.
pub fn read_exports(source: &ExportSource) -> Result<RawExports> {
    match source {
        ExportSource::Binary(path) => read_binary_exports(path),
        ExportSource::Listing { path, format } => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                ExError::new(ExErrorKind::NotFound)
                    .with_op("read_exports")
                    .with_path(path.display().to_string())
                    .with_message(format!("cannot read export listing: {}", e))
            })?;
            Ok(RawExports {
                names: listing::parse_listing(&text, *format),
                underscore_is_native: false,
            })
        }
    }
}

/// Result of stripping decoration from one export name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonical {
    pub name: String,
    /// The name was decorated (stdcall `@N`, or a non-native leading `_`)
    pub decorated: bool,
}

/// Strip a stdcall `@N` suffix and one leading `_` that precedes the prefix
pub fn canonicalize(raw: &str, prefix: &str, underscore_is_native: bool) -> Canonical {
    let mut name = raw;
    let mut decorated = false;

    if let Some((left, right)) = name.rsplit_once('@') {
        if !right.is_empty() && right.chars().all(|c| c.is_ascii_digit()) {
            name = left;
            decorated = true;
        }
    }
    if let Some(rest) = name.strip_prefix('_') {
        if rest.starts_with(prefix) && !name.starts_with(prefix) {
            name = rest;
            decorated |= !underscore_is_native;
        }
    }

    Canonical {
        name: name.to_string(),
        decorated,
    }
}

/// Reconciled export set plus diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Canonical prefixed exports
    pub exports: BTreeSet<String>,
    pub diagnostics: ExportDiagnostics,
}

/// Compare exports with the header-declared functions
pub fn reconcile<V>(
    raw: &RawExports,
    declared: &BTreeMap<String, V>,
    prefix: &str,
) -> Reconciliation {
    let mut exports = BTreeSet::new();
    let mut non_prefixed = BTreeSet::new();
    let mut decorated = false;

    for name in &raw.names {
        let canonical = canonicalize(name, prefix, raw.underscore_is_native);
        decorated |= canonical.decorated;
        if canonical.name.starts_with(prefix) {
            exports.insert(canonical.name);
        } else {
            non_prefixed.insert(name.clone());
        }
    }

    let missing_in_binary = declared
        .keys()
        .filter(|name| !exports.contains(*name))
        .cloned()
        .collect();
    let extra_prefixed_in_binary = exports
        .iter()
        .filter(|name| !declared.contains_key(*name))
        .cloned()
        .collect();

    Reconciliation {
        exports,
        diagnostics: ExportDiagnostics {
            missing_in_binary,
            extra_prefixed_in_binary,
            non_prefixed_exports: non_prefixed.into_iter().collect(),
            potential_calling_convention_mismatch: decorated,
        },
    }
}

/// Human-readable findings: `(errors, warnings)`
pub fn diagnostic_messages(
    target: &str,
    diagnostics: &ExportDiagnostics,
    allow_non_prefixed_exports: bool,
) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for name in &diagnostics.missing_in_binary {
        errors.push(format!(
            "header symbol '{}' is not exported by the binary (target={})",
            name, target
        ));
    }
    for name in &diagnostics.extra_prefixed_in_binary {
        errors.push(format!(
            "binary exports '{}' which the header does not declare (target={})",
            name, target
        ));
    }
    for name in &diagnostics.non_prefixed_exports {
        let message = format!("binary exports non-prefixed symbol '{}' (target={})", name, target);
        if allow_non_prefixed_exports {
            warnings.push(message);
        } else {
            errors.push(message);
        }
    }
    if diagnostics.potential_calling_convention_mismatch {
        warnings.push(format!(
            "binary exports decorated symbols (e.g. _symbol@N); review calling conventions (target={})",
            target
        ));
    }
    (errors, warnings)
}
