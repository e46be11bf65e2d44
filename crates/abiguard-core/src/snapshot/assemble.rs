//! Snapshot assembly.
//!
//! Combines the extractor output, the binary check and the declared version
//! into one [`AbiSnapshot`]. The wall clock is an input; nothing here reads
//! the system time.

use super::digest::{canonical_json, compute_content_digest};
use crate::errors::{ExError, ExErrorKind, Result};
use crate::exports::{read_exports, reconcile, ExportSource};
use crate::header::Extraction;
use crate::model::{AbiSnapshot, BinaryCheck, Symbol, SNAPSHOT_SCHEMA_VERSION};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Reason recorded when the run asked to skip the binary check
pub const EXPLICIT_SKIP: &str = "explicit_skip";

/// What to do about the binary export check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryPlan {
    NotConfigured,
    Skip,
    Check {
        source: ExportSource,
        display_path: String,
        allow_non_prefixed_exports: bool,
    },
}

/// Outcome of the binary step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryOutcome {
    pub check: BinaryCheck,
    pub exports: Option<BTreeSet<String>>,
}

/// Run the binary export check.
///
/// A configured binary that cannot be read is fatal; only `Skip` avoids it.
///
/// # Errors
///
/// Propagates `NotFound`/`ExportsUnreadable` from the reader.
pub fn check_binary(
    plan: &BinaryPlan,
    target_name: &str,
    declared: &BTreeMap<String, Symbol>,
    prefix: &str,
) -> Result<BinaryOutcome> {
    match plan {
        BinaryPlan::NotConfigured => {
            tracing::warn!(
                target = %target_name,
                "no binary configured; export check not performed (reduced confidence)"
            );
            Ok(BinaryOutcome {
                check: BinaryCheck::NotConfigured,
                exports: None,
            })
        }
        BinaryPlan::Skip => {
            tracing::warn!(
                target = %target_name,
                "binary export check explicitly skipped (reduced confidence)"
            );
            Ok(BinaryOutcome {
                check: BinaryCheck::Skipped {
                    reason: EXPLICIT_SKIP.to_string(),
                },
                exports: None,
            })
        }
        BinaryPlan::Check {
            source,
            display_path,
            allow_non_prefixed_exports,
        } => {
            let raw = read_exports(source).map_err(|e| e.with_target(target_name))?;
            let reconciled = reconcile(&raw, declared, prefix);
            Ok(BinaryOutcome {
                check: BinaryCheck::Checked {
                    path: display_path.clone(),
                    allow_non_prefixed_exports: *allow_non_prefixed_exports,
                    diagnostics: reconciled.diagnostics,
                },
                exports: Some(reconciled.exports),
            })
        }
    }
}

/// RFC 3339 UTC timestamp with second precision
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Assemble a snapshot and stamp its content digest.
///
/// # Errors
///
/// `Serialization` on encoding failure, `DeterminismViolation` when two
/// encodings of the same value differ.
pub fn assemble_snapshot(
    target_name: &str,
    header_path: &str,
    extraction: Extraction,
    binary: BinaryOutcome,
    now: DateTime<Utc>,
) -> Result<AbiSnapshot> {
    let header = extraction.header;
    let mut snapshot = AbiSnapshot {
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        target_name: target_name.to_string(),
        version: header.version,
        header_path: header_path.to_string(),
        functions: header.functions,
        enums: header.enums,
        structs: header.structs,
        opaque_types: header.opaque_types,
        callbacks: header.callbacks,
        constants: header.constants,
        binary_exports: binary.exports,
        binary: binary.check,
        parser: extraction.parser,
        content_digest: String::new(),
        generated_at: format_timestamp(now),
    };
    snapshot.content_digest = compute_content_digest(&snapshot)?;
    ensure_deterministic(&snapshot)?;
    Ok(snapshot)
}

/// Encode twice and require identical bytes
///
/// # Errors
///
/// `DeterminismViolation` when the encodings differ.
pub fn ensure_deterministic(snapshot: &AbiSnapshot) -> Result<()> {
    let first = canonical_json(snapshot)?;
    let reparsed: AbiSnapshot = serde_json::from_str(&first)?;
    let second = canonical_json(&reparsed)?;
    if first != second {
        return Err(ExError::new(ExErrorKind::DeterminismViolation)
            .with_op("assemble_snapshot")
            .with_target(snapshot.target_name.clone())
            .with_message("snapshot encoding is not stable across a round trip"));
    }
    Ok(())
}
