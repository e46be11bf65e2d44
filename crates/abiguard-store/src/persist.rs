//! Snapshot, baseline and IDL persistence
//!
//! All three are pretty JSON documents written atomically. A save whose
//! content matches the stored document (ignoring `generated_at`) leaves the
//! file untouched, so unchanged reruns are byte-identical.

use crate::artifacts::{write_artifact_with, ArtifactOutcome, WriteMode};
use crate::errors::{file_not_found, io_error, serialization_error, Result};
use abiguard_core::errors::{ExError, ExErrorKind};
use abiguard_core::model::SNAPSHOT_SCHEMA_VERSION;
use abiguard_core::snapshot::{canonical_json, compute_content_digest};
use abiguard_core::{parse_idl, AbiSnapshot, IdlDocument};
use std::fs;
use std::path::Path;

fn read_document(operation: &str, path: &Path, what: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            file_not_found(operation, path, what)
        } else {
            io_error(operation, path, e)
        }
    })
}

/// Parse a snapshot document and check its schema version and digest
///
/// # Errors
///
/// `Serialization` for malformed JSON, `UnsupportedSchemaVersion` for a
/// foreign schema, `InvalidSnapshot` when the recorded digest does not
/// match the content.
pub fn parse_snapshot(text: &str, path: &Path) -> Result<AbiSnapshot> {
    let raw: serde_json::Value =
        serde_json::from_str(text).map_err(|e| serialization_error("load_snapshot", path, e))?;
    let version = raw.get("schema_version").and_then(serde_json::Value::as_u64);
    if version != Some(u64::from(SNAPSHOT_SCHEMA_VERSION)) {
        return Err(ExError::new(ExErrorKind::UnsupportedSchemaVersion)
            .with_op("load_snapshot")
            .with_path(path.display().to_string())
            .with_message(format!(
                "unsupported snapshot schema_version {} (supported: {})",
                version.map_or_else(|| "<missing>".to_string(), |v| v.to_string()),
                SNAPSHOT_SCHEMA_VERSION
            )));
    }

    let snapshot: AbiSnapshot =
        serde_json::from_value(raw).map_err(|e| serialization_error("load_snapshot", path, e))?;

    if !snapshot.content_digest.is_empty() {
        let actual = compute_content_digest(&snapshot)?;
        if actual != snapshot.content_digest {
            return Err(ExError::new(ExErrorKind::InvalidSnapshot)
                .with_op("load_snapshot")
                .with_target(snapshot.target_name.clone())
                .with_path(path.display().to_string())
                .with_message(format!(
                    "content_digest {} does not match content ({})",
                    snapshot.content_digest, actual
                )));
        }
    }
    Ok(snapshot)
}

/// Load a snapshot or baseline
///
/// # Errors
///
/// `NotFound` when the file is missing, plus everything [`parse_snapshot`]
/// reports.
pub fn load_snapshot(path: &Path) -> Result<AbiSnapshot> {
    let text = read_document("load_snapshot", path, "snapshot")?;
    parse_snapshot(&text, path)
}

/// Save a snapshot or baseline, skipping the write when content is unchanged
///
/// # Errors
///
/// `Serialization` if encoding fails; `Io` for read or write failures.
pub fn save_snapshot(
    path: &Path,
    display: &str,
    snapshot: &AbiSnapshot,
    mode: WriteMode,
) -> Result<ArtifactOutcome> {
    let text = canonical_json(snapshot)?;
    write_artifact_with(path, display, &text, mode, |existing| {
        parse_snapshot(existing, path)
            .map(|stored| stored.content_digest == snapshot.content_digest)
            .unwrap_or(false)
    })
}

/// Load an IDL document
///
/// # Errors
///
/// `NotFound` when the file is missing; parse errors from
/// [`abiguard_core::parse_idl`] carry the path.
pub fn load_idl(path: &Path) -> Result<IdlDocument> {
    let text = read_document("load_idl", path, "IDL document")?;
    parse_idl(&text).map_err(|e| e.with_path(path.display().to_string()))
}

fn without_timestamp(idl: &IdlDocument) -> IdlDocument {
    let mut copy = idl.clone();
    copy.generation_metadata.generated_at = String::new();
    copy
}

/// Save an IDL document; an existing document that differs only in
/// `generated_at` counts as unchanged
///
/// # Errors
///
/// `Serialization` if encoding fails; `Io` for read or write failures.
pub fn save_idl(
    path: &Path,
    display: &str,
    idl: &IdlDocument,
    mode: WriteMode,
) -> Result<ArtifactOutcome> {
    let text = canonical_json(idl)?;
    let normalized = without_timestamp(idl);
    write_artifact_with(path, display, &text, mode, |existing| {
        parse_idl(existing)
            .map(|stored| without_timestamp(&stored) == normalized)
            .unwrap_or(false)
    })
}
