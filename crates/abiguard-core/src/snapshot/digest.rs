//! Canonical encoding and digests for snapshots.
//!
//! ## Digest Types
//!
//! - **Content digest**: hash of the snapshot with `generated_at` and
//!   `content_digest` blanked. Two runs over unchanged input produce the
//!   same content digest whatever the wall clock said.
//! - **Text digest**: hash of an arbitrary canonical string (used by the
//!   IDL for fingerprints and stable ids).
//!
//! ## Determinism Guarantees
//!
//! - Keyed collections are `BTreeMap`/`BTreeSet`, so key order is stable
//! - Ordered collections keep declaration order (order-sensitive digest)

use crate::errors::Result;
use crate::model::AbiSnapshot;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Pretty (two-space) JSON with a trailing newline.
///
/// This is the on-disk form of snapshots, baselines and IDL documents.
///
/// # Errors
///
/// Returns `ExErrorKind::Serialization` if encoding fails.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    Ok(text)
}

/// Compute the content digest (excludes `generated_at` and the digest itself).
///
/// ## Idempotency Property
///
/// ```text
/// a.generated_at != b.generated_at
/// BUT
/// compute_content_digest(a) == compute_content_digest(b)
/// IF all other fields are identical
/// ```
///
/// # Errors
///
/// Returns `ExErrorKind::Serialization` if encoding fails.
pub fn compute_content_digest(snapshot: &AbiSnapshot) -> Result<String> {
    let mut copy = snapshot.clone();
    copy.generated_at = String::new();
    copy.content_digest = String::new();

    let canonical = serde_json::to_string(&copy)?;
    Ok(hash_string(&canonical))
}

/// Hex-encoded SHA-256 of `input`
pub fn hash_string(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
