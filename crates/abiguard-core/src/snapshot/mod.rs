//! Snapshot assembly domain logic.
//!
//! This module turns extractor and export-reader output into a deterministic
//! [`AbiSnapshot`](crate::model::AbiSnapshot) and computes its digests.
//!
//! ## Responsibilities
//!
//! - Assemble snapshots with a stable canonical encoding
//! - Compute the timestamp-independent content digest
//! - Cross-check the optional bindings symbol list against the header
//!
//! ## Non-Responsibilities
//!
//! - Persistence (handled by `abiguard-store`)
//! - Orchestration (handled by `abiguard-engine`)

pub mod assemble;
pub mod bindings;
pub mod digest;

// Re-export primary types
pub use assemble::{
    assemble_snapshot, check_binary, ensure_deterministic, format_timestamp, BinaryOutcome,
    BinaryPlan, EXPLICIT_SKIP,
};
pub use bindings::{check_binding_symbols, Findings};
pub use digest::{canonical_json, compute_content_digest, hash_string};
