//! abiguard core - ABI governance and interop code generation
//!
//! This crate holds the pure pipeline logic:
//! - Header extraction (preprocessed and heuristic backends)
//! - Binary export reconciliation
//! - Deterministic snapshot assembly
//! - Structural diffing with severity classification
//! - Semantic-versioning policy with time-bounded waivers
//! - IDL generation and reconstruction
//! - Code generators and handle contract validation
//! - Report rendering (summary, markdown, changelog, SARIF)
//!
//! Filesystem persistence lives in `abiguard-store`; per-target
//! orchestration lives in `abiguard-engine`.

pub mod codegen;
pub mod config;
pub mod diff;
pub mod errors;
pub mod exports;
pub mod header;
pub mod idl;
pub mod logging_facility;
pub mod model;
pub mod policy;
pub mod report;
pub mod snapshot;
pub mod verify;

// Used by the logging macros
pub use abiguard_core_types;

// Re-export commonly used types
pub use config::{Config, TargetConfig};
pub use diff::{compute_diff, ChangeKind, ChangeRecord, DiffOptions, DiffResult, Severity};
pub use errors::{ExError, ExErrorKind, Result};
pub use idl::{generate_idl, parse_idl, reconstruct_snapshot, IdlDocument};
pub use model::{AbiSnapshot, AbiVersion, Symbol};
pub use policy::{evaluate_policy, EffectivePolicy, PolicyOutcome, Verdict};
pub use verify::{verify_snapshots, VerifyContext, VerifyReport};
