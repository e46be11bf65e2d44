//! ABI diff engine.
//!
//! Compares a baseline and a current snapshot and produces a structured,
//! deterministic list of severity-tagged change records.
//!
//! ## Entry point
//!
//! ```ignore
//! use abiguard_core::diff::{compute_diff, DiffOptions};
//!
//! let diff = compute_diff(&baseline, &current, &DiffOptions::default());
//! let summary = abiguard_core::diff::render_human_summary(&diff);
//! ```
//!
//! ## Guarantees
//!
//! - **Determinism**: records are sorted by `(scope, subject_name, kind, before, after)`.
//! - **Reflexivity**: `compute_diff(s, s)` is empty for every snapshot.
//! - **Mirroring**: additions of `diff(a, b)` are the removals of `diff(b, a)`.
//! - **Timestamp noise suppression**: `generated_at` and digests are never compared.

pub mod engine;
pub mod human_summary;
pub mod model;

pub use engine::{compute_diff, ensure_diff_deterministic, DiffOptions};
pub use human_summary::render_human_summary;
pub use model::{ChangeKind, ChangeRecord, DiffResult, DiffSummary, Scope, Severity};
