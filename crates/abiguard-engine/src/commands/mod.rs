//! Command orchestration layer.
//!
//! One module per pipeline operation. Each `*_target` function handles a
//! single target; the `run_*` functions iterate selected targets in name
//! order and collect per-target results.

pub mod codegen;
pub mod generate;
pub mod snapshot;
pub mod sync;
pub mod verify;

use abiguard_core::errors::{ExError, ExErrorKind};

pub(crate) fn missing_target_key(target: &str, key: &str) -> ExError {
    let key = format!("targets.{}.{}", target, key);
    ExError::new(ExErrorKind::MissingConfigKey)
        .with_target(target.to_string())
        .with_message(format!("missing required key '{}'", key))
        .with_key(key)
}
