//! Error handling for abiguard-store
//!
//! Wraps abiguard-core ExError with store-specific helpers. Every helper
//! names the operation and the file involved.

use abiguard_core::errors::{ExError, ExErrorKind};
use std::path::Path;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create an IO error
pub fn io_error(operation: &str, path: &Path, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_path(path.display().to_string())
        .with_message(err.to_string())
}

/// Create a missing-file error
pub fn file_not_found(operation: &str, path: &Path, what: &str) -> ExError {
    ExError::new(ExErrorKind::NotFound)
        .with_op(operation.to_string())
        .with_path(path.display().to_string())
        .with_message(format!("{} not found: {}", what, path.display()))
}

/// Create a serialization error for a document that failed to encode or decode
pub fn serialization_error(operation: &str, path: &Path, reason: impl std::fmt::Display) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op(operation.to_string())
        .with_path(path.display().to_string())
        .with_message(reason.to_string())
}

/// Create a config parse error
pub fn config_parse_error(path: &Path, reason: impl std::fmt::Display) -> ExError {
    ExError::new(ExErrorKind::InvalidConfig)
        .with_op("load_config")
        .with_path(path.display().to_string())
        .with_message(format!("cannot parse {}: {}", path.display(), reason))
}
