//! abiguard store - filesystem persistence
//!
//! Provides:
//! - Atomic temp→rename writes for every persisted artifact
//! - Snapshot, baseline and IDL load/save with unchanged-content skips
//! - Configuration loading (TOML or YAML) and waiver files
//! - Idempotent artifact writes with check-mode drift detection
//! - Managed-source discovery for handle validation

pub mod artifacts;
pub mod atomic;
pub mod config;
pub mod errors;
pub mod managed;
pub mod persist;

// Re-export key types
pub use artifacts::{unified_diff, write_artifact, ArtifactOutcome, ArtifactStatus, WriteMode};
pub use config::{load_config, load_waivers_file, LoadedConfig};
pub use errors::Result;
pub use managed::discover_managed_sources;
pub use persist::{load_idl, load_snapshot, save_idl, save_snapshot};
