//! Structured logging for the ABI pipeline
//!
//! Every pipeline step is bracketed by one `start` and one `end` (or
//! `end_error`) event carrying `op`, `target` and `duration_ms`. Engine
//! commands add the invocation's `run_id`; extraction adds the parser
//! `backend`, verification the `verdict` and `classification`.
//!
//! Conditions that lower confidence in a result are separate `warn` events:
//! heuristic fallback, a skipped binary check, a synthesized handle
//! wrapper, an expiring or expired waiver, and artifact drift.
//!
//! ```rust
//! use abiguard_core::logging_facility::{init, Profile};
//!
//! // Once, at process start; events go to stderr
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};

/// Values of the `op` field
pub mod ops {
    // Core steps
    pub const EXTRACT_HEADER: &str = "extract_header";
    pub const VERIFY_SNAPSHOTS: &str = "verify_snapshots";
    pub const RUN_CODEGEN: &str = "run_codegen";

    // Engine commands, one per target
    pub const SNAPSHOT: &str = "snapshot";
    pub const VERIFY: &str = "verify";
    pub const GENERATE: &str = "generate";
    pub const CODEGEN: &str = "codegen";
    pub const SYNC: &str = "sync";
}
