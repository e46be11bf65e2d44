//! abiguard engine - per-target orchestration
//!
//! Coordinates core pipeline logic with filesystem persistence for the
//! five operations: `snapshot`, `verify`, `generate`, `codegen` and
//! `sync`. Every call receives an explicit [`RunContext`]; nothing here
//! reads the wall clock or process-wide state.

pub mod commands;
pub mod context;

pub use context::{select_targets, RunContext, RunFlags};
