//! Subcommands and the arguments they share

pub mod codegen;
pub mod generate;
pub mod snapshot;
pub mod sync;
pub mod verify;

use abiguard_core::Verdict;
use abiguard_engine::RunFlags;
use abiguard_store::artifacts::{ArtifactOutcome, ArtifactStatus};
use clap::Args;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_DRIFT: i32 = 3;

#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Only process this target (default: every target, in name order)
    #[arg(long)]
    pub target: Option<String>,
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Skip the binary export check (reduced confidence)
    #[arg(long)]
    pub skip_binary: bool,

    /// Fail instead of falling back to the heuristic parser
    #[arg(long)]
    pub no_fallback: bool,
}

impl ExtractArgs {
    pub fn flags(&self) -> RunFlags {
        RunFlags {
            skip_binary: self.skip_binary,
            no_fallback: self.no_fallback,
            ..RunFlags::default()
        }
    }
}

/// A failing verdict wins over drift
pub fn exit_code(verdict: Verdict, drift: bool) -> i32 {
    if !verdict.is_pass() {
        verdict.exit_code()
    } else if drift {
        EXIT_DRIFT
    } else {
        EXIT_OK
    }
}

pub fn print_artifact(target: &str, artifact: &ArtifactOutcome) {
    let status = match artifact.status {
        ArtifactStatus::Unchanged => "unchanged",
        ArtifactStatus::Written => "written",
        ArtifactStatus::WouldWrite => "would write",
        ArtifactStatus::Drifted => "DRIFT",
    };
    println!("[{}] {}: {}", target, artifact.path, status);
    if let Some(diff) = &artifact.diff {
        print!("{}", diff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(Verdict::Pass, false), 0);
        assert_eq!(exit_code(Verdict::FailBreaking, false), 1);
        assert_eq!(exit_code(Verdict::FailUnacknowledgedAdditive, false), 2);
        assert_eq!(exit_code(Verdict::Pass, true), 3);
        assert_eq!(exit_code(Verdict::FailBreaking, true), 1);
    }
}
