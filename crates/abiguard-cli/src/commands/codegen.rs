//! `abiguard codegen`

use super::{exit_code, print_artifact, TargetArgs};
use abiguard_core::Verdict;
use abiguard_engine::commands::codegen::run_codegen_all;
use abiguard_engine::{RunContext, RunFlags};
use abiguard_store::artifacts::WriteMode;
use abiguard_store::config::LoadedConfig;
use chrono::{DateTime, Utc};
use clap::Args;

#[derive(Debug, Args)]
pub struct CodegenArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Compare against committed output without writing; differences are drift
    #[arg(long, conflicts_with = "dry_run")]
    pub check: bool,

    /// Show what would change without writing
    #[arg(long)]
    pub dry_run: bool,
}

pub fn execute(args: CodegenArgs, loaded: &LoadedConfig, now: DateTime<Utc>) -> anyhow::Result<i32> {
    let ctx = RunContext::new(now, RunFlags::default());
    let mode = match (args.check, args.dry_run) {
        (true, _) => WriteMode::Check,
        (_, true) => WriteMode::DryRun,
        _ => WriteMode::Write,
    };

    let outcomes = run_codegen_all(loaded, args.target.target.as_deref(), &ctx, mode)?;
    for outcome in &outcomes {
        for warning in &outcome.warnings {
            eprintln!("[{}] warning: {}", outcome.target, warning);
        }
        for artifact in &outcome.artifacts {
            print_artifact(&outcome.target, artifact);
        }
    }
    let drift = outcomes.iter().any(|o| o.has_drift());
    Ok(exit_code(Verdict::Pass, drift))
}
