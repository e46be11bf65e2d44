//! `abiguard generate`

use super::{exit_code, print_artifact, ExtractArgs, TargetArgs};
use abiguard_core::Verdict;
use abiguard_engine::commands::generate::run_generate;
use abiguard_engine::RunContext;
use abiguard_store::artifacts::WriteMode;
use abiguard_store::config::LoadedConfig;
use chrono::{DateTime, Utc};
use clap::Args;

#[derive(Debug, Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub extract: ExtractArgs,

    /// Compare against the committed IDL without writing
    #[arg(long)]
    pub check: bool,
}

pub fn execute(args: GenerateArgs, loaded: &LoadedConfig, now: DateTime<Utc>) -> anyhow::Result<i32> {
    let ctx = RunContext::new(now, args.extract.flags());
    let mode = if args.check { WriteMode::Check } else { WriteMode::Write };

    let outcomes = run_generate(loaded, args.target.target.as_deref(), &ctx, mode)?;
    for outcome in &outcomes {
        print_artifact(&outcome.target, &outcome.artifact);
    }
    let drift = outcomes.iter().any(|o| o.artifact.is_drift());
    Ok(exit_code(Verdict::Pass, drift))
}
