//! `abiguard sync`

use super::{exit_code, print_artifact, ExtractArgs, TargetArgs};
use abiguard_core::report::render_summary;
use abiguard_core::Verdict;
use abiguard_engine::commands::sync::run_sync;
use abiguard_engine::RunContext;
use abiguard_store::config::LoadedConfig;
use chrono::{DateTime, Utc};
use clap::Args;

#[derive(Debug, Args)]
pub struct SyncArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub extract: ExtractArgs,

    /// Verify and compare persisted artifacts without writing
    #[arg(long)]
    pub check: bool,
}

pub fn execute(args: SyncArgs, loaded: &LoadedConfig, now: DateTime<Utc>) -> anyhow::Result<i32> {
    let ctx = RunContext::new(now, args.extract.flags());
    let outcomes = run_sync(loaded, args.target.target.as_deref(), &ctx, args.check)?;

    let mut verdict = Verdict::Pass;
    let mut drift = false;
    for outcome in &outcomes {
        print!("{}", render_summary(&outcome.report));
        verdict = verdict.combine(outcome.report.verdict);
        drift |= outcome.has_drift();

        if !outcome.applied() {
            println!("[{}] sync blocked: {}", outcome.target, outcome.report.verdict);
            continue;
        }
        let artifacts = outcome
            .baseline
            .iter()
            .chain(outcome.idl.iter().map(|g| &g.artifact))
            .chain(outcome.codegen.iter().flat_map(|c| c.artifacts.iter()));
        for artifact in artifacts {
            print_artifact(&outcome.target, artifact);
        }
    }
    Ok(exit_code(verdict, drift))
}
