//! `abiguard verify`

use super::{exit_code, ExtractArgs, TargetArgs};
use abiguard_core::report::render_summary;
use abiguard_engine::commands::verify::{run_verify, ReportOutputs};
use abiguard_engine::RunContext;
use abiguard_store::config::LoadedConfig;
use chrono::{DateTime, Utc};
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub extract: ExtractArgs,

    /// Treat matching expired waivers as failures
    #[arg(long)]
    pub fail_on_expired: bool,

    /// Treat waivers lacking metadata as failures
    #[arg(long)]
    pub fail_on_missing_metadata: bool,

    #[arg(long)]
    pub report_json: Option<PathBuf>,

    #[arg(long)]
    pub report_md: Option<PathBuf>,

    #[arg(long)]
    pub sarif: Option<PathBuf>,

    #[arg(long, requires = "release_tag")]
    pub changelog: Option<PathBuf>,

    #[arg(long, requires = "changelog")]
    pub release_tag: Option<String>,
}

pub fn execute(args: VerifyArgs, loaded: &LoadedConfig, now: DateTime<Utc>) -> anyhow::Result<i32> {
    let mut flags = args.extract.flags();
    flags.fail_on_expired = args.fail_on_expired;
    flags.fail_on_missing_metadata = args.fail_on_missing_metadata;
    let ctx = RunContext::new(now, flags);

    let outputs = ReportOutputs {
        json: args.report_json,
        markdown: args.report_md,
        sarif: args.sarif,
        changelog: args.changelog.zip(args.release_tag),
    };
    let run = run_verify(loaded, args.target.target.as_deref(), &ctx, &outputs)?;

    for report in &run.reports {
        print!("{}", render_summary(report));
    }
    if run.reports.len() > 1 {
        print!("{}", run.summary.render());
    }
    for artifact in &run.written {
        eprintln!("report written: {}", artifact.path);
    }
    Ok(exit_code(run.verdict(), false))
}
