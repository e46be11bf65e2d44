//! `abiguard snapshot`

use super::{ExtractArgs, TargetArgs, EXIT_OK};
use abiguard_core::errors::{ExError, ExErrorKind};
use abiguard_core::snapshot::canonical_json;
use abiguard_engine::commands::snapshot::{run_snapshot, write_snapshot};
use abiguard_engine::RunContext;
use abiguard_store::config::LoadedConfig;
use chrono::{DateTime, Utc};
use clap::Args;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub extract: ExtractArgs,

    /// Write the snapshot here instead of printing it (single target only)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn execute(args: SnapshotArgs, loaded: &LoadedConfig, now: DateTime<Utc>) -> anyhow::Result<i32> {
    let ctx = RunContext::new(now, args.extract.flags());
    let snapshots = run_snapshot(loaded, args.target.target.as_deref(), &ctx)?;

    match (&args.out, snapshots.as_slice()) {
        (Some(out), [snapshot]) => {
            let outcome = write_snapshot(out, snapshot)?;
            super::print_artifact(&snapshot.target_name, &outcome);
        }
        (Some(_), _) => {
            return Err(ExError::new(ExErrorKind::InvalidInput)
                .with_op("snapshot")
                .with_message("--out needs exactly one target; pass --target")
                .into());
        }
        (None, [snapshot]) => print!("{}", canonical_json(snapshot)?),
        (None, many) => {
            let by_target: BTreeMap<&str, _> =
                many.iter().map(|s| (s.target_name.as_str(), s)).collect();
            print!("{}", canonical_json(&by_target)?);
        }
    }
    Ok(EXIT_OK)
}
