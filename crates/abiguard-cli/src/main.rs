//! abiguard CLI
//!
//! Command-line interface for ABI governance and interop code generation

use abiguard_core::logging_facility::{init, Profile};
use abiguard_store::config::load_config;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "abiguard")]
#[command(about = "abiguard - ABI snapshots, verification and interop codegen", long_about = None)]
struct Cli {
    /// Configuration file (TOML, or YAML by extension)
    #[arg(long, global = true, default_value = "abiguard.toml")]
    config: PathBuf,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build the ABI snapshot and print or write it
    Snapshot(commands::snapshot::SnapshotArgs),
    /// Verify the current ABI against the baseline
    Verify(commands::verify::VerifyArgs),
    /// Write the IDL document
    Generate(commands::generate::GenerateArgs),
    /// Run the configured code generators
    Codegen(commands::codegen::CodegenArgs),
    /// Verify, then on pass update baseline, IDL and generated code
    Sync(commands::sync::SyncArgs),
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let loaded = load_config(&cli.config)?;
    // Single wall-clock read for the whole invocation
    let now = chrono::Utc::now();

    match cli.command {
        Commands::Snapshot(args) => commands::snapshot::execute(args, &loaded, now),
        Commands::Verify(args) => commands::verify::execute(args, &loaded, now),
        Commands::Generate(args) => commands::generate::execute(args, &loaded, now),
        Commands::Codegen(args) => commands::codegen::execute(args, &loaded, now),
        Commands::Sync(args) => commands::sync::execute(args, &loaded, now),
    }
}

fn main() {
    let cli = Cli::parse();

    init(match cli.log_format {
        LogFormat::Pretty => Profile::Development,
        LogFormat::Json => Profile::Production,
    });

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            commands::EXIT_FAILURE
        }
    };
    std::process::exit(code);
}
