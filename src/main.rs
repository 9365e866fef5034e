// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::process::ExitCode;

mod cli;

use cli::RecordArgs;

#[derive(Parser)]
#[command(name = "camera-vid")]
#[command(about = "Record video from a camera")]
#[command(version = env!("GIT_VERSION"))]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    record: RecordArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Record video (the default when no command is given)
    Vid(RecordArgs),

    /// Record the unprocessed camera stream, without encoding or preview
    Raw(RecordArgs),

    /// List available cameras
    List,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::List) => {
            init_logging(1);
            cli::list_cameras()
        }
        Some(Commands::Vid(args)) => record(args, false),
        Some(Commands::Raw(args)) => record(args, true),
        None => record(cli.record, false),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: *** {} ***", e);
            ExitCode::FAILURE
        }
    }
}

fn record(args: RecordArgs, raw: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.into_config(raw)?;
    init_logging(config.verbose);
    cli::record_video(&config)
}

/// Initialize logging
///
/// RUST_LOG wins when set (e.g. RUST_LOG=camera_vid=debug); otherwise the
/// verbosity level picks the filter.
fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();
}
