//! fleetpull: parallel, fault-tolerant bulk image pulls.
//!
//! # Usage
//!
//! ```text
//! fleetpull [--config images.yaml] [--parallel N] [--retry N] [--timeout SEC] [--dry-run]
//! fleetpull --resume
//! fleetpull --volume-status
//! fleetpull --advanced-cleanup | --cleanup-volumes
//! ```

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgGroup, Args, Parser};
use colored::Colorize;

use commands::{cleanup::CleanupArgs, pull::PullArgs, volumes::VolumeStatusArgs};
use fleetpull_docker::DockerError;
use fleetpull_engine::{init_tracing, EngineError};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "fleetpull",
    version,
    about = "Pull a manifest of container images in parallel, with retries and resume",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    pull: PullArgs,

    #[command(flatten)]
    maintenance: MaintenanceArgs,

    /// Also write JSON logs to FILE (rotated at 10 MiB, 5 copies kept).
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

/// One-shot maintenance modes. Each runs instead of a pull and exits.
#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("maintenance")
        .args(["advanced_cleanup", "cleanup_volumes", "volume_status"])
        .multiple(false)
        .conflicts_with_all(["dry_run", "resume"])
))]
struct MaintenanceArgs {
    /// Prune build cache, unmanaged volumes and images unused for a day, then exit.
    #[arg(long)]
    advanced_cleanup: bool,

    /// Prune volumes not labelled as managed by fleetpull, then exit.
    #[arg(long)]
    cleanup_volumes: bool,

    /// Show managed volume status and disk usage, then exit.
    #[arg(long)]
    volume_status: bool,
}

impl Cli {
    fn run(self) -> Result<ExitCode> {
        let m = self.maintenance;
        if m.volume_status {
            return VolumeStatusArgs.run();
        }
        if m.advanced_cleanup || m.cleanup_volumes {
            let args = CleanupArgs {
                volumes_only: m.cleanup_volumes,
            };
            return args.run();
        }
        self.pull.run()
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_tracing(cli.log_file.as_deref()) {
        eprintln!("{} {err}", "error:".red().bold());
        return ExitCode::FAILURE;
    }

    match cli.run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(exit_code_for(&err))
        }
    }
}

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

/// `2` when docker is missing or not running, `1` for everything else.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(engine) = cause.downcast_ref::<EngineError>() {
            return engine.exit_code();
        }
        if let Some(docker) = cause.downcast_ref::<DockerError>() {
            if matches!(docker, DockerError::NotInstalled | DockerError::NotRunning(_)) {
                return 2;
            }
        }
    }
    1
}
