//! The default mode: pull every manifest item, or list them with `--dry-run`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use fleetpull_core::{PullItem, SettingsOverride};
use fleetpull_docker::DockerCli;
use fleetpull_engine::{start_blocking, Backends, RunOptions, RunReport};

use super::format_duration;

/// Arguments for a pull run.
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Manifest file. Falls back to the built-in manifest when absent.
    #[arg(long, value_name = "FILE", default_value = "images.yaml")]
    pub config: PathBuf,

    /// List what would be pulled without contacting docker.
    #[arg(long)]
    pub dry_run: bool,

    /// Number of concurrent pulls.
    #[arg(long, value_name = "N")]
    pub parallel: Option<usize>,

    /// Retries per item after the first attempt.
    #[arg(long = "retry", value_name = "N")]
    pub retries: Option<u32>,

    /// Per-attempt timeout in seconds.
    #[arg(long, value_name = "SEC")]
    pub timeout: Option<u64>,

    /// Base delay between retries in seconds.
    #[arg(long, value_name = "SEC")]
    pub retry_delay: Option<u64>,

    /// Skip model artifacts.
    #[arg(long)]
    pub skip_ai: bool,

    /// Skip Windows-only images.
    #[arg(long)]
    pub skip_windows: bool,

    /// Apply the named `environments` block from the manifest.
    #[arg(long = "env", value_name = "NAME", env = "FLEETPULL_ENV")]
    pub environment: Option<String>,

    /// Keep run state here instead of under ~/.fleetpull/runs.
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Stop dequeuing when free space drops below this many GB.
    #[arg(long, value_name = "GB")]
    pub space_threshold_gb: Option<f64>,

    /// Soft-prune idle images when disk usage exceeds this percentage.
    #[arg(long, value_name = "PERCENT")]
    pub cleanup_threshold_percent: Option<f64>,

    /// Retry what the previous run of this manifest left unfinished.
    #[arg(long)]
    pub resume: bool,
}

impl PullArgs {
    pub fn run(self) -> Result<ExitCode> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let options = self.into_options(home);
        let config = options.manifest_path.clone();

        let report = start_blocking(options, Backends::docker(DockerCli::new()))
            .with_context(|| format!("run failed for '{}'", config.display()))?;

        if report.dry_run {
            print_dry_run(&report);
        } else {
            print_report(&report);
        }
        Ok(ExitCode::from(report.exit_code()))
    }

    fn into_options(self, home: PathBuf) -> RunOptions {
        let mut opts = RunOptions::new(self.config, home);
        opts.environment = self.environment;
        opts.overrides = SettingsOverride {
            timeout: self.timeout,
            retries: self.retries,
            parallel: self.parallel,
            skip_ai: self.skip_ai.then_some(true),
            skip_windows: self.skip_windows.then_some(true),
        };
        opts.dry_run = self.dry_run;
        opts.resume = self.resume;
        opts.state_dir = self.state_dir;
        if let Some(secs) = self.retry_delay {
            opts.retry_delay = Duration::from_secs(secs);
        }
        if let Some(gb) = self.space_threshold_gb {
            opts.admission.space_threshold_gb = gb;
        }
        if let Some(percent) = self.cleanup_threshold_percent {
            opts.admission.cleanup_threshold_percent = percent;
        }
        opts
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct PlannedRow {
    #[tabled(rename = "Image")]
    reference: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
}

impl From<&PullItem> for PlannedRow {
    fn from(item: &PullItem) -> Self {
        Self {
            reference: item.id.reference(),
            kind: item.kind.to_string(),
            name: item.friendly_name.clone(),
        }
    }
}

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "Image")]
    reference: String,
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Attempts")]
    attempts: u32,
    #[tabled(rename = "Error")]
    message: String,
}

fn print_dry_run(report: &RunReport) {
    println!(
        "{} would pull {} item(s)",
        "[dry-run]".cyan(),
        report.would_pull.len()
    );
    if report.would_pull.is_empty() {
        println!("Nothing to pull.");
        return;
    }
    let rows: Vec<PlannedRow> = report.would_pull.iter().map(PlannedRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    if let Some(dir) = &report.run_dir {
        println!("State directory: {}", dir.display());
    }
}

fn print_report(report: &RunReport) {
    let summary = format!(
        "{} total | {} succeeded | {} failed | {} remaining | {}",
        report.total,
        report.succeeded,
        report.failed,
        report.remaining,
        format_duration(report.duration),
    );
    if report.is_success() {
        println!("{} {summary}", "✓".green().bold());
    } else {
        println!("{} {summary}", "✗".red().bold());
    }

    if let Some(reason) = report.stopped {
        println!(
            "{} run stopped early ({reason}); {} item(s) were not attempted",
            "!".yellow().bold(),
            report.remaining
        );
    }

    if !report.failures.is_empty() {
        let rows: Vec<FailureRow> = report
            .failures
            .iter()
            .map(|f| FailureRow {
                reference: f.id.reference(),
                class: f.class.to_string(),
                attempts: f.attempts,
                message: f.message.clone(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    if let Some(dir) = &report.run_dir {
        println!("State directory: {}", dir.display());
    }
    if report.resumable() {
        println!("Run 'fleetpull --resume' to retry the unfinished items.");
    }
}
