//! `--advanced-cleanup` and `--cleanup-volumes`.

use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use fleetpull_docker::{CleanupStep, DockerCli, DockerError, Housekeeping};
use fleetpull_engine::block_on;

pub struct CleanupArgs {
    /// Only prune unmanaged volumes.
    pub volumes_only: bool,
}

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "Step")]
    name: &'static str,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl From<CleanupStep> for StepRow {
    fn from(step: CleanupStep) -> Self {
        Self {
            name: step.name,
            result: if step.ok {
                "ok".green().to_string()
            } else {
                "failed".red().to_string()
            },
            detail: step.detail,
        }
    }
}

impl CleanupArgs {
    pub fn run(self) -> Result<ExitCode> {
        let docker = DockerCli::new();
        let volumes_only = self.volumes_only;
        let steps = block_on(async {
            docker.check_prerequisites().await?;
            if volumes_only {
                return Ok::<_, DockerError>(docker.prune_volumes().await);
            }
            // Volumes are only touched when docker reports something to reclaim.
            let include_volumes = match docker.reclaimable_volume_bytes().await {
                Ok(bytes) => bytes > 0,
                Err(err) => {
                    tracing::warn!(error = %err, "could not read reclaimable volume space");
                    false
                }
            };
            Ok(docker.aggressive_prune(include_volumes).await)
        })?
        .context("cleanup could not start")?;

        let failed = steps.iter().filter(|s| !s.ok).count();
        let rows: Vec<StepRow> = steps.into_iter().map(StepRow::from).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");

        if failed > 0 {
            println!("{} {failed} cleanup step(s) failed", "✗".red().bold());
            return Ok(ExitCode::FAILURE);
        }
        println!("{} cleanup finished", "✓".green().bold());
        Ok(ExitCode::SUCCESS)
    }
}
