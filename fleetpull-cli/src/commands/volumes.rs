//! `--volume-status`: managed volumes, engine disk usage and free space.

use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use fleetpull_docker::{
    df::DfRow, DiskProbe, DockerCli, DockerError, FsDiskProbe, Housekeeping, VolumeStatus,
};
use fleetpull_engine::block_on;

use super::format_gb;

pub struct VolumeStatusArgs;

#[derive(Tabled)]
struct VolumeRow {
    #[tabled(rename = "Volume")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Driver")]
    driver: String,
    #[tabled(rename = "Mountpoint")]
    mountpoint: String,
}

impl From<VolumeStatus> for VolumeRow {
    fn from(v: VolumeStatus) -> Self {
        let status = match (v.exists, v.labelled) {
            (false, _) => "missing".yellow().to_string(),
            (true, true) => "managed".green().to_string(),
            (true, false) => "unlabelled".red().to_string(),
        };
        Self {
            name: v.name,
            status,
            driver: v.driver.unwrap_or_else(|| "-".into()),
            mountpoint: v.mountpoint.unwrap_or_else(|| "-".into()),
        }
    }
}

#[derive(Tabled)]
struct UsageRow {
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Total")]
    total: String,
    #[tabled(rename = "Active")]
    active: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Reclaimable")]
    reclaimable: String,
}

impl From<DfRow> for UsageRow {
    fn from(row: DfRow) -> Self {
        Self {
            kind: row.kind,
            total: row.total_count,
            active: row.active,
            size: row.size,
            reclaimable: row.reclaimable,
        }
    }
}

impl VolumeStatusArgs {
    pub fn run(self) -> Result<ExitCode> {
        let docker = DockerCli::new();
        let (volumes, usage, root) = block_on(async {
            docker.check_prerequisites().await?;
            let volumes = docker.volume_status().await?;
            let usage = docker.system_df().await?;
            let root = docker.data_root().await;
            Ok::<_, DockerError>((volumes, usage, root))
        })?
        .context("could not read docker volume status")?;

        let rows: Vec<VolumeRow> = volumes.into_iter().map(VolumeRow::from).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{}", "Managed volumes".bold());
        println!("{table}");

        if !usage.is_empty() {
            let rows: Vec<UsageRow> = usage.into_iter().map(UsageRow::from).collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{}", "Engine disk usage".bold());
            println!("{table}");
        }

        let probe = FsDiskProbe::for_data_root(root.clone());
        let sample = probe
            .sample()
            .with_context(|| format!("could not sample free space at {}", probe.path().display()))?;
        println!(
            "{} {} free of {} ({:.1}% used) at {}",
            "Disk:".bold(),
            format_gb(sample.available_bytes),
            format_gb(sample.total_bytes),
            sample.usage_percent(),
            probe.path().display()
        );
        if let Some(root) = root.filter(|dir| dir.as_path() != probe.path()) {
            println!(
                "{}",
                format!("docker root {} is not on this host", root.display()).bright_black()
            );
        }
        Ok(ExitCode::SUCCESS)
    }
}
