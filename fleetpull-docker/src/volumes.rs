//! Managed, labelled volumes that survive runs and every fleetpull prune.

use serde::Deserialize;

use crate::cli::DockerCli;
use crate::error::DockerError;

pub const MANAGED_LABEL_KEY: &str = "dev.fleetpull.managed";
pub const MANAGED_LABEL: &str = "dev.fleetpull.managed=true";
/// Prune filter that excludes every managed volume.
pub const UNMANAGED_FILTER: &str = "label!=dev.fleetpull.managed=true";

pub const CACHE_VOLUME: &str = "fleetpull-cache";
pub const STATE_VOLUME: &str = "fleetpull-state";
pub const MANAGED_VOLUMES: [&str; 2] = [CACHE_VOLUME, STATE_VOLUME];

/// Result of `docker volume inspect` for one managed volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeStatus {
    pub name: String,
    pub exists: bool,
    pub driver: Option<String>,
    pub mountpoint: Option<String>,
    pub created_at: Option<String>,
    pub labelled: bool,
}

#[derive(Debug, Deserialize)]
struct InspectedVolume {
    #[serde(rename = "Driver", default)]
    driver: String,
    #[serde(rename = "Mountpoint", default)]
    mountpoint: String,
    #[serde(rename = "CreatedAt", default)]
    created_at: String,
    #[serde(rename = "Labels", default)]
    labels: Option<std::collections::HashMap<String, String>>,
}

impl DockerCli {
    /// Create any managed volume that does not yet exist. Idempotent.
    pub async fn ensure_managed_volumes(&self) -> Result<(), DockerError> {
        for name in MANAGED_VOLUMES {
            if self.inspect_volume(name).await?.exists {
                continue;
            }
            self.run_checked(&["volume", "create", "--label", MANAGED_LABEL, name])
                .await?;
            tracing::info!(volume = name, "created managed volume");
        }
        Ok(())
    }

    pub async fn volume_status(&self) -> Result<Vec<VolumeStatus>, DockerError> {
        let mut statuses = Vec::with_capacity(MANAGED_VOLUMES.len());
        for name in MANAGED_VOLUMES {
            statuses.push(self.inspect_volume(name).await?);
        }
        Ok(statuses)
    }

    async fn inspect_volume(&self, name: &str) -> Result<VolumeStatus, DockerError> {
        match self
            .run_checked(&["volume", "inspect", "--format", "{{json .}}", name])
            .await
        {
            Ok(out) => parse_inspect(name, &out),
            Err(DockerError::CommandFailed { stderr, .. })
                if stderr.to_lowercase().contains("no such volume") =>
            {
                Ok(VolumeStatus::missing(name))
            }
            Err(err) => Err(err),
        }
    }
}

impl VolumeStatus {
    fn missing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            exists: false,
            driver: None,
            mountpoint: None,
            created_at: None,
            labelled: false,
        }
    }
}

fn parse_inspect(name: &str, output: &str) -> Result<VolumeStatus, DockerError> {
    let volume: InspectedVolume = serde_json::from_str(output.trim())
        .map_err(|e| DockerError::Parse(format!("volume inspect {name}: {e}")))?;
    let labelled = volume
        .labels
        .as_ref()
        .and_then(|labels| labels.get(MANAGED_LABEL_KEY))
        .map(|v| v == "true")
        .unwrap_or(false);
    let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };
    Ok(VolumeStatus {
        name: name.to_string(),
        exists: true,
        driver: non_empty(volume.driver),
        mountpoint: non_empty(volume.mountpoint),
        created_at: non_empty(volume.created_at),
        labelled,
    })
}
