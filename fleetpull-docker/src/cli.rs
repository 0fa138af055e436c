//! [`DockerCli`]: the production engine client, driving the `docker` binary.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::process::Command;

use fleetpull_core::ItemId;

use crate::df::{parse_df, reclaimable_volume_bytes, DfRow};
use crate::error::{DockerError, FetchError};
use crate::fetcher::{CleanupStep, Housekeeping, ImageFetcher};
use crate::volumes::UNMANAGED_FILTER;

/// Unused images older than this are removed by the soft prune.
pub const SOFT_PRUNE_AGE: &str = "until=168h";
/// Unused images older than this are removed by the aggressive prune.
pub const AGGRESSIVE_PRUNE_AGE: &str = "until=24h";

/// Thin async wrapper over the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    /// Use a specific binary; tests point this at a stub script.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn output(&self, args: &[&str]) -> Result<Output, DockerError> {
        self.command(args).output().await.map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                DockerError::NotInstalled
            } else {
                DockerError::Spawn {
                    command: args.join(" "),
                    source,
                }
            }
        })
    }

    /// Run and return stdout, mapping a non-zero exit to `CommandFailed`.
    pub async fn run_checked(&self, args: &[&str]) -> Result<String, DockerError> {
        let output = self.output(args).await?;
        if !output.status.success() {
            return Err(DockerError::CommandFailed {
                command: args.join(" "),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Confirm the binary exists and the daemon answers. Returns the server version.
    pub async fn check_prerequisites(&self) -> Result<String, DockerError> {
        match self
            .run_checked(&["info", "--format", "{{.ServerVersion}}"])
            .await
        {
            Ok(version) => Ok(version.trim().to_string()),
            Err(DockerError::CommandFailed { stderr, .. }) => Err(DockerError::NotRunning(stderr)),
            Err(other) => Err(other),
        }
    }

    /// Directory holding the engine's image store, for disk probing.
    pub async fn root_dir(&self) -> Result<PathBuf, DockerError> {
        let out = self
            .run_checked(&["info", "--format", "{{.DockerRootDir}}"])
            .await?;
        let dir = out.trim();
        if dir.is_empty() {
            return Err(DockerError::Parse("empty DockerRootDir".to_string()));
        }
        Ok(PathBuf::from(dir))
    }

    pub async fn system_df(&self) -> Result<Vec<DfRow>, DockerError> {
        let out = self
            .run_checked(&["system", "df", "--format", "{{json .}}"])
            .await?;
        parse_df(&out)
    }
}

#[async_trait]
impl ImageFetcher for DockerCli {
    async fn ready(&self) -> Result<(), DockerError> {
        let version = self.check_prerequisites().await?;
        tracing::debug!(version = %version, "docker engine reachable");
        Ok(())
    }

    async fn pull(&self, id: &ItemId) -> Result<(), FetchError> {
        let reference = id.reference();
        let output = self
            .command(&["pull", "--quiet", &reference])
            .output()
            .await
            .map_err(|e| FetchError::Spawn(e.to_string()))?;
        if output.status.success() {
            return Ok(());
        }
        Err(FetchError::from_stderr(&String::from_utf8_lossy(
            &output.stderr,
        )))
    }
}

#[async_trait]
impl Housekeeping for DockerCli {
    async fn prepare(&self) -> Result<(), DockerError> {
        self.ensure_managed_volumes().await
    }

    async fn data_root(&self) -> Option<PathBuf> {
        match self.root_dir().await {
            Ok(dir) => Some(dir),
            Err(err) => {
                tracing::debug!(error = %err, "could not read docker root dir");
                None
            }
        }
    }

    async fn reclaimable_volume_bytes(&self) -> Result<u64, DockerError> {
        let rows = self.system_df().await?;
        reclaimable_volume_bytes(&rows)
    }

    async fn soft_prune(&self) -> Vec<CleanupStep> {
        vec![
            CleanupStep::from_result(
                "dangling image prune",
                self.run_checked(&["image", "prune", "--force"]).await,
            ),
            CleanupStep::from_result(
                "stale image prune",
                self.run_checked(&[
                    "image",
                    "prune",
                    "--all",
                    "--force",
                    "--filter",
                    SOFT_PRUNE_AGE,
                ])
                .await,
            ),
        ]
    }

    async fn aggressive_prune(&self, include_volumes: bool) -> Vec<CleanupStep> {
        let mut steps = vec![CleanupStep::from_result(
            "build cache prune",
            self.run_checked(&["builder", "prune", "--all", "--force"])
                .await,
        )];
        if include_volumes {
            steps.extend(self.prune_volumes().await);
        }
        steps.push(CleanupStep::from_result(
            "image prune by age",
            self.run_checked(&[
                "image",
                "prune",
                "--all",
                "--force",
                "--filter",
                AGGRESSIVE_PRUNE_AGE,
            ])
            .await,
        ));
        steps
    }

    async fn prune_volumes(&self) -> Vec<CleanupStep> {
        vec![CleanupStep::from_result(
            "volume prune",
            self.run_checked(&["volume", "prune", "--force", "--filter", UNMANAGED_FILTER])
                .await,
        )]
    }
}
