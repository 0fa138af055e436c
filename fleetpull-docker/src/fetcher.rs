//! Seams between the orchestrator and the container engine.
//!
//! The engine crate only ever talks to these traits; [`crate::DockerCli`] is
//! the production implementation and tests substitute in-memory fakes.

use std::path::PathBuf;

use async_trait::async_trait;

use fleetpull_core::ItemId;

use crate::error::{error_chain, DockerError, FetchError};

/// The artifact-fetch primitive: one blocking pull of one reference.
///
/// Implementations must not apply their own timeout or retry; both belong to
/// the caller.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Verify the engine is installed and reachable before any pull.
    async fn ready(&self) -> Result<(), DockerError> {
        Ok(())
    }

    async fn pull(&self, id: &ItemId) -> Result<(), FetchError>;
}

/// Space-reclaiming operations used by the admission controller and the
/// cleanup commands.
#[async_trait]
pub trait Housekeeping: Send + Sync {
    /// One-time setup before a real run (managed volumes).
    async fn prepare(&self) -> Result<(), DockerError> {
        Ok(())
    }

    /// Directory holding the engine's artifact store, if the engine reports one.
    async fn data_root(&self) -> Option<PathBuf> {
        None
    }

    /// Bytes the engine reports as reclaimable from local volumes.
    async fn reclaimable_volume_bytes(&self) -> Result<u64, DockerError>;

    /// Dangling images, then images unused for a week.
    async fn soft_prune(&self) -> Vec<CleanupStep>;

    /// Build cache, unmanaged volumes (when `include_volumes`), images unused for a day.
    async fn aggressive_prune(&self, include_volumes: bool) -> Vec<CleanupStep>;

    /// Unmanaged volumes only.
    async fn prune_volumes(&self) -> Vec<CleanupStep>;
}

/// Outcome of one cleanup command. Cleanup is best-effort; a failed step
/// never aborts the steps after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupStep {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

impl CleanupStep {
    pub fn from_result(name: &'static str, result: Result<String, DockerError>) -> Self {
        match result {
            Ok(output) => Self {
                name,
                ok: true,
                detail: summarize_prune_output(&output),
            },
            Err(err) => {
                let detail = error_chain(&err);
                tracing::warn!(step = name, error = %detail, "cleanup step failed");
                Self {
                    name,
                    ok: false,
                    detail,
                }
            }
        }
    }
}

/// Docker prints `Total reclaimed space: 1.2GB` as the last line of a prune.
fn summarize_prune_output(output: &str) -> String {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with("Total reclaimed space"))
        .unwrap_or("done")
        .to_string()
}
