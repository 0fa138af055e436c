use std::path::PathBuf;

use thiserror::Error;

use fleetpull_core::ConfigurationError;
use fleetpull_docker::DockerError;
use fleetpull_state::StateError;

/// Run-fatal errors. Per-item pull failures are never represented here; they
/// are recorded as outcomes and the run continues.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigurationError),

    #[error("prerequisite missing")]
    Prerequisite(#[source] DockerError),

    #[error(transparent)]
    Docker(#[from] DockerError),

    #[error("state error")]
    State(#[from] StateError),

    #[error("no valid items to pull from {source_desc}")]
    NoItems { source_desc: String },

    #[error("I/O error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{task} task join failure: {message}")]
    Join { task: String, message: String },
}

impl EngineError {
    /// Process exit code for this error: 2 when the container engine is
    /// unavailable, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            EngineError::Prerequisite(_) => 2,
            _ => 1,
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.into(),
        source,
    }
}
