//! Tracing subscriber setup.
//!
//! Human-readable output goes to stderr. With a log file, a second layer
//! writes JSON lines to it without ANSI colour.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{io_err, EngineError};
use crate::log_rotation::prepare_log_file;

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
/// A second call is a no-op.
pub fn init_tracing(log_file: Option<&Path>) -> Result<(), EngineError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file {
        Some(path) => {
            prepare_log_file(path).map_err(|e| io_err(path, e))?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| io_err(path, e))?;
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn log_file_is_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("fleetpull.log");
        init_tracing(Some(&path)).unwrap();
        assert!(path.exists());
        init_tracing(None).unwrap();
    }
}
