//! Error types for fleetpull-core.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal, pre-run errors raised while loading or validating a manifest.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The manifest exists but could not be read.
    #[error("cannot read manifest at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with file path and line context from serde_yaml.
    #[error("failed to parse manifest at {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The document parsed but violates a structural rule.
    #[error("invalid manifest: {0}")]
    Invalid(String),

    /// `--env NAME` named a block that the manifest does not define.
    #[error("environment '{name}' is not defined in the manifest")]
    UnknownEnvironment { name: String },
}
