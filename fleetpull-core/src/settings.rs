//! Run settings and their layering.
//!
//! Precedence, lowest first: built-in defaults, the manifest's `settings`
//! block, the selected `environments.<name>` block, then CLI flags. Every
//! layer above the defaults is a [`SettingsOverride`] whose `None` fields
//! leave the value below untouched.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::manifest::Manifest;

pub const DEFAULT_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_PARALLEL: usize = 4;

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Per-attempt pull timeout, in seconds.
    pub timeout: u64,
    /// Retries after the first attempt; an item is tried at most `retries + 1` times.
    pub retries: u32,
    /// Number of concurrent workers.
    pub parallel: usize,
    pub skip_ai: bool,
    pub skip_windows: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT_SECS,
            retries: DEFAULT_RETRIES,
            parallel: DEFAULT_PARALLEL,
            skip_ai: false,
            skip_windows: false,
        }
    }
}

/// A partial settings layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_ai: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_windows: Option<bool>,
}

impl Settings {
    /// Apply one override layer in place.
    pub fn apply(&mut self, layer: &SettingsOverride) {
        if let Some(timeout) = layer.timeout {
            self.timeout = timeout;
        }
        if let Some(retries) = layer.retries {
            self.retries = retries;
        }
        if let Some(parallel) = layer.parallel {
            self.parallel = parallel;
        }
        if let Some(skip_ai) = layer.skip_ai {
            self.skip_ai = skip_ai;
        }
        if let Some(skip_windows) = layer.skip_windows {
            self.skip_windows = skip_windows;
        }
    }

    /// Layer defaults, manifest settings, the optional environment block and CLI flags.
    pub fn resolve(
        manifest: &Manifest,
        environment: Option<&str>,
        cli: &SettingsOverride,
    ) -> Result<Self, ConfigurationError> {
        let mut settings = Settings::default();
        settings.apply(&manifest.settings);

        if let Some(name) = environment {
            let layer = manifest.environments.get(name).ok_or_else(|| {
                ConfigurationError::UnknownEnvironment {
                    name: name.to_string(),
                }
            })?;
            settings.apply(layer);
        }

        settings.apply(cli);
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.parallel == 0 {
            return Err(ConfigurationError::Invalid(
                "parallel must be at least 1".to_string(),
            ));
        }
        if self.timeout == 0 {
            return Err(ConfigurationError::Invalid(
                "timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Upper bound on fetch attempts for a single item.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}
