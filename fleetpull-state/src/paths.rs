//! Run-scoped working directory layout.
//!
//! ```text
//! <home>/.fleetpull/
//!   runs/
//!     <run_key>/            (one per manifest path)
//!       ledger.json         completed + failed identities
//!       breakers.json       circuit-breaker entries
//!       queue.json          items never attempted when the run ended
//!       results.log         JSON lines, one per terminal outcome
//! ```

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

pub const FLEETPULL_DIR: &str = ".fleetpull";
pub const LEDGER_FILE: &str = "ledger.json";
pub const BREAKERS_FILE: &str = "breakers.json";
pub const QUEUE_FILE: &str = "queue.json";
pub const RESULTS_LOG: &str = "results.log";

pub fn fleetpull_root(home: &Path) -> PathBuf {
    home.join(FLEETPULL_DIR)
}

pub fn runs_root(home: &Path) -> PathBuf {
    fleetpull_root(home).join("runs")
}

/// Stable 16-hex-digit key for a manifest path.
///
/// Keyed on the absolute path, not content, so a resume finds its state even
/// after the manifest was edited between runs.
pub fn run_key(manifest_path: &Path) -> String {
    let absolute = std::fs::canonicalize(manifest_path).unwrap_or_else(|_| {
        if manifest_path.is_absolute() {
            manifest_path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(manifest_path))
                .unwrap_or_else(|_| manifest_path.to_path_buf())
        }
    });
    let digest = Sha256::digest(absolute.to_string_lossy().as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// `<home>/.fleetpull/runs/<run_key>/`, pure, no I/O.
pub fn run_dir_at(home: &Path, manifest_path: &Path) -> PathBuf {
    runs_root(home).join(run_key(manifest_path))
}

/// File locations inside one run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    root: PathBuf,
}

impl RunPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ledger(&self) -> PathBuf {
        self.root.join(LEDGER_FILE)
    }

    pub fn breakers(&self) -> PathBuf {
        self.root.join(BREAKERS_FILE)
    }

    pub fn queue(&self) -> PathBuf {
        self.root.join(QUEUE_FILE)
    }

    pub fn results_log(&self) -> PathBuf {
        self.root.join(RESULTS_LOG)
    }
}
