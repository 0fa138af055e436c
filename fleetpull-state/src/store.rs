//! [`StateStore`]: one run directory and everything persisted in it.

use std::path::Path;
use std::time::Duration;

use fleetpull_core::PullItem;

use crate::breaker::{self, CircuitBreaker};
use crate::error::{io_err, StateError};
use crate::ledger::{self, ResultLedger};
use crate::paths::{run_dir_at, RunPaths};
use crate::queue_file::{self, QueueSnapshot};
use crate::results_log::ResultsLog;

#[derive(Debug, Clone)]
pub struct StateStore {
    paths: RunPaths,
}

impl StateStore {
    pub fn new(run_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            paths: RunPaths::new(run_dir),
        }
    }

    /// Store for the run keyed by `manifest_path` under `<home>/.fleetpull/runs/`.
    pub fn for_manifest_at(home: &Path, manifest_path: &Path) -> Self {
        Self::new(run_dir_at(home, manifest_path))
    }

    pub fn paths(&self) -> &RunPaths {
        &self.paths
    }

    pub fn ensure_dir(&self) -> Result<(), StateError> {
        let root = self.paths.root();
        std::fs::create_dir_all(root).map_err(|e| io_err(root, e))
    }

    pub fn load_ledger(&self) -> Result<ResultLedger, StateError> {
        ledger::load_at(&self.paths.ledger())
    }

    pub fn save_ledger(&self, ledger: &ResultLedger) -> Result<(), StateError> {
        ledger::save_at(&self.paths.ledger(), ledger)
    }

    pub fn load_breakers(&self, cooldown: Duration) -> Result<CircuitBreaker, StateError> {
        breaker::load_at(&self.paths.breakers(), cooldown)
    }

    pub fn save_breakers(&self, breakers: &CircuitBreaker) -> Result<(), StateError> {
        breaker::save_at(&self.paths.breakers(), breakers)
    }

    pub fn load_queue(&self) -> Result<Option<QueueSnapshot>, StateError> {
        queue_file::load_at(&self.paths.queue())
    }

    /// Persist the never-attempted items, or remove the snapshot when there are none.
    pub fn save_queue(&self, pending: Vec<PullItem>) -> Result<(), StateError> {
        if pending.is_empty() {
            return queue_file::clear_at(&self.paths.queue());
        }
        queue_file::save_at(&self.paths.queue(), &QueueSnapshot::new(pending))
    }

    pub fn open_results_log(&self, truncate: bool) -> Result<ResultsLog, StateError> {
        ResultsLog::open(&self.paths.results_log(), truncate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_queue_removes_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = StateStore::new(tmp.path().join("run"));
        store
            .save_queue(vec![PullItem::image("alpine", "3")])
            .unwrap();
        assert!(store.paths().queue().exists());

        store.save_queue(Vec::new()).unwrap();
        assert!(!store.paths().queue().exists());
    }

    #[test]
    fn for_manifest_lands_under_home() {
        let home = TempDir::new().unwrap();
        let store = StateStore::for_manifest_at(home.path(), Path::new("/srv/images.yaml"));
        store.ensure_dir().unwrap();
        assert!(store.paths().root().starts_with(home.path()));
        assert!(store.paths().root().is_dir());
    }
}
