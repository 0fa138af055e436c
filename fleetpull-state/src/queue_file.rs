//! Snapshot of items still pending when a run stopped early.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fleetpull_core::PullItem;

use crate::atomic::{load_json, save_json};
use crate::error::{io_err, StateError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub saved_at: DateTime<Utc>,
    pub items: Vec<PullItem>,
}

impl QueueSnapshot {
    pub fn new(items: Vec<PullItem>) -> Self {
        Self {
            saved_at: Utc::now(),
            items,
        }
    }
}

pub fn load_at(path: &Path) -> Result<Option<QueueSnapshot>, StateError> {
    load_json(path)
}

pub fn save_at(path: &Path, snapshot: &QueueSnapshot) -> Result<(), StateError> {
    save_json(path, snapshot)
}

/// Remove the snapshot; a missing file is not an error.
pub fn clear_at(path: &Path) -> Result<(), StateError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_load_clear() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("queue.json");
        let snapshot = QueueSnapshot::new(vec![PullItem::image("alpine", "3.20")]);

        save_at(&path, &snapshot).unwrap();
        let loaded = load_at(&path).unwrap().unwrap();
        assert_eq!(loaded.items, snapshot.items);

        clear_at(&path).unwrap();
        assert!(load_at(&path).unwrap().is_none());
        clear_at(&path).unwrap();
    }
}
