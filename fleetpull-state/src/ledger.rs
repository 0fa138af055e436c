//! Result ledger: the append-only record of terminal outcomes.
//!
//! The same document is the final report's source of truth and the resume
//! state for the next run.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fleetpull_core::{ItemId, PullItem};

use crate::atomic::{load_json, save_json};
use crate::error::StateError;

/// Completed and failed identities for one run (plus carried-over completions on resume).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultLedger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: Vec<ItemId>,
    #[serde(default)]
    pub failed: Vec<ItemId>,
}

impl ResultLedger {
    /// A fresh ledger for a new run.
    pub fn start(manifest_fingerprint: impl Into<String>) -> Self {
        Self {
            manifest_fingerprint: Some(manifest_fingerprint.into()),
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// A ledger for a resumed run: prior completions carry over, prior failures do not.
    pub fn resume_from(prior: &ResultLedger, manifest_fingerprint: impl Into<String>) -> Self {
        Self {
            completed: prior.completed.clone(),
            ..Self::start(manifest_fingerprint)
        }
    }

    fn contains(&self, id: &ItemId) -> bool {
        self.completed.contains(id) || self.failed.contains(id)
    }

    /// Append a success. Returns `false` (and records nothing) if `id` is already present.
    pub fn record_success(&mut self, id: &ItemId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.completed.push(id.clone());
        true
    }

    /// Append a failure. Returns `false` (and records nothing) if `id` is already present.
    pub fn record_failure(&mut self, id: &ItemId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.failed.push(id.clone());
        true
    }

    pub fn completed_set(&self) -> HashSet<&ItemId> {
        self.completed.iter().collect()
    }

    /// Items from `candidates` that this ledger has not completed, order kept.
    pub fn pending_items(&self, candidates: Vec<PullItem>) -> Vec<PullItem> {
        let done = self.completed_set();
        candidates
            .into_iter()
            .filter(|item| !done.contains(&item.id))
            .collect()
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

/// Load a ledger; an absent file yields an empty ledger.
pub fn load_at(path: &Path) -> Result<ResultLedger, StateError> {
    Ok(load_json(path)?.unwrap_or_default())
}

/// Save a ledger atomically.
pub fn save_at(path: &Path, ledger: &ResultLedger) -> Result<(), StateError> {
    save_json(path, ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(name: &str) -> ItemId {
        ItemId::new(name, "1")
    }

    #[test]
    fn empty_ledger_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        let ledger = load_at(&tmp.path().join("ledger.json")).unwrap();
        assert!(ledger.completed.is_empty());
        assert!(ledger.failed.is_empty());
    }

    #[test]
    fn identity_recorded_at_most_once() {
        let mut ledger = ResultLedger::start("fp");
        assert!(ledger.record_success(&id("a")));
        assert!(!ledger.record_success(&id("a")));
        assert!(!ledger.record_failure(&id("a")));
        assert!(ledger.record_failure(&id("b")));
        assert_eq!(ledger.completed, vec![id("a")]);
        assert_eq!(ledger.failed, vec![id("b")]);
    }

    #[test]
    fn resume_carries_completed_only() {
        let mut prior = ResultLedger::start("fp");
        prior.record_success(&id("a"));
        prior.record_failure(&id("b"));

        let next = ResultLedger::resume_from(&prior, "fp");
        assert_eq!(next.completed, vec![id("a")]);
        assert!(next.failed.is_empty());
        assert!(next.finished_at.is_none());
    }

    #[test]
    fn pending_items_excludes_completed_in_order() {
        let mut prior = ResultLedger::default();
        prior.record_success(&id("b"));
        let items = ["a", "b", "c"]
            .into_iter()
            .map(|n| PullItem::image(n, "1"))
            .collect();
        let pending: Vec<String> = prior
            .pending_items(items)
            .into_iter()
            .map(|i| i.id.repository)
            .collect();
        assert_eq!(pending, ["a", "c"]);
    }

    #[test]
    fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ledger.json");
        let mut ledger = ResultLedger::start("abc");
        ledger.record_success(&id("a"));
        ledger.record_failure(&id("b"));
        ledger.finish();

        save_at(&path, &ledger).unwrap();
        assert_eq!(load_at(&path).unwrap(), ledger);
    }
}
