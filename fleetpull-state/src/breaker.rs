//! Per-item circuit breaker.
//!
//! An entry records when an item last failed in a way that should suppress
//! further attempts. The breaker is open for that item while
//! `now - last_failure_at < cooldown`. Entries are removed on success and
//! lazily once their cooldown has passed.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fleetpull_core::ItemId;

use crate::atomic::{load_json, save_json};
use crate::error::StateError;

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    cooldown: Duration,
    open: HashMap<ItemId, DateTime<Utc>>,
}

/// On-disk form; JSON object keys must be strings, so entries are a list.
#[derive(Debug, Default, Serialize, Deserialize)]
struct BreakerFile {
    #[serde(default)]
    entries: Vec<BreakerEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BreakerEntry {
    item: ItemId,
    last_failure_at: DateTime<Utc>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            open: HashMap::new(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Time left before `id` may be attempted again, `None` if the breaker is closed.
    pub fn remaining_at(&self, id: &ItemId, now: DateTime<Utc>) -> Option<Duration> {
        let last = self.open.get(id)?;
        let elapsed = (now - *last).to_std().unwrap_or(Duration::ZERO);
        self.cooldown.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    pub fn remaining(&self, id: &ItemId) -> Option<Duration> {
        self.remaining_at(id, Utc::now())
    }

    pub fn is_open_at(&self, id: &ItemId, now: DateTime<Utc>) -> bool {
        self.remaining_at(id, now).is_some()
    }

    pub fn is_open(&self, id: &ItemId) -> bool {
        self.is_open_at(id, Utc::now())
    }

    /// Open (or re-open) the breaker for `id` as of `now`.
    pub fn trip_at(&mut self, id: &ItemId, now: DateTime<Utc>) {
        self.open.insert(id.clone(), now);
    }

    pub fn trip(&mut self, id: &ItemId) {
        self.trip_at(id, Utc::now());
    }

    /// Close the breaker for `id`. Returns whether an entry existed.
    pub fn clear(&mut self, id: &ItemId) -> bool {
        self.open.remove(id).is_some()
    }

    /// Drop every entry whose cooldown has passed.
    pub fn prune_expired_at(&mut self, now: DateTime<Utc>) {
        let cooldown = self.cooldown;
        self.open.retain(|_, last| {
            (now - *last)
                .to_std()
                .map(|elapsed| elapsed < cooldown)
                .unwrap_or(true)
        });
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

/// Load persisted breakers with the given cooldown, dropping expired entries.
pub fn load_at(path: &Path, cooldown: Duration) -> Result<CircuitBreaker, StateError> {
    let file: BreakerFile = load_json(path)?.unwrap_or_default();
    let mut breaker = CircuitBreaker::new(cooldown);
    for entry in file.entries {
        breaker.trip_at(&entry.item, entry.last_failure_at);
    }
    breaker.prune_expired_at(Utc::now());
    Ok(breaker)
}

/// Save breakers atomically, sorted for stable output.
pub fn save_at(path: &Path, breaker: &CircuitBreaker) -> Result<(), StateError> {
    let mut entries: Vec<BreakerEntry> = breaker
        .open
        .iter()
        .map(|(item, at)| BreakerEntry {
            item: item.clone(),
            last_failure_at: *at,
        })
        .collect();
    entries.sort_by(|a, b| a.item.cmp(&b.item));
    save_json(path, &BreakerFile { entries })
}
