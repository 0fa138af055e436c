//! Shared work queue and outcome counters.
//!
//! Pending items, the in-flight set and both counters live behind one mutex,
//! so every observable snapshot satisfies
//! `total == succeeded + failed + pending + in_flight`.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use fleetpull_core::{ItemId, PullItem};

/// Counters observed at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub pending: usize,
    pub in_flight: usize,
}

impl QueueStats {
    /// Work not yet in a terminal state.
    pub fn remaining(&self) -> usize {
        self.pending + self.in_flight
    }

    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<PullItem>,
    in_flight: HashSet<ItemId>,
    known: HashSet<ItemId>,
    total: usize,
    succeeded: usize,
    failed: usize,
}

#[derive(Debug, Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Append items in order. An identity already seen by this queue is
    /// dropped, so no identity can be owned twice. Returns how many were added.
    pub fn enqueue_all(&self, items: impl IntoIterator<Item = PullItem>) -> usize {
        let mut state = self.lock();
        let mut added = 0;
        for item in items {
            if !state.known.insert(item.id.clone()) {
                tracing::debug!(item = %item.id, "duplicate identity not enqueued");
                continue;
            }
            state.pending.push_back(item);
            added += 1;
        }
        state.total += added;
        added
    }

    /// Pop the head item and mark it in flight.
    pub fn try_dequeue(&self) -> Option<PullItem> {
        let mut state = self.lock();
        let item = state.pending.pop_front()?;
        state.in_flight.insert(item.id.clone());
        Some(item)
    }

    /// Move an in-flight item to a terminal state and bump the matching
    /// counter. Returns `false` if `id` was not in flight.
    pub fn complete(&self, id: &ItemId, succeeded: bool) -> bool {
        let mut state = self.lock();
        if !state.in_flight.remove(id) {
            tracing::warn!(item = %id, "completion for an item that is not in flight");
            return false;
        }
        if succeeded {
            state.succeeded += 1;
        } else {
            state.failed += 1;
        }
        true
    }

    pub fn snapshot(&self) -> QueueStats {
        let state = self.lock();
        QueueStats {
            total: state.total,
            succeeded: state.succeeded,
            failed: state.failed,
            pending: state.pending.len(),
            in_flight: state.in_flight.len(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Items never dequeued, in queue order. The queue is left untouched.
    pub fn pending_items(&self) -> Vec<PullItem> {
        self.lock().pending.iter().cloned().collect()
    }
}
