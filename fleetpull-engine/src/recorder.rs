//! Terminal outcomes: ledger, results log and the failure list for the report.

use std::sync::{Mutex, MutexGuard};

use fleetpull_core::{ItemId, PullItem};
use fleetpull_state::{ResultLedger, ResultRecord, ResultsLog, StateStore};

use crate::classify::FailureClass;
use crate::puller::PullOutcome;

/// A failed item as shown in the final report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub id: ItemId,
    pub class: FailureClass,
    pub attempts: u32,
    pub message: String,
}

#[derive(Debug, Default)]
struct Recorded {
    ledger: ResultLedger,
    failures: Vec<FailedItem>,
}

#[derive(Debug)]
pub struct RunRecorder {
    inner: Mutex<Recorded>,
    log: Option<ResultsLog>,
    store: Option<StateStore>,
}

impl RunRecorder {
    pub fn new(ledger: ResultLedger, log: Option<ResultsLog>, store: Option<StateStore>) -> Self {
        Self {
            inner: Mutex::new(Recorded {
                ledger,
                failures: Vec::new(),
            }),
            log,
            store,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Append the outcome to the ledger and the results log, then save the
    /// ledger. Persistence failures are logged; the run continues.
    pub fn record(&self, item: &PullItem, outcome: &PullOutcome) {
        let record = {
            let mut inner = self.lock();
            let (fresh, record) = match outcome {
                PullOutcome::Succeeded { attempts } => (
                    inner.ledger.record_success(&item.id),
                    ResultRecord::succeeded(&item.id, *attempts),
                ),
                PullOutcome::Failed {
                    class,
                    attempts,
                    message,
                } => {
                    let fresh = inner.ledger.record_failure(&item.id);
                    if fresh {
                        inner.failures.push(FailedItem {
                            id: item.id.clone(),
                            class: *class,
                            attempts: *attempts,
                            message: message.clone(),
                        });
                    }
                    (
                        fresh,
                        ResultRecord::failed(&item.id, *attempts, class.as_str(), message.as_str()),
                    )
                }
            };
            if !fresh {
                tracing::warn!(item = %item.id, "outcome already recorded, ignoring");
                return;
            }
            if let Some(store) = &self.store {
                if let Err(err) = store.save_ledger(&inner.ledger) {
                    tracing::warn!(error = %err, "failed to save ledger");
                }
            }
            record
        };

        if let Some(log) = &self.log {
            if let Err(err) = log.append(&record) {
                tracing::warn!(path = %log.path().display(), error = %err, "failed to append results log");
            }
        }
    }

    pub fn failures(&self) -> Vec<FailedItem> {
        self.lock().failures.clone()
    }

    /// Stamp the finish time, save, and hand back the final ledger.
    pub fn finish(&self) -> ResultLedger {
        let mut inner = self.lock();
        inner.ledger.finish();
        if let Some(store) = &self.store {
            if let Err(err) = store.save_ledger(&inner.ledger) {
                tracing::warn!(error = %err, "failed to save final ledger");
            }
        }
        inner.ledger.clone()
    }
}
