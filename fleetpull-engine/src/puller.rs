//! One item, many attempts: timeout, classification, backoff and the
//! circuit breaker.

use std::sync::Arc;
use std::time::Duration;

use fleetpull_core::PullItem;
use fleetpull_docker::{FetchError, ImageFetcher};

use crate::backoff::Backoff;
use crate::breakers::SharedBreakers;
use crate::classify::{classify, FailureClass, RetryPolicy};

/// Terminal result for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    Succeeded {
        attempts: u32,
    },
    Failed {
        class: FailureClass,
        attempts: u32,
        message: String,
    },
}

impl PullOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PullOutcome::Succeeded { .. })
    }

    /// Calls made to the fetch primitive.
    pub fn attempts(&self) -> u32 {
        match self {
            PullOutcome::Succeeded { attempts } | PullOutcome::Failed { attempts, .. } => *attempts,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PullerConfig {
    /// Per-attempt hard timeout.
    pub timeout: Duration,
    /// Total attempts, i.e. `retries + 1`. Never less than one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

pub struct Puller {
    fetcher: Arc<dyn ImageFetcher>,
    breakers: Arc<SharedBreakers>,
    config: PullerConfig,
}

impl Puller {
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        breakers: Arc<SharedBreakers>,
        config: PullerConfig,
    ) -> Self {
        Self {
            fetcher,
            breakers,
            config,
        }
    }

    pub async fn pull(&self, item: &PullItem) -> PullOutcome {
        let id = &item.id;
        if let Some(left) = self.breakers.remaining(id) {
            tracing::warn!(item = %id, retry_in_s = left.as_secs(), "circuit open, skipping pull");
            return PullOutcome::Failed {
                class: FailureClass::CircuitOpen,
                attempts: 0,
                message: format!("circuit breaker open for another {}s", left.as_secs()),
            };
        }

        let max_attempts = self.config.max_attempts.max(1);
        let mut last = (FailureClass::Unknown, String::new());

        for attempt in 1..=max_attempts {
            tracing::debug!(item = %id, attempt, max_attempts, "pulling");
            let result = match tokio::time::timeout(self.config.timeout, self.fetcher.pull(id)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::TimedOut(self.config.timeout)),
            };

            let err = match result {
                Ok(()) => {
                    self.breakers.close(id);
                    tracing::info!(item = %id, attempt, "pulled");
                    return PullOutcome::Succeeded { attempts: attempt };
                }
                Err(err) => err,
            };

            let class = classify(&err);
            let message = err.to_string();
            tracing::warn!(item = %id, attempt, class = %class, error = %message, "pull attempt failed");

            match class.policy() {
                RetryPolicy::Abort => {
                    return PullOutcome::Failed {
                        class,
                        attempts: attempt,
                        message,
                    };
                }
                RetryPolicy::AbortAndOpenBreaker => {
                    self.breakers.open(id);
                    return PullOutcome::Failed {
                        class,
                        attempts: attempt,
                        message,
                    };
                }
                policy @ (RetryPolicy::Extended | RetryPolicy::Exponential) => {
                    if attempt < max_attempts {
                        let delay = self.config.backoff.delay(policy, attempt);
                        tracing::debug!(item = %id, attempt, delay_ms = delay.as_millis() as u64, "backing off");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
            last = (class, message);
        }

        tracing::error!(item = %id, attempts = max_attempts, class = %last.0, "giving up");
        self.breakers.open(id);
        PullOutcome::Failed {
            class: last.0,
            attempts: max_attempts,
            message: last.1,
        }
    }
}
