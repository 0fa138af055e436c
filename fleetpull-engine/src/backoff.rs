//! Delay between failed pull attempts.

use std::time::Duration;

use rand::Rng;

use crate::classify::RetryPolicy;

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Upper bound of the random extra delay, as a fraction of the computed delay.
const MAX_JITTER: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY)
    }
}

impl Backoff {
    pub fn new(base: Duration) -> Self {
        Self { base }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    /// Delay before the attempt following `attempt` (1-based), with random jitter.
    pub fn delay(&self, policy: RetryPolicy, attempt: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.0..=MAX_JITTER);
        self.delay_with_jitter(policy, attempt, jitter)
    }

    /// Deterministic form of [`Backoff::delay`]. `jitter` is the fraction of
    /// the exponential delay to add and is ignored for other policies.
    pub fn delay_with_jitter(&self, policy: RetryPolicy, attempt: u32, jitter: f64) -> Duration {
        let attempt = attempt.max(1);
        match policy {
            RetryPolicy::Abort | RetryPolicy::AbortAndOpenBreaker => Duration::ZERO,
            RetryPolicy::Extended => self.base.saturating_mul(attempt.saturating_mul(5)),
            RetryPolicy::Exponential => {
                let delay = self.base.saturating_mul(attempt.saturating_mul(attempt));
                let extra = delay.mul_f64(jitter.clamp(0.0, MAX_JITTER));
                delay.saturating_add(extra)
            }
        }
    }
}
