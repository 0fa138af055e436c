//! Failure classes and the retry policy attached to each.

use std::fmt;

use fleetpull_docker::FetchError;

/// Why an item failed. `CircuitOpen` is produced locally and never comes
/// from the fetch primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    DiskSpace,
    Network,
    Auth,
    NotFound,
    Manifest,
    RateLimit,
    Unknown,
    CircuitOpen,
}

/// What the puller does after an attempt fails with a given class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Give up on the item.
    Abort,
    /// Give up and open the item's circuit breaker.
    AbortAndOpenBreaker,
    /// Retry after `base * attempt * 5`.
    Extended,
    /// Retry after `base * attempt^2` plus jitter.
    Exponential,
}

impl FailureClass {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureClass::DiskSpace => "disk_space",
            FailureClass::Network => "network",
            FailureClass::Auth => "auth",
            FailureClass::NotFound => "not_found",
            FailureClass::Manifest => "manifest",
            FailureClass::RateLimit => "rate_limit",
            FailureClass::Unknown => "unknown",
            FailureClass::CircuitOpen => "circuit_open",
        }
    }

    pub fn policy(self) -> RetryPolicy {
        match self {
            FailureClass::DiskSpace | FailureClass::CircuitOpen => RetryPolicy::Abort,
            FailureClass::Auth => RetryPolicy::AbortAndOpenBreaker,
            FailureClass::RateLimit => RetryPolicy::Extended,
            FailureClass::Network
            | FailureClass::NotFound
            | FailureClass::Manifest
            | FailureClass::Unknown => RetryPolicy::Exponential,
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a structured fetch error to its class. A timed-out attempt counts as
/// a network failure.
pub fn classify(err: &FetchError) -> FailureClass {
    match err {
        FetchError::DiskSpace(_) => FailureClass::DiskSpace,
        FetchError::Network(_) | FetchError::TimedOut(_) => FailureClass::Network,
        FetchError::Auth(_) => FailureClass::Auth,
        FetchError::NotFound(_) => FailureClass::NotFound,
        FetchError::Manifest(_) => FailureClass::Manifest,
        FetchError::RateLimit(_) => FailureClass::RateLimit,
        FetchError::Spawn(_) | FetchError::Unknown(_) => FailureClass::Unknown,
    }
}
