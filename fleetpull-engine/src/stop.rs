//! Run-wide stop flag.
//!
//! Set at most once per run and never cleared. Workers check it before each
//! dequeue; an in-flight pull is never interrupted.

use std::fmt;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Available disk dropped below the critical threshold.
    DiskCritical,
    /// The operator pressed ctrl-c.
    Interrupted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::DiskCritical => write!(f, "critical disk space"),
            StopReason::Interrupted => write!(f, "interrupted"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: watch::Sender<Option<StopReason>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Assert the signal. Returns `true` only for the call that set it.
    pub fn trigger(&self, reason: StopReason) -> bool {
        let set = self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
        if set {
            tracing::warn!(reason = %reason, "stop signal raised, draining workers");
        }
        set
    }

    pub fn is_set(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn reason(&self) -> Option<StopReason> {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<StopReason>> {
        self.tx.subscribe()
    }
}
