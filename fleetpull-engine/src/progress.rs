//! Progress, ETA and the end-of-run report.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;

use fleetpull_core::PullItem;

use crate::queue::{QueueStats, WorkQueue};
use crate::recorder::FailedItem;
use crate::stop::StopReason;

pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    pub percent: f64,
    /// `None` until at least one item has completed.
    pub eta: Option<Duration>,
}

impl Progress {
    pub fn from_stats(stats: &QueueStats, elapsed: Duration) -> Self {
        let completed = stats.completed();
        let remaining = stats.remaining();
        let percent = if stats.total == 0 {
            100.0
        } else {
            completed as f64 * 100.0 / stats.total as f64
        };
        Self {
            total: stats.total,
            completed,
            remaining,
            percent,
            eta: eta(elapsed, completed, remaining),
        }
    }
}

/// `elapsed * remaining / completed`.
pub fn eta(elapsed: Duration, completed: usize, remaining: usize) -> Option<Duration> {
    if completed == 0 {
        return None;
    }
    Some(elapsed.mul_f64(remaining as f64 / completed as f64))
}

/// Log a progress line on every interval tick until shutdown.
pub async fn progress_task(
    queue: Arc<WorkQueue>,
    started: Instant,
    every: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let stats = queue.snapshot();
                let progress = Progress::from_stats(&stats, started.elapsed());
                tracing::info!(
                    done = progress.completed,
                    total = progress.total,
                    succeeded = stats.succeeded,
                    failed = stats.failed,
                    in_flight = stats.in_flight,
                    percent = %format!("{:.1}", progress.percent),
                    eta_s = progress.eta.map(|d| d.as_secs()),
                    "progress"
                );
            }
        }
    }
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub remaining: usize,
    pub duration: Duration,
    pub failures: Vec<FailedItem>,
    pub stopped: Option<StopReason>,
    pub dry_run: bool,
    /// Filled only for dry runs.
    pub would_pull: Vec<PullItem>,
    pub run_dir: Option<PathBuf>,
}

impl RunReport {
    pub fn from_stats(stats: QueueStats, duration: Duration, failures: Vec<FailedItem>) -> Self {
        Self {
            total: stats.total,
            succeeded: stats.succeeded,
            failed: stats.failed,
            remaining: stats.remaining(),
            duration,
            failures,
            stopped: None,
            dry_run: false,
            would_pull: Vec::new(),
            run_dir: None,
        }
    }

    pub fn dry_run(items: Vec<PullItem>, run_dir: Option<PathBuf>) -> Self {
        Self {
            total: items.len(),
            succeeded: 0,
            failed: 0,
            remaining: items.len(),
            duration: Duration::ZERO,
            failures: Vec::new(),
            stopped: None,
            dry_run: true,
            would_pull: items,
            run_dir,
        }
    }

    /// Every item reached success. Dry runs always count as success.
    pub fn is_success(&self) -> bool {
        self.dry_run || (self.failed == 0 && self.remaining == 0)
    }

    /// Whether `--resume` would have anything to do.
    pub fn resumable(&self) -> bool {
        !self.dry_run && (self.failed > 0 || self.remaining > 0)
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}
