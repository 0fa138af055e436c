//! Disk-space admission controller.
//!
//! A background task that samples free space on a fixed interval. Below the
//! critical threshold it raises the stop signal and runs an aggressive
//! cleanup once per critical episode. Above the warning usage percentage it
//! runs a soft prune, but only while no pull is in flight.
//!
//! It never blocks workers: its only outputs are the stop signal and freed
//! space.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use fleetpull_docker::{CleanupStep, DiskProbe, DiskSample, Housekeeping};

use crate::error::EngineError;
use crate::queue::WorkQueue;
use crate::stop::{StopReason, StopSignal};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_SPACE_THRESHOLD_GB: f64 = 5.0;
pub const DEFAULT_CLEANUP_THRESHOLD_PERCENT: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissionConfig {
    pub interval: Duration,
    pub space_threshold_gb: f64,
    pub cleanup_threshold_percent: f64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            space_threshold_gb: DEFAULT_SPACE_THRESHOLD_GB,
            cleanup_threshold_percent: DEFAULT_CLEANUP_THRESHOLD_PERCENT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pressure {
    Normal,
    Warning,
    Critical,
}

/// Critical wins over warning when both hold.
pub fn assess(sample: &DiskSample, config: &AdmissionConfig) -> Pressure {
    if sample.available_gb() < config.space_threshold_gb {
        Pressure::Critical
    } else if sample.usage_percent() > config.cleanup_threshold_percent {
        Pressure::Warning
    } else {
        Pressure::Normal
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    Idle,
    ProbeFailed,
    /// Critical, cleanup already ran this episode.
    Stopped,
    AggressiveCleanup,
    SoftPrune,
    /// Warning, but a pull was in flight.
    SoftPruneDeferred,
}

pub struct AdmissionController {
    probe: Arc<dyn DiskProbe>,
    housekeeping: Arc<dyn Housekeeping>,
    queue: Arc<WorkQueue>,
    stop: StopSignal,
    config: AdmissionConfig,
    critical_cleanup_done: bool,
}

impl AdmissionController {
    pub fn new(
        probe: Arc<dyn DiskProbe>,
        housekeeping: Arc<dyn Housekeeping>,
        queue: Arc<WorkQueue>,
        stop: StopSignal,
        config: AdmissionConfig,
    ) -> Self {
        Self {
            probe,
            housekeeping,
            queue,
            stop,
            config,
            critical_cleanup_done: false,
        }
    }

    /// Sample once and react.
    pub async fn tick(&mut self) -> TickAction {
        let sample = match self.probe.sample() {
            Ok(sample) => sample,
            Err(err) => {
                tracing::warn!(error = %err, "disk probe failed");
                return TickAction::ProbeFailed;
            }
        };

        match assess(&sample, &self.config) {
            Pressure::Normal => {
                self.critical_cleanup_done = false;
                TickAction::Idle
            }
            Pressure::Critical => {
                tracing::error!(
                    available_gb = %format!("{:.1}", sample.available_gb()),
                    threshold_gb = self.config.space_threshold_gb,
                    "disk space critical"
                );
                self.stop.trigger(StopReason::DiskCritical);
                if self.critical_cleanup_done {
                    return TickAction::Stopped;
                }
                self.critical_cleanup_done = true;
                self.aggressive_cleanup().await;
                TickAction::AggressiveCleanup
            }
            Pressure::Warning => {
                self.critical_cleanup_done = false;
                let in_flight = self.queue.in_flight();
                if in_flight > 0 {
                    tracing::info!(
                        usage_percent = %format!("{:.1}", sample.usage_percent()),
                        in_flight,
                        "disk usage high, soft prune deferred while pulls are active"
                    );
                    return TickAction::SoftPruneDeferred;
                }
                tracing::info!(
                    usage_percent = %format!("{:.1}", sample.usage_percent()),
                    "disk usage high, running soft prune"
                );
                log_steps(&self.housekeeping.soft_prune().await);
                TickAction::SoftPrune
            }
        }
    }

    async fn aggressive_cleanup(&self) {
        let reclaimable = match self.housekeeping.reclaimable_volume_bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "could not read reclaimable volume size");
                0
            }
        };
        tracing::warn!(reclaimable_volume_bytes = reclaimable, "running aggressive cleanup");
        log_steps(&self.housekeeping.aggressive_prune(reclaimable > 0).await);
    }

    /// Tick on the configured interval (first tick immediately) until shutdown.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<(), EngineError> {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
        Ok(())
    }
}

fn log_steps(steps: &[CleanupStep]) {
    for step in steps {
        if step.ok {
            tracing::info!(step = step.name, detail = %step.detail, "cleanup step done");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fleetpull_core::PullItem;
    use fleetpull_docker::DockerError;
    use std::sync::Mutex;

    const GB: u64 = 1024 * 1024 * 1024;

    struct FixedProbe(Mutex<DiskSample>);

    impl FixedProbe {
        fn new(available_gb: u64, total_gb: u64) -> Self {
            Self(Mutex::new(DiskSample {
                available_bytes: available_gb * GB,
                total_bytes: total_gb * GB,
            }))
        }

        fn set(&self, available_gb: u64) {
            self.0.lock().unwrap().available_bytes = available_gb * GB;
        }
    }

    impl DiskProbe for FixedProbe {
        fn sample(&self) -> Result<DiskSample, DockerError> {
            Ok(*self.0.lock().unwrap())
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        reclaimable: u64,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Housekeeping for Recorder {
        async fn reclaimable_volume_bytes(&self) -> Result<u64, DockerError> {
            Ok(self.reclaimable)
        }
        async fn soft_prune(&self) -> Vec<CleanupStep> {
            self.calls.lock().unwrap().push("soft".into());
            Vec::new()
        }
        async fn aggressive_prune(&self, include_volumes: bool) -> Vec<CleanupStep> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("aggressive(volumes={include_volumes})"));
            Vec::new()
        }
        async fn prune_volumes(&self) -> Vec<CleanupStep> {
            Vec::new()
        }
    }

    fn controller(
        probe: Arc<FixedProbe>,
        housekeeping: Arc<Recorder>,
        queue: Arc<WorkQueue>,
    ) -> (AdmissionController, StopSignal) {
        let stop = StopSignal::new();
        let ctl = AdmissionController::new(
            probe,
            housekeeping,
            queue,
            stop.clone(),
            AdmissionConfig::default(),
        );
        (ctl, stop)
    }

    #[test]
    fn assess_thresholds() {
        let config = AdmissionConfig::default();
        let sample = |avail: u64, total: u64| DiskSample {
            available_bytes: avail * GB,
            total_bytes: total * GB,
        };
        assert_eq!(assess(&sample(3, 100), &config), Pressure::Critical);
        assert_eq!(assess(&sample(8, 100), &config), Pressure::Warning);
        assert_eq!(assess(&sample(50, 100), &config), Pressure::Normal);
    }

    #[tokio::test]
    async fn critical_stops_and_cleans_once_per_episode() {
        let probe = Arc::new(FixedProbe::new(3, 100));
        let hk = Arc::new(Recorder {
            reclaimable: 2 * GB,
            ..Default::default()
        });
        let (mut ctl, stop) = controller(probe.clone(), hk.clone(), Arc::new(WorkQueue::new()));

        assert_eq!(ctl.tick().await, TickAction::AggressiveCleanup);
        assert_eq!(stop.reason(), Some(StopReason::DiskCritical));
        assert_eq!(ctl.tick().await, TickAction::Stopped);
        assert_eq!(hk.calls(), ["aggressive(volumes=true)"]);

        probe.set(50);
        assert_eq!(ctl.tick().await, TickAction::Idle);
        assert!(stop.is_set(), "stop signal is never cleared");

        probe.set(2);
        assert_eq!(ctl.tick().await, TickAction::AggressiveCleanup);
        assert_eq!(hk.calls().len(), 2);
    }

    #[tokio::test]
    async fn volumes_untouched_when_nothing_reclaimable() {
        let hk = Arc::new(Recorder::default());
        let (mut ctl, _) = controller(Arc::new(FixedProbe::new(1, 100)), hk.clone(), Arc::new(WorkQueue::new()));
        ctl.tick().await;
        assert_eq!(hk.calls(), ["aggressive(volumes=false)"]);
    }

    #[tokio::test]
    async fn soft_prune_waits_for_idle_queue() {
        let queue = Arc::new(WorkQueue::new());
        queue.enqueue_all([PullItem::image("alpine", "3")]);
        let item = queue.try_dequeue().unwrap();

        let hk = Arc::new(Recorder::default());
        let (mut ctl, stop) = controller(Arc::new(FixedProbe::new(8, 100)), hk.clone(), queue.clone());

        assert_eq!(ctl.tick().await, TickAction::SoftPruneDeferred);
        assert!(hk.calls().is_empty());

        queue.complete(&item.id, true);
        assert_eq!(ctl.tick().await, TickAction::SoftPrune);
        assert_eq!(hk.calls(), ["soft"]);
        assert!(!stop.is_set(), "warning never stops the run");
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_on_interval_until_shutdown() {
        let probe = Arc::new(FixedProbe::new(50, 100));
        let hk = Arc::new(Recorder::default());
        let (ctl, stop) = controller(probe.clone(), hk.clone(), Arc::new(WorkQueue::new()));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(ctl.run(shutdown_rx));
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(!stop.is_set());

        probe.set(1);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(stop.is_set());

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
