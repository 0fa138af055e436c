//! Run orchestration: plan, pull, persist, report.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;

use fleetpull_core::manifest::load_or_default;
use fleetpull_core::{build_items, ItemFilters, ManifestSource, PullItem, Settings, SettingsOverride};
use fleetpull_docker::{DiskProbe, DockerCli, FsDiskProbe, Housekeeping, ImageFetcher};
use fleetpull_state::{ResultLedger, StateStore, DEFAULT_COOLDOWN};

use crate::admission::{AdmissionConfig, AdmissionController};
use crate::backoff::{Backoff, DEFAULT_BASE_DELAY};
use crate::breakers::SharedBreakers;
use crate::error::{io_err, EngineError};
use crate::interrupt::{ctrl_c_events, watch_interrupts, Interrupts, FORCED_EXIT_CODE};
use crate::pool::WorkerPool;
use crate::progress::{progress_task, RunReport, DEFAULT_PROGRESS_INTERVAL};
use crate::puller::{Puller, PullerConfig};
use crate::queue::WorkQueue;
use crate::recorder::RunRecorder;
use crate::stop::StopSignal;

// ---------------------------------------------------------------------------
// 1. Inputs
// ---------------------------------------------------------------------------

/// The engine-facing services a run needs.
pub struct Backends {
    pub fetcher: Arc<dyn ImageFetcher>,
    pub housekeeping: Arc<dyn Housekeeping>,
    /// `None` probes the engine's data root (or `/`) once prerequisites pass.
    pub disk: Option<Arc<dyn DiskProbe>>,
}

impl Backends {
    pub fn docker(cli: DockerCli) -> Self {
        Self {
            fetcher: Arc::new(cli.clone()),
            housekeeping: Arc::new(cli),
            disk: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub manifest_path: PathBuf,
    pub environment: Option<String>,
    pub overrides: SettingsOverride,
    pub dry_run: bool,
    pub resume: bool,
    pub home: PathBuf,
    /// Overrides `<home>/.fleetpull/runs/<key>/`.
    pub state_dir: Option<PathBuf>,
    pub retry_delay: Duration,
    pub admission: AdmissionConfig,
    pub progress_interval: Duration,
    pub breaker_cooldown: Duration,
    pub handle_ctrl_c: bool,
}

impl RunOptions {
    pub fn new(manifest_path: impl Into<PathBuf>, home: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            environment: None,
            overrides: SettingsOverride::default(),
            dry_run: false,
            resume: false,
            home: home.into(),
            state_dir: None,
            retry_delay: DEFAULT_BASE_DELAY,
            admission: AdmissionConfig::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            breaker_cooldown: DEFAULT_COOLDOWN,
            handle_ctrl_c: true,
        }
    }

    pub fn state_store(&self) -> StateStore {
        match &self.state_dir {
            Some(dir) => StateStore::new(dir.clone()),
            None => StateStore::for_manifest_at(&self.home, &self.manifest_path),
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Plan
// ---------------------------------------------------------------------------

/// Everything decided before the first pull.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub settings: Settings,
    pub items: Vec<PullItem>,
    pub source: ManifestSource,
    pub fingerprint: String,
}

/// Load the manifest, resolve settings and build the filtered item list.
pub fn plan(opts: &RunOptions) -> Result<RunPlan, EngineError> {
    let (manifest, source) = load_or_default(&opts.manifest_path)?;
    let settings = Settings::resolve(&manifest, opts.environment.as_deref(), &opts.overrides)?;
    let items = build_items(&manifest, &ItemFilters::from_settings(&settings));
    if items.is_empty() {
        return Err(EngineError::NoItems {
            source_desc: source.to_string(),
        });
    }
    Ok(RunPlan {
        fingerprint: manifest.fingerprint(),
        settings,
        items,
        source,
    })
}

/// Items this run will attempt and the ledger it starts from.
///
/// On resume, everything the previous ledger did not complete is a
/// candidate: prior failures and items never attempted alike.
fn select_items(
    plan: &RunPlan,
    store: &StateStore,
    resume: bool,
) -> Result<(Vec<PullItem>, ResultLedger), EngineError> {
    if !resume {
        return Ok((plan.items.clone(), ResultLedger::start(&plan.fingerprint)));
    }

    let prior = store.load_ledger()?;
    if prior
        .manifest_fingerprint
        .as_ref()
        .is_some_and(|fp| fp != &plan.fingerprint)
    {
        tracing::warn!("manifest changed since the previous run, resuming against the current one");
    }
    if let Some(snapshot) = store.load_queue()? {
        tracing::info!(
            unattempted = snapshot.items.len(),
            saved_at = %snapshot.saved_at,
            "previous run stopped before attempting every item"
        );
    }

    let ledger = ResultLedger::resume_from(&prior, &plan.fingerprint);
    let items = ledger.pending_items(plan.items.clone());
    tracing::info!(
        already_completed = plan.items.len() - items.len(),
        to_pull = items.len(),
        "resuming previous run"
    );
    Ok((items, ledger))
}

// ---------------------------------------------------------------------------
// 3. Run
// ---------------------------------------------------------------------------

/// Run on a fresh multi-thread runtime, blocking the current thread.
pub fn start_blocking(opts: RunOptions, backends: Backends) -> Result<RunReport, EngineError> {
    block_on(run(opts, backends))?
}

/// Drive `future` to completion on a fresh multi-thread runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output, EngineError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    Ok(runtime.block_on(future))
}

pub async fn run(opts: RunOptions, backends: Backends) -> Result<RunReport, EngineError> {
    let plan = plan(&opts)?;
    let store = opts.state_store();
    tracing::info!(
        source = %plan.source,
        items = plan.items.len(),
        parallel = plan.settings.parallel,
        retries = plan.settings.retries,
        timeout_s = plan.settings.timeout,
        run_dir = %store.paths().root().display(),
        "run planned"
    );

    if opts.dry_run {
        let (items, _) = select_items(&plan, &store, opts.resume)?;
        return Ok(RunReport::dry_run(items, Some(store.paths().root().to_path_buf())));
    }

    backends
        .fetcher
        .ready()
        .await
        .map_err(EngineError::Prerequisite)?;
    if let Err(err) = backends.housekeeping.prepare().await {
        tracing::warn!(error = %err, "could not prepare managed volumes");
    }
    let disk: Arc<dyn DiskProbe> = match backends.disk.clone() {
        Some(disk) => disk,
        None => Arc::new(FsDiskProbe::for_data_root(
            backends.housekeeping.data_root().await,
        )),
    };

    store.ensure_dir()?;
    let (items, ledger) = select_items(&plan, &store, opts.resume)?;
    store.save_ledger(&ledger)?;
    let results_log = store.open_results_log(!opts.resume)?;

    let breakers = Arc::new(SharedBreakers::new(
        store.load_breakers(opts.breaker_cooldown)?,
        Some(store.clone()),
    ));
    let queue = Arc::new(WorkQueue::new());
    queue.enqueue_all(items);
    let recorder = Arc::new(RunRecorder::new(ledger, Some(results_log), Some(store.clone())));
    let puller = Arc::new(Puller::new(
        Arc::clone(&backends.fetcher),
        Arc::clone(&breakers),
        PullerConfig {
            timeout: plan.settings.timeout_duration(),
            max_attempts: plan.settings.max_attempts(),
            backoff: Backoff::new(opts.retry_delay),
        },
    ));
    let stop = StopSignal::new();
    let started = Instant::now();

    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let admission_handle = {
        let controller = AdmissionController::new(
            disk,
            Arc::clone(&backends.housekeeping),
            Arc::clone(&queue),
            stop.clone(),
            opts.admission,
        );
        tokio::spawn(controller.run(shutdown_tx.subscribe()))
    };

    let progress_handle = {
        let queue = Arc::clone(&queue);
        let shutdown_rx = shutdown_tx.subscribe();
        let every = opts.progress_interval;
        tokio::spawn(async move {
            progress_task(queue, started, every, shutdown_rx).await;
            Ok::<(), EngineError>(())
        })
    };

    let signal_handle = {
        let stop = stop.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        let events = opts.handle_ctrl_c.then(ctrl_c_events);
        tokio::spawn(async move {
            let Some(events) = events else {
                let _ = shutdown_rx.recv().await;
                return Ok::<(), EngineError>(());
            };
            if watch_interrupts(events, stop, shutdown_rx).await == Interrupts::Forced {
                // The ledger and breakers are saved as outcomes land.
                tracing::warn!("second ctrl-c, quitting without waiting for in-flight pulls");
                std::process::exit(FORCED_EXIT_CODE);
            }
            Ok(())
        })
    };

    let pool_handle = {
        let pool = WorkerPool::new(
            plan.settings.parallel,
            Arc::clone(&queue),
            puller,
            Arc::clone(&recorder),
            stop.clone(),
        );
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = pool.run().await;
            let _ = shutdown.send(());
            result
        })
    };

    let (pool_result, admission_result, progress_result, signal_result) =
        tokio::join!(pool_handle, admission_handle, progress_handle, signal_handle);

    // Persist before surfacing any task failure.
    let stats = queue.snapshot();
    let ledger = recorder.finish();
    store.save_breakers(&breakers.snapshot())?;
    store.save_queue(queue.pending_items())?;

    handle_join("worker_pool", pool_result)?;
    handle_join("admission", admission_result)?;
    handle_join("progress", progress_result)?;
    handle_join("signal_handler", signal_result)?;

    let mut report = RunReport::from_stats(stats, started.elapsed(), recorder.failures());
    report.stopped = stop.reason();
    report.run_dir = Some(store.paths().root().to_path_buf());

    tracing::info!(
        total = report.total,
        succeeded = report.succeeded,
        failed = report.failed,
        remaining = report.remaining,
        completed_overall = ledger.completed.len(),
        duration_s = report.duration.as_secs(),
        "run finished"
    );
    Ok(report)
}

pub(crate) fn handle_join(
    task: &str,
    result: Result<Result<(), EngineError>, tokio::task::JoinError>,
) -> Result<(), EngineError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(EngineError::Join {
            task: task.to_string(),
            message: err.to_string(),
        }),
    }
}
