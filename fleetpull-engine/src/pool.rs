//! Worker pool: N workers draining one shared queue.

use std::sync::Arc;

use crate::error::EngineError;
use crate::puller::Puller;
use crate::queue::WorkQueue;
use crate::recorder::RunRecorder;
use crate::stop::StopSignal;

pub struct WorkerPool {
    parallel: usize,
    queue: Arc<WorkQueue>,
    puller: Arc<Puller>,
    recorder: Arc<RunRecorder>,
    stop: StopSignal,
}

impl WorkerPool {
    pub fn new(
        parallel: usize,
        queue: Arc<WorkQueue>,
        puller: Arc<Puller>,
        recorder: Arc<RunRecorder>,
        stop: StopSignal,
    ) -> Self {
        Self {
            parallel: parallel.max(1),
            queue,
            puller,
            recorder,
            stop,
        }
    }

    /// Run until every worker has exited: queue empty or stop signal set.
    pub async fn run(self) -> Result<(), EngineError> {
        let handles: Vec<_> = (0..self.parallel)
            .map(|worker| {
                let queue = Arc::clone(&self.queue);
                let puller = Arc::clone(&self.puller);
                let recorder = Arc::clone(&self.recorder);
                let stop = self.stop.clone();
                tokio::spawn(async move { worker_loop(worker, queue, puller, recorder, stop).await })
            })
            .collect();

        let mut first_err = None;
        for (worker, handle) in handles.into_iter().enumerate() {
            if let Err(err) = crate::runtime::handle_join(&format!("worker-{worker}"), handle.await) {
                tracing::error!(error = %err, "worker crashed");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

async fn worker_loop(
    worker: usize,
    queue: Arc<WorkQueue>,
    puller: Arc<Puller>,
    recorder: Arc<RunRecorder>,
    stop: StopSignal,
) -> Result<(), EngineError> {
    let mut handled = 0usize;
    loop {
        if let Some(reason) = stop.reason() {
            tracing::info!(worker, reason = %reason, "stop signal set, worker exiting");
            break;
        }
        let Some(item) = queue.try_dequeue() else {
            break;
        };
        let outcome = puller.pull(&item).await;
        queue.complete(&item.id, outcome.is_success());
        recorder.record(&item, &outcome);
        handled += 1;
    }
    tracing::debug!(worker, handled, "worker done");
    Ok(())
}
