//! Pull orchestration: work queue, workers, retries, admission control and
//! run reporting.
//!
//! [`run`] executes one bulk pull against any [`Backends`]; the CLI wires in
//! the docker-backed ones with [`Backends::docker`].

pub mod admission;
pub mod backoff;
pub mod breakers;
pub mod classify;
mod error;
pub mod interrupt;
pub mod log_rotation;
pub mod pool;
pub mod progress;
pub mod puller;
pub mod queue;
pub mod recorder;
mod runtime;
pub mod stop;
mod telemetry;

pub use admission::AdmissionConfig;
pub use classify::{classify, FailureClass};
pub use error::EngineError;
pub use progress::{Progress, RunReport};
pub use puller::PullOutcome;
pub use queue::{QueueStats, WorkQueue};
pub use recorder::FailedItem;
pub use runtime::{block_on, plan, run, start_blocking, Backends, RunOptions, RunPlan};
pub use stop::{StopReason, StopSignal};
pub use telemetry::init_tracing;
