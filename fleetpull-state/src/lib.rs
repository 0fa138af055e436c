//! # fleetpull-state
//!
//! Persistence for bulk pull runs: the result ledger, circuit breakers, the
//! pending-queue snapshot and the JSON-lines results log. All JSON documents
//! are written atomically.
//!
//! Use [`StateStore`] to address one run directory.

mod atomic;
pub mod breaker;
pub mod error;
pub mod ledger;
pub mod paths;
pub mod queue_file;
pub mod results_log;
pub mod store;

pub use breaker::{CircuitBreaker, DEFAULT_COOLDOWN};
pub use error::StateError;
pub use ledger::ResultLedger;
pub use queue_file::QueueSnapshot;
pub use results_log::{RecordStatus, ResultRecord, ResultsLog};
pub use store::StateStore;
