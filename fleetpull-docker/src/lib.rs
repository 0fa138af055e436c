//! Container-engine access for `fleetpull`.
//!
//! Everything that touches the host engine or the host filesystem's free
//! space lives here, behind two traits the orchestrator is written against:
//!
//! - [`ImageFetcher`]: the opaque pull primitive
//! - [`Housekeeping`]: prune operations and reclaimable-space probe
//!
//! [`DockerCli`] implements both by shelling out to `docker`.

pub mod cli;
pub mod df;
pub mod disk;
pub mod error;
pub mod fetcher;
pub mod volumes;

pub use cli::DockerCli;
pub use disk::{probe_path, DiskProbe, DiskSample, FsDiskProbe};
pub use error::{DockerError, FetchError};
pub use fetcher::{CleanupStep, Housekeeping, ImageFetcher};
pub use volumes::VolumeStatus;
