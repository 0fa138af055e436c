//! Free-space sampling for the artifact-store volume.

use std::path::{Path, PathBuf};

use crate::error::DockerError;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// One reading of a filesystem's capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSample {
    pub available_bytes: u64,
    pub total_bytes: u64,
}

impl DiskSample {
    pub fn available_gb(&self) -> f64 {
        self.available_bytes as f64 / BYTES_PER_GB
    }

    /// Used share of the volume in percent; `0.0` for an empty total.
    pub fn usage_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let used = self.total_bytes.saturating_sub(self.available_bytes);
        used as f64 * 100.0 / self.total_bytes as f64
    }
}

/// Something that can report free space. Sync: a statvfs is not worth a task.
pub trait DiskProbe: Send + Sync {
    fn sample(&self) -> Result<DiskSample, DockerError>;
}

/// [`DiskProbe`] over a real path, via `fs2`.
#[derive(Debug, Clone)]
pub struct FsDiskProbe {
    path: PathBuf,
}

impl FsDiskProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Probe the engine's data root when it exists on this host, else `/`.
    ///
    /// A remote or VM-backed engine reports a root that is not a local path.
    pub fn for_data_root(data_root: Option<PathBuf>) -> Self {
        Self::new(probe_path(data_root))
    }
}

/// The engine's data root if it exists on this host, else the filesystem root.
pub fn probe_path(data_root: Option<PathBuf>) -> PathBuf {
    data_root
        .filter(|dir| dir.exists())
        .unwrap_or_else(|| PathBuf::from("/"))
}

impl DiskProbe for FsDiskProbe {
    fn sample(&self) -> Result<DiskSample, DockerError> {
        let disk_err = |source| DockerError::Disk {
            path: self.path.clone(),
            source,
        };
        let available_bytes = fs2::available_space(&self.path).map_err(disk_err)?;
        let total_bytes = fs2::total_space(&self.path).map_err(disk_err)?;
        Ok(DiskSample {
            available_bytes,
            total_bytes,
        })
    }
}
