//! In-memory backends for driving full runs without a container engine.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fleetpull_core::ItemId;
use fleetpull_docker::{
    CleanupStep, DiskProbe, DiskSample, DockerError, FetchError, Housekeeping, ImageFetcher,
};
use fleetpull_engine::{AdmissionConfig, Backends, RunOptions};

pub const GB: u64 = 1024 * 1024 * 1024;

/// Per-repository scripted results; anything unscripted succeeds.
#[derive(Default)]
pub struct FakeFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Result<(), FetchError>>>>,
    always: Mutex<HashMap<String, FetchError>>,
    calls: Mutex<HashMap<String, u32>>,
    delay: Duration,
    unavailable: bool,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Results for the next calls on `repo`, in order.
    pub fn script(self, repo: &str, results: Vec<Result<(), FetchError>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(repo.to_string(), results.into());
        self
    }

    pub fn always_fail(self, repo: &str, err: FetchError) -> Self {
        self.always.lock().unwrap().insert(repo.to_string(), err);
        self
    }

    pub fn calls(&self, repo: &str) -> u32 {
        self.calls.lock().unwrap().get(repo).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn ready(&self) -> Result<(), DockerError> {
        if self.unavailable {
            return Err(DockerError::NotInstalled);
        }
        Ok(())
    }

    async fn pull(&self, id: &ItemId) -> Result<(), FetchError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(id.repository.clone())
            .or_default() += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&id.repository)
            .and_then(VecDeque::pop_front);
        if let Some(result) = scripted {
            return result;
        }
        match self.always.lock().unwrap().get(&id.repository) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Replays available-GB readings; the last one repeats forever.
pub struct ScriptedDisk {
    readings: Mutex<VecDeque<u64>>,
    last: Mutex<u64>,
    total_gb: u64,
}

impl ScriptedDisk {
    pub fn new(readings: &[u64], total_gb: u64) -> Self {
        Self {
            readings: Mutex::new(readings.iter().copied().collect()),
            last: Mutex::new(readings.last().copied().unwrap_or(total_gb)),
            total_gb,
        }
    }

    pub fn plenty() -> Self {
        Self::new(&[500], 1000)
    }
}

impl DiskProbe for ScriptedDisk {
    fn sample(&self) -> Result<DiskSample, DockerError> {
        let available = self
            .readings
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(*self.last.lock().unwrap());
        Ok(DiskSample {
            available_bytes: available * GB,
            total_bytes: self.total_gb * GB,
        })
    }
}

#[derive(Default)]
pub struct FakeHousekeeping {
    pub actions: Mutex<Vec<String>>,
}

impl FakeHousekeeping {
    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Housekeeping for FakeHousekeeping {
    async fn prepare(&self) -> Result<(), DockerError> {
        self.actions.lock().unwrap().push("prepare".into());
        Ok(())
    }

    async fn reclaimable_volume_bytes(&self) -> Result<u64, DockerError> {
        Ok(0)
    }

    async fn soft_prune(&self) -> Vec<CleanupStep> {
        self.actions.lock().unwrap().push("soft_prune".into());
        Vec::new()
    }

    async fn aggressive_prune(&self, _include_volumes: bool) -> Vec<CleanupStep> {
        self.actions.lock().unwrap().push("aggressive_prune".into());
        Vec::new()
    }

    async fn prune_volumes(&self) -> Vec<CleanupStep> {
        Vec::new()
    }
}

pub fn backends(
    fetcher: &Arc<FakeFetcher>,
    housekeeping: &Arc<FakeHousekeeping>,
    disk: ScriptedDisk,
) -> Backends {
    Backends {
        fetcher: fetcher.clone(),
        housekeeping: housekeeping.clone(),
        disk: Some(Arc::new(disk)),
    }
}

/// A manifest with one category holding `names`, all tagged `1`.
pub fn write_manifest(dir: &Path, names: &[&str]) -> PathBuf {
    let mut body = String::from("categories:\n  main:\n    images:\n");
    for name in names {
        body.push_str(&format!("      - {{ name: {name}, tag: '1' }}\n"));
    }
    let path = dir.join("images.yaml");
    std::fs::write(&path, body).unwrap();
    path
}

/// Options suited to paused-clock tests: no ctrl-c handler, short backoff.
pub fn options(manifest: &Path, home: &Path, parallel: usize, retries: u32) -> RunOptions {
    let mut opts = RunOptions::new(manifest, home);
    opts.overrides.parallel = Some(parallel);
    opts.overrides.retries = Some(retries);
    opts.retry_delay = Duration::from_millis(100);
    opts.handle_ctrl_c = false;
    opts.admission = AdmissionConfig::default();
    opts
}
