//! Append-only JSON-lines log of terminal outcomes.
//!
//! One line per item that reached a terminal state. The file is opened in
//! append mode and every write is a single `write_all` of a full line under
//! a mutex, so concurrent workers never interleave records.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fleetpull_core::ItemId;

use crate::error::{io_err, StateError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Succeeded,
    Failed,
}

/// One line of `results.log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub at: DateTime<Utc>,
    pub item: ItemId,
    pub status: RecordStatus,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ResultRecord {
    pub fn succeeded(item: &ItemId, attempts: u32) -> Self {
        Self {
            at: Utc::now(),
            item: item.clone(),
            status: RecordStatus::Succeeded,
            attempts,
            class: None,
            message: None,
        }
    }

    pub fn failed(item: &ItemId, attempts: u32, class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            item: item.clone(),
            status: RecordStatus::Failed,
            attempts,
            class: Some(class.into()),
            message: Some(message.into()),
        }
    }
}

#[derive(Debug)]
pub struct ResultsLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl ResultsLog {
    /// Open for appending, creating parent directories. `truncate` starts a fresh log.
    pub fn open(path: &Path, truncate: bool) -> Result<Self, StateError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        if truncate && path.exists() {
            std::fs::remove_file(path).map_err(|e| io_err(path, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| io_err(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &ResultRecord) -> Result<(), StateError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = self.file.lock().unwrap_or_else(|p| p.into_inner());
        file.write_all(line.as_bytes())
            .map_err(|e| io_err(&self.path, e))
    }
}

/// Read every record; unparseable lines are skipped with a warning.
pub fn read_records(path: &Path) -> Result<Vec<ResultRecord>, StateError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut out = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| io_err(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => out.push(record),
            Err(e) => tracing::warn!(path = %path.display(), line = n + 1, "skipping bad results line: {e}"),
        }
    }
    Ok(out)
}
