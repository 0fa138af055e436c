//! Parsing for `docker system df --format '{{json .}}'`.
//!
//! Docker prints one JSON object per line, with sizes as human strings in
//! decimal units: `{"Type":"Local Volumes","Size":"2.4GB","Reclaimable":"1.2GB (50%)",...}`.

use serde::Deserialize;

use crate::error::DockerError;

pub const LOCAL_VOLUMES: &str = "Local Volumes";

/// One row of `docker system df`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DfRow {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "TotalCount", default)]
    pub total_count: String,
    #[serde(rename = "Active", default)]
    pub active: String,
    #[serde(rename = "Size", default)]
    pub size: String,
    #[serde(rename = "Reclaimable", default)]
    pub reclaimable: String,
}

impl DfRow {
    pub fn reclaimable_bytes(&self) -> Result<u64, DockerError> {
        parse_size(&self.reclaimable)
    }
}

pub fn parse_df(output: &str) -> Result<Vec<DfRow>, DockerError> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str::<DfRow>(line)
                .map_err(|e| DockerError::Parse(format!("system df line {line:?}: {e}")))
        })
        .collect()
}

/// Reclaimable bytes of the `Local Volumes` row, `0` when the row is absent.
pub fn reclaimable_volume_bytes(rows: &[DfRow]) -> Result<u64, DockerError> {
    match rows.iter().find(|row| row.kind == LOCAL_VOLUMES) {
        Some(row) => row.reclaimable_bytes(),
        None => Ok(0),
    }
}

/// Parse a docker size like `1.2GB`, `512kB`, `0B` or `1.2GB (50%)`.
pub fn parse_size(text: &str) -> Result<u64, DockerError> {
    let token = text.split_whitespace().next().unwrap_or("");
    if token.is_empty() {
        return Ok(0);
    }
    let split = token
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(token.len());
    let (number, unit) = token.split_at(split);
    let value: f64 = number
        .parse()
        .map_err(|_| DockerError::Parse(format!("size {text:?}")))?;
    let multiplier: f64 = match unit.to_ascii_uppercase().as_str() {
        "" | "B" => 1.0,
        "KB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        "PB" => 1e15,
        _ => return Err(DockerError::Parse(format!("size unit {unit:?} in {text:?}"))),
    };
    Ok((value * multiplier).round() as u64)
}
