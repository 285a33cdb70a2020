//! ui::profile
//!
//! Per-invocation profile records.
//!
//! # Design
//!
//! When profiling is on, a [`ProfileGuard`] lives for the whole invocation.
//! On drop, including on error paths, it writes
//! `<data_path>/profile_<owner>_<unix_ts>_<id>.json` with the elapsed wall-clock
//! time and the peak resident set size. It shares nothing with the
//! authorization path.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::engine::ServError;

/// Contents of a profile file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// Invocation id, as in the `serv` log span
    pub id: Uuid,
    pub owner: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Peak RSS in KiB, where the platform reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_rss_kb: Option<u64>,
}

/// Writes a profile record when dropped.
#[derive(Debug)]
pub struct ProfileGuard {
    path: PathBuf,
    id: Uuid,
    owner: String,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl ProfileGuard {
    /// Start profiling invocation `id` on behalf of `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`ServError::Io`] if the data directory cannot be created.
    pub fn start(data_path: &Path, owner: &str, id: Uuid) -> Result<Self, ServError> {
        fs::create_dir_all(data_path).map_err(|e| {
            ServError::Io(format!(
                "failed to create profile directory {}: {}",
                data_path.display(),
                e
            ))
        })?;

        let started_at = Utc::now();
        let path = data_path.join(format!(
            "profile_{}_{}_{}.json",
            owner,
            started_at.timestamp(),
            id.simple()
        ));

        Ok(Self {
            path,
            id,
            owner: owner.to_string(),
            started_at,
            started: Instant::now(),
        })
    }

    /// File the record will be written to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record(&self) -> ProfileRecord {
        ProfileRecord {
            id: self.id,
            owner: self.owner.clone(),
            started_at: self.started_at,
            elapsed_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            peak_rss_kb: peak_rss_kb(),
        }
    }
}

impl Drop for ProfileGuard {
    fn drop(&mut self) {
        let result = serde_json::to_vec_pretty(&self.record())
            .map_err(std::io::Error::from)
            .and_then(|json| fs::write(&self.path, json));
        if let Err(e) = result {
            warn!(path = %self.path.display(), "failed to write profile: {}", e);
        }
    }
}

/// Peak RSS from `/proc/self/status` (`VmHWM`).
fn peak_rss_kb() -> Option<u64> {
    let status = fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_hwm(&status)
}

fn parse_vm_hwm(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmHWM:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}
