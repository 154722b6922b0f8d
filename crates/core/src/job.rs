// SPDX-License-Identifier: MIT

//! Job identifier, status, and record.

use serde::{Deserialize, Serialize};

use crate::job_file::JobFile;

/// Unique, monotonically increasing identifier assigned by the Store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a job.
///
/// Transitions: `Queued -> Running -> {Success, Failed, Cancelled}`, and any
/// terminal status `-> Cleaned` via the cleanup operation. `Cleaned` may
/// re-enter `Queued` via retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Success,
    Failed,
    Cancelled,
    Cleaned,
}

crate::simple_display! {
    JobStatus {
        Queued => "queued",
        Running => "running",
        Success => "success",
        Failed => "failed",
        Cancelled => "cancelled",
        Cleaned => "cleaned",
    }
}

impl JobStatus {
    /// Whether this status is terminal (no Runner/FS Watcher activity follows).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failed | JobStatus::Cancelled | JobStatus::Cleaned
        )
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "success" => Ok(JobStatus::Success),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            "cleaned" => Ok(JobStatus::Cleaned),
            other => Err(format!("unknown job status in db: {other}")),
        }
    }
}

/// A single URL + downloader invocation, with its lifecycle and artifacts.
///
/// `logs` is authoritative only after a terminal transition; while `running`
/// it is empty here — live truth is the Broker's `job_log` stream plus the
/// Runner's in-memory buffer (see `low-tide-runner`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub app_id: String,
    pub url: String,
    pub original_url: String,
    pub title: String,
    pub image_path: Option<String>,
    pub status: JobStatus,
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub archived: bool,
    /// Full captured stdout+stderr. Empty unless `status` is terminal.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub logs: String,
    /// Populated by the Store's `get_job_with_files`; empty on list responses.
    #[serde(default)]
    pub files: Vec<JobFile>,
}

impl Job {
    /// Derive a default title (`host+path`) for a newly queued job.
    pub fn default_title(url: &str) -> String {
        match url::Url::parse(url) {
            Ok(parsed) => {
                let host = parsed.host_str().unwrap_or(url);
                let path = parsed.path();
                if path.is_empty() || path == "/" {
                    host.to_string()
                } else {
                    format!("{host}{path}")
                }
            }
            Err(_) => url.to_string(),
        }
    }

    /// Whether this title still looks like a `default_title` derivation,
    /// i.e. it hasn't been enriched by the post-completion hook yet.
    pub fn has_derived_title(&self) -> bool {
        self.title == Self::default_title(&self.url)
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
