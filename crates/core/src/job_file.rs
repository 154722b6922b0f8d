// SPDX-License-Identifier: MIT

//! Artifacts attributed to a job by the FS Watcher.

use serde::{Deserialize, Serialize};

use crate::job::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobFileId(pub i64);

/// A file produced into a job's output directory, tracked by the Store.
///
/// `path` is relative to the job's output directory and always uses forward
/// slashes, regardless of host OS. `(job_id, path)` is unique — inserts are
/// UPSERTs that refresh `size_bytes` and `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFile {
    pub id: JobFileId,
    pub job_id: JobId,
    pub path: String,
    pub size_bytes: u64,
    pub created_at: i64,
}
