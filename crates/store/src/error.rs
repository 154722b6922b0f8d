// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database at {path}: {source}")]
    Open { path: String, source: rusqlite::Error },
    #[error("failed to create data directory {path}: {source}")]
    CreateDir { path: String, source: std::io::Error },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("job {0} not found")]
    JobNotFound(low_tide_core::JobId),
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}
