// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("failed to start filesystem watch on {path}: {source}")]
    Start { path: String, source: notify::Error },
}
