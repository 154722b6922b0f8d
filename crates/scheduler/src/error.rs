// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] low_tide_store::StoreError),
    #[error(transparent)]
    Watcher(#[from] low_tide_watcher::WatcherError),
    #[error("failed to create output directory {path}: {source}")]
    CreateOutputDir { path: String, source: std::io::Error },
    #[error(transparent)]
    Config(#[from] low_tide_config::ConfigError),
}
