// SPDX-License-Identifier: MIT

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("app '{app_id}' has an empty cmd template")]
    EmptyCommand { app_id: String },

    #[error("app '{app_id}' has an invalid match pattern: {source}")]
    BadPattern { app_id: String, source: regex::Error },

    #[error("unknown app id '{app_id}'")]
    UnknownApp { app_id: String },

    #[error("no configured app matches url '{url}'")]
    NoAutoMatch { url: String },
}
