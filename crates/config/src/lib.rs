// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! YAML configuration loader: app definitions + directories.
//!
//! Loads a `Config` value once at startup and validates it structurally
//! (every `match` pattern compiles, every `cmd` is non-empty) so bad config
//! fails fast with a message instead of surfacing as a confusing 400 at
//! request time.

mod error;

use std::path::{Path, PathBuf};

use low_tide_core::AppConfig;
use regex::Regex;
use serde::Deserialize;

pub use error::ConfigError;

/// Raw on-disk shape of the config file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    apps: Vec<AppConfig>,
    /// Root directory under which `jobs/{job_id}/` and `thumbnails/` live.
    data_root: PathBuf,
    /// Optional override for the SQLite database path.
    /// Defaults to `{data_root}/low-tide.db`.
    #[serde(default)]
    database_path: Option<PathBuf>,
}

/// A resolved, validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub apps: Vec<AppConfig>,
    pub data_root: PathBuf,
    pub database_path: PathBuf,
}

impl Config {
    /// Load and validate a config file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|source| ConfigError::Read { path: path.as_ref().to_path_buf(), source })?;
        Self::parse(&text)
    }

    /// Parse and validate config from an in-memory YAML string.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(text)?;
        for app in &raw.apps {
            if app.cmd.is_empty() {
                return Err(ConfigError::EmptyCommand { app_id: app.id.clone() });
            }
            if let Some(pattern) = &app.match_pattern {
                Regex::new(pattern)
                    .map_err(|source| ConfigError::BadPattern { app_id: app.id.clone(), source })?;
            }
        }
        let database_path =
            raw.database_path.unwrap_or_else(|| raw.data_root.join("low-tide.db"));
        Ok(Config { apps: raw.apps, data_root: raw.data_root, database_path })
    }

    /// Resolve an `app_id` (or `"auto"`) against a URL.
    ///
    /// `"auto"` picks the first app whose `match` regex matches `url`; if
    /// none matches, returns `ConfigError::NoAutoMatch`.
    pub fn resolve_app(&self, app_id: &str, url: &str) -> Result<&AppConfig, ConfigError> {
        if app_id == "auto" {
            return self
                .apps
                .iter()
                .find(|app| {
                    app.match_pattern
                        .as_deref()
                        .map(|pattern| Regex::new(pattern).is_ok_and(|re| re.is_match(url)))
                        .unwrap_or(false)
                })
                .ok_or_else(|| ConfigError::NoAutoMatch { url: url.to_string() });
        }
        self.apps
            .iter()
            .find(|app| app.id == app_id)
            .ok_or_else(|| ConfigError::UnknownApp { app_id: app_id.to_string() })
    }

    /// Output directory for a given job id: `{data_root}/jobs/{job_id}/`.
    pub fn job_output_dir(&self, job_id: i64) -> PathBuf {
        self.data_root.join("jobs").join(job_id.to_string())
    }

    /// Thumbnails directory: `{data_root}/thumbnails/`.
    pub fn thumbnails_dir(&self) -> PathBuf {
        self.data_root.join("thumbnails")
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
