// SPDX-License-Identifier: MIT

//! Downloader app configuration (templated command line).
//!
//! Loading and validating a list of these from YAML is `low-tide-config`'s
//! job; this crate only defines the shape every other crate agrees on.

use serde::{Deserialize, Serialize};

/// A named downloader program configuration.
///
/// `cmd` is a template argument vector: each element may contain the
/// placeholders `{url}` and `{outdir}`, substituted verbatim (no shell
/// interpretation) before spawning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub id: String,
    pub name: String,
    /// URL-matching regex used to resolve `app_id = "auto"`. `None` means
    /// this app is never auto-selected.
    #[serde(rename = "match", default)]
    pub match_pattern: Option<String>,
    pub cmd: Vec<String>,
}

impl AppConfig {
    /// Substitute `{url}` and `{outdir}` into this app's command template.
    pub fn render_argv(&self, url: &str, outdir: &str) -> Vec<String> {
        self.cmd
            .iter()
            .map(|arg| arg.replace("{url}", url).replace("{outdir}", outdir))
            .collect()
    }
}
