// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! low-tide-watcher: per-job recursive output-directory watcher.
//!
//! Generalizes the single-file `notify` watch this pack's CLI uses to tail
//! a log (`recommended_watcher` + an mpsc signal channel) into a recursive
//! directory watch that stats and UPSERTs every created/modified file into
//! the Store, debounced so rapid appends don't thrash it. Failures here are
//! logged, never propagated — the filesystem is authoritative, the Store a
//! cache of it, per the job's terminal-time reconciliation guarantee.

mod error;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use low_tide_core::{now_unix, JobId};
use low_tide_store::Store;
use notify::{Event as NotifyEvent, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub use error::WatcherError;

/// Coalescing window: rapid writes to the same path are collapsed into one
/// stat+UPSERT.
pub const DEBOUNCE: Duration = Duration::from_millis(200);

/// A live per-job filesystem watch. Call `stop` to halt it and run the
/// final reconciliation pass.
pub struct FsWatcher {
    cancel: CancellationToken,
    join: tokio::task::JoinHandle<()>,
    _watcher: notify::RecommendedWatcher,
}

impl FsWatcher {
    /// Begin observing `out_dir` for the given job. `store` receives the
    /// UPSERTs; `on_change` is called (off the watcher's own task) after
    /// each one, so the caller can publish a fresh snapshot.
    pub fn start(
        job_id: JobId,
        out_dir: PathBuf,
        store: Arc<Store>,
        on_change: Arc<dyn Fn() + Send + Sync>,
    ) -> Result<Self, WatcherError> {
        let (tx, rx) = mpsc::channel(256);
        let mut watcher = notify::recommended_watcher(move |res: Result<NotifyEvent, _>| {
            if let Ok(event) = res {
                if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    for path in event.paths {
                        let _ = tx.blocking_send(path);
                    }
                }
            }
        })
        .map_err(|source| WatcherError::Start { path: out_dir.display().to_string(), source })?;

        watcher
            .watch(&out_dir, RecursiveMode::Recursive)
            .map_err(|source| WatcherError::Start { path: out_dir.display().to_string(), source })?;

        let cancel = CancellationToken::new();
        let join = tokio::spawn(run(job_id, out_dir, store, on_change, rx, cancel.clone()));

        Ok(Self { cancel, join, _watcher: watcher })
    }

    /// Stop observing and block until the final reconciliation pass (a
    /// full walk of the output directory) completes.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.join.await;
    }
}

async fn run(
    job_id: JobId,
    out_dir: PathBuf,
    store: Arc<Store>,
    on_change: Arc<dyn Fn() + Send + Sync>,
    mut events: mpsc::Receiver<PathBuf>,
    cancel: CancellationToken,
) {
    let mut pending: HashMap<PathBuf, Instant> = HashMap::new();
    let mut tick = tokio::time::interval(DEBOUNCE);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            Some(path) = events.recv() => {
                pending.insert(path, Instant::now());
            }
            _ = tick.tick() => {
                drain_due(&mut pending, Instant::now(), &out_dir, &store, job_id, &on_change).await;
            }
        }
    }

    drain_due(&mut pending, Instant::now() + DEBOUNCE, &out_dir, &store, job_id, &on_change).await;
    reconcile(&out_dir, &store, job_id, &on_change).await;
}

async fn drain_due(
    pending: &mut HashMap<PathBuf, Instant>,
    now: Instant,
    out_dir: &Path,
    store: &Arc<Store>,
    job_id: JobId,
    on_change: &Arc<dyn Fn() + Send + Sync>,
) {
    let due: Vec<PathBuf> = pending
        .iter()
        .filter(|(_, seen)| now.duration_since(**seen) >= DEBOUNCE)
        .map(|(path, _)| path.clone())
        .collect();
    for path in due {
        pending.remove(&path);
        if upsert_if_regular(out_dir, &path, store, job_id).await {
            on_change();
        }
    }
}

async fn reconcile(out_dir: &Path, store: &Arc<Store>, job_id: JobId, on_change: &Arc<dyn Fn() + Send + Sync>) {
    let mut changed = false;
    for entry in walkdir::WalkDir::new(out_dir).into_iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(source) => {
                warn!(%job_id, %source, "reconciliation walk skipped an entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if upsert_if_regular(out_dir, entry.path(), store, job_id).await {
            changed = true;
        }
    }
    if changed {
        on_change();
    }
}

/// Stat `path` and UPSERT it if it's a regular, readable file. Returns
/// whether a row was written. The UPSERT itself runs on the blocking thread
/// pool, matching the async-path rule that every synchronous `Store` call
/// is dispatched via `tokio::task::spawn_blocking`.
async fn upsert_if_regular(out_dir: &Path, path: &Path, store: &Arc<Store>, job_id: JobId) -> bool {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(source) => {
            warn!(%job_id, path = %path.display(), %source, "skipping inaccessible path");
            return false;
        }
    };
    if !metadata.is_file() {
        return false;
    }
    let Some(relative) = relative_forward_slash(out_dir, path) else {
        return false;
    };
    let store = store.clone();
    let relative_for_blocking = relative.clone();
    let result =
        tokio::task::spawn_blocking(move || store.upsert_job_file(job_id, &relative_for_blocking, metadata.len(), now_unix()))
            .await;
    match result {
        Ok(Ok(_)) => true,
        Ok(Err(source)) => {
            warn!(%job_id, path = %relative, %source, "failed to record job file");
            false
        }
        Err(source) => {
            warn!(%job_id, path = %relative, %source, "upsert task panicked");
            false
        }
    }
}

fn relative_forward_slash(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }
    Some(parts.join("/"))
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
