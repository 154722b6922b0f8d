// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! low-tide-scheduler: the singleton serializer.
//!
//! Owns the "at most one running job" invariant as a single long-lived task
//! with its own state machine (`Idle -> Picking -> Running -> Finalizing ->
//! Picking`). HTTP handlers never touch this state directly — they signal
//! it over the `wake`/`cancel` channels exposed by `SchedulerHandle`, the
//! same shape this pack's daemon runtime takes for its own `Event` channel
//! forwarded into an internal loop.

mod error;
mod hook;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use low_tide_broker::Broker;
use low_tide_config::Config;
use low_tide_core::{now_unix, JobId, JobStatus};
use low_tide_runner::{RunSpec, RunnerEvent, TerminationReason};
use low_tide_store::Store;
use low_tide_watcher::FsWatcher;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use error::SchedulerError;

/// Periodic backstop: in case a `wake` signal is ever lost, the loop still
/// re-checks the queue at this interval.
const TICK: Duration = Duration::from_secs(5);

/// A handle HTTP callers use to nudge the Scheduler. Cheap to clone.
#[derive(Clone)]
pub struct SchedulerHandle {
    wake_tx: mpsc::Sender<()>,
    cancel_tx: mpsc::Sender<JobId>,
}

impl SchedulerHandle {
    /// Signal that the queue may have new work. Never blocks the caller
    /// beyond the channel's small buffer; a full buffer means a wake is
    /// already pending, which is exactly as good.
    pub fn wake(&self) {
        let _ = self.wake_tx.try_send(());
    }

    /// Cancel `job_id` if and only if it is the job currently running.
    /// No-op otherwise, including for queued or already-terminal jobs.
    pub async fn cancel(&self, job_id: JobId) {
        let _ = self.cancel_tx.send(job_id).await;
    }
}

/// Spawn the Scheduler's long-lived task and return a handle to signal it.
///
/// Startup recovery (rewriting stray `running` rows) has already happened
/// inside `Store::open` by the time this is called.
pub fn spawn(config: Arc<Config>, store: Arc<Store>, broker: Broker) -> SchedulerHandle {
    let (wake_tx, wake_rx) = mpsc::channel(1);
    let (cancel_tx, cancel_rx) = mpsc::channel(8);
    let handle = SchedulerHandle { wake_tx, cancel_tx };
    tokio::spawn(run(config, store, broker, wake_rx, cancel_rx));
    handle
}

async fn run(
    config: Arc<Config>,
    store: Arc<Store>,
    broker: Broker,
    mut wake_rx: mpsc::Receiver<()>,
    mut cancel_rx: mpsc::Receiver<JobId>,
) {
    let mut tick = tokio::time::interval(TICK);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = wake_rx.recv() => {}
            _ = tick.tick() => {}
            Some(job_id) = cancel_rx.recv() => {
                info!(%job_id, "cancel requested for non-running job, ignoring");
                continue;
            }
        }

        while let Some(job_id) = pick_next(&store) {
            let cancel = CancellationToken::new();
            // `cancel_rx` must stay polled for the whole run, not just
            // between picks — a cancel arriving mid-run has to reach the
            // token before `run_one` returns, or it's silently absorbed by
            // the outer select's "ignoring" branch above.
            let mut run_fut = Box::pin(run_one(&config, &store, &broker, job_id, cancel.clone()));
            let result = loop {
                tokio::select! {
                    result = &mut run_fut => break result,
                    Some(cancel_id) = cancel_rx.recv() => {
                        if cancel_id == job_id {
                            info!(%job_id, "cancel requested for running job");
                            cancel.cancel();
                        } else {
                            info!(job_id = %cancel_id, "cancel requested for non-running job, ignoring");
                        }
                    }
                }
            };

            if let Err(source) = result {
                warn!(%job_id, %source, "scheduler failed to run job, marking failed");
                let error_message = source.to_string();
                let _ = blocking(&store, move |store| {
                    store.mark_terminal(job_id, JobStatus::Failed, None, Some(&error_message), "", now_unix())
                })
                .await;
                publish_snapshot(store.clone(), broker.clone(), job_id).await;
            }
        }
    }
}

fn pick_next(store: &Store) -> Option<JobId> {
    match store.next_queued_job_id() {
        Ok(id) => id,
        Err(source) => {
            warn!(%source, "failed to query next queued job");
            None
        }
    }
}

/// Drive one job through `Running` then `Finalizing`.
async fn run_one(
    config: &Config,
    store: &Arc<Store>,
    broker: &Broker,
    job_id: JobId,
    cancel: CancellationToken,
) -> Result<(), SchedulerError> {
    let job = blocking(store, move |store| store.get_job(job_id))
        .await?
        .ok_or(low_tide_store::StoreError::JobNotFound(job_id))?;
    let app = config.resolve_app(&job.app_id, &job.url)?;
    let out_dir = config.job_output_dir(job_id.0);
    std::fs::create_dir_all(&out_dir)
        .map_err(|source| SchedulerError::CreateOutputDir { path: out_dir.display().to_string(), source })?;

    let argv = app.render_argv(&job.url, &out_dir.display().to_string());
    let spec = RunSpec { job_id, program: argv[0].clone(), args: argv[1..].to_vec(), working_dir: out_dir.clone() };

    let store_for_watch = store.clone();
    let broker_for_watch = broker.clone();
    let watcher = FsWatcher::start(
        job_id,
        out_dir.clone(),
        store_for_watch.clone(),
        Arc::new(move || {
            tokio::spawn(publish_snapshot(store_for_watch.clone(), broker_for_watch.clone(), job_id));
        }),
    )?;

    // `on_event` is a synchronous callback invoked inline by `Runner::run`,
    // so the `Pid` branch's Store write can't dispatch a blocking task and
    // await it in place. Events are forwarded over an unbounded channel to
    // `event_task` instead, which processes them one at a time in arrival
    // order — preserving the "running" snapshot publishing before any
    // `Line` event is handled, since `Runner::run` never emits a `Pid`
    // after the first `Line`.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RunnerEvent>();
    let store_ev = store.clone();
    let broker_ev = broker.clone();
    let event_task = tokio::spawn(async move {
        let mut seq: u64 = 0;
        let mut reported_running = false;
        while let Some(event) = event_rx.recv().await {
            match event {
                RunnerEvent::Pid(pid) => {
                    reported_running = true;
                    match blocking(&store_ev, move |s| s.mark_running(job_id, pid, now_unix())).await {
                        Ok(()) => publish_snapshot(store_ev.clone(), broker_ev.clone(), job_id).await,
                        Err(source) => warn!(%job_id, %source, "failed to persist running transition"),
                    }
                }
                RunnerEvent::Line(line) => {
                    seq += 1;
                    broker_ev.publish_log_line(job_id, seq, line);
                }
            }
        }
        reported_running
    });

    let outcome = low_tide_runner::Runner::run(&spec, cancel, |event| {
        let _ = event_tx.send(event);
    })
    .await;

    drop(event_tx);
    let reported_running = event_task.await.unwrap_or(false);

    watcher.stop().await;

    let (status, error_message) = classify(&outcome);
    let exit_code = outcome.exit_code;
    let log = outcome.log.clone();
    blocking(store, move |s| s.mark_terminal(job_id, status, exit_code, error_message.as_deref(), &log, now_unix())).await?;
    publish_snapshot(store.clone(), broker.clone(), job_id).await;

    if status == JobStatus::Success {
        spawn_hook(job_id, job.url.clone(), config.thumbnails_dir(), store.clone(), broker.clone());
    }

    info!(%job_id, status = %status, reported_running, "job finished");
    Ok(())
}

/// Classify a `RunOutcome` into a terminal status + error message per the
/// termination-reason/exit-code table.
fn classify(outcome: &low_tide_runner::RunOutcome) -> (JobStatus, Option<String>) {
    match outcome.termination_reason {
        TerminationReason::Normal => match outcome.exit_code {
            Some(0) => (JobStatus::Success, None),
            Some(code) => (JobStatus::Failed, Some(format!("exit code {code}"))),
            None => (JobStatus::Failed, outcome.error_message.clone().or(Some("exit code unknown".to_string()))),
        },
        TerminationReason::Cancelled => (JobStatus::Cancelled, None),
        TerminationReason::SpawnFailed => (JobStatus::Failed, outcome.error_message.clone()),
    }
}

async fn publish_snapshot(store: Arc<Store>, broker: Broker, job_id: JobId) {
    match blocking(&store, move |store| store.get_job(job_id)).await {
        Ok(Some(job)) => broker.publish_snapshot(job),
        Ok(None) => {}
        Err(source) => warn!(%job_id, %source, "failed to reload job for snapshot"),
    }
}

fn spawn_hook(job_id: JobId, url: String, thumbnails_dir: PathBuf, store: Arc<Store>, broker: Broker) {
    tokio::spawn(async move {
        hook::run(job_id, url, thumbnails_dir, &store, &broker).await;
    });
}

/// Run a synchronous `Store` call on the blocking thread pool, matching the
/// design's "every blocking DB call inside the async server/scheduler is
/// dispatched via `tokio::task::spawn_blocking`" rule.
async fn blocking<T, E>(store: &Arc<Store>, f: impl FnOnce(&Store) -> Result<T, E> + Send + 'static) -> Result<T, E>
where
    T: Send + 'static,
    E: From<low_tide_store::StoreError> + Send + 'static,
{
    let store = store.clone();
    match tokio::task::spawn_blocking(move || f(&store)).await {
        Ok(result) => result,
        Err(_) => unreachable!("store blocking task panicked; Store methods never panic"),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
