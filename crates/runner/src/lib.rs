// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! low-tide-runner: supervises a single child process for one job.
//!
//! Captures stdout and stderr merged in arrival order, splits them into
//! lines, and reports each one plus the child's pid back to the caller
//! through a plain callback rather than a channel — the caller (the
//! Scheduler) already owns the Store/Broker handles needed to act on them,
//! so there's nothing a channel would buy here. Cancellation is cooperative:
//! a `CancellationToken` triggers `SIGTERM`, with a grace period before
//! `SIGKILL`, mirroring the cancel-then-force-kill pattern this pack's
//! download-job supervisors use.

mod error;
mod line_reader;

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use line_reader::LineReader;
use low_tide_core::JobId;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use error::RunnerError;

/// Safety cap on a single published log line.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// How long to wait after a graceful terminate before force-killing.
pub const CANCEL_GRACE: Duration = Duration::from_secs(5);

/// What to run, where, and for which job.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub job_id: JobId,
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

/// Why the child stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    Normal,
    Cancelled,
    SpawnFailed,
}

/// The result of a completed `Runner::run` call.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub termination_reason: TerminationReason,
    pub exit_code: Option<i32>,
    pub error_message: Option<String>,
    /// The full captured stdout+stderr, newline-joined, in arrival order.
    pub log: String,
}

/// Something the Runner observed while the child was alive.
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    Pid(u32),
    Line(String),
}

pub struct Runner;

impl Runner {
    /// Spawn and supervise the child described by `spec` until it exits or
    /// `cancel` fires. `on_event` is called synchronously for each pid
    /// discovery and each captured line, in order.
    pub async fn run(
        spec: &RunSpec,
        cancel: CancellationToken,
        mut on_event: impl FnMut(RunnerEvent),
    ) -> RunOutcome {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .env("LOWTIDE_JOB_ID", spec.job_id.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                warn!(job_id = %spec.job_id, program = %spec.program, %source, "failed to spawn job");
                return RunOutcome {
                    termination_reason: TerminationReason::SpawnFailed,
                    exit_code: None,
                    error_message: Some(format!("failed to start {}: {source}", spec.program)),
                    log: String::new(),
                };
            }
        };

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                let _ = child.start_kill();
                return RunOutcome {
                    termination_reason: TerminationReason::SpawnFailed,
                    exit_code: None,
                    error_message: Some(RunnerError::MissingPipe.to_string()),
                    log: String::new(),
                };
            }
        };

        if let Some(pid) = child.id() {
            on_event(RunnerEvent::Pid(pid));
        }

        let mut stdout_lines = LineReader::new(stdout);
        let mut stderr_lines = LineReader::new(stderr);
        let mut log = String::new();
        let mut stdout_done = false;
        let mut stderr_done = false;
        let mut cancelled = false;

        while !(stdout_done && stderr_done) {
            tokio::select! {
                _ = cancel.cancelled(), if !cancelled => {
                    cancelled = true;
                    terminate(&mut child, spec.job_id).await;
                }
                line = stdout_lines.next_line(), if !stdout_done => {
                    match line {
                        Some(text) => {
                            append_line(&mut log, &text);
                            on_event(RunnerEvent::Line(text));
                        }
                        None => stdout_done = true,
                    }
                }
                line = stderr_lines.next_line(), if !stderr_done => {
                    match line {
                        Some(text) => {
                            append_line(&mut log, &text);
                            on_event(RunnerEvent::Line(text));
                        }
                        None => stderr_done = true,
                    }
                }
            }
        }

        if cancelled {
            let _ = child.wait().await;
            info!(job_id = %spec.job_id, "job cancelled");
            return RunOutcome {
                termination_reason: TerminationReason::Cancelled,
                exit_code: None,
                error_message: None,
                log,
            };
        }

        match child.wait().await {
            Ok(status) => RunOutcome {
                termination_reason: TerminationReason::Normal,
                exit_code: status.code(),
                error_message: None,
                log,
            },
            Err(source) => RunOutcome {
                termination_reason: TerminationReason::Normal,
                exit_code: None,
                error_message: Some(format!("failed to reap child: {source}")),
                log,
            },
        }
    }
}

fn append_line(log: &mut String, line: &str) {
    if !log.is_empty() {
        log.push('\n');
    }
    log.push_str(line);
}

/// Send a graceful terminate signal, then force-kill after `CANCEL_GRACE`
/// if the child hasn't exited on its own.
async fn terminate(child: &mut Child, job_id: JobId) {
    warn!(%job_id, "cancelling running job");
    if !send_terminate(child) {
        let _ = child.start_kill();
        return;
    }
    let grace = tokio::time::sleep(CANCEL_GRACE);
    tokio::pin!(grace);
    tokio::select! {
        _ = child.wait() => {}
        _ = &mut grace => {
            warn!(%job_id, "job ignored graceful terminate, force-killing");
            let _ = child.start_kill();
        }
    }
}

#[cfg(unix)]
fn send_terminate(child: &Child) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    match child.id() {
        Some(pid) => kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok(),
        None => false,
    }
}

#[cfg(not(unix))]
fn send_terminate(_child: &Child) -> bool {
    false
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
