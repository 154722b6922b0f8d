// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Internal failures the Runner cannot fold into a `RunOutcome` because they
/// happen before a child exists to report a `termination_reason` for.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("child process exposed no stdout/stderr pipe")]
    MissingPipe,
}
