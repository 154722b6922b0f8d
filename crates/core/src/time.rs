// SPDX-License-Identifier: MIT

//! Wall-clock helpers shared by every crate that stamps a `Job` row.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as Unix seconds. Saturates to 0 if the clock is somehow
/// before the epoch.
pub fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}
