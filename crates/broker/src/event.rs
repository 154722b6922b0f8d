// SPDX-License-Identifier: MIT

use low_tide_core::{Job, JobId};

/// An event delivered to Broker subscribers.
#[derive(Debug, Clone)]
pub enum BrokerEvent {
    /// A full `Job` snapshot. Sent on every status transition and on
    /// file-set changes.
    JobSnapshot(Box<Job>),
    /// One captured log line, in arrival order, with a strictly increasing
    /// per-job sequence number starting at 1.
    JobLog { job_id: JobId, seq: u64, line: String },
    /// Bulk archive notification; clients may refresh their job list.
    JobsArchived,
}
