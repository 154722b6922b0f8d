// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! In-process publish/subscribe hub.
//!
//! Two topics ride the same `BrokerEvent` channel: `job_snapshot` (a full
//! `Job` record) and `job_log` (one captured line with its per-job sequence
//! number). Delivery is fan-out and best-effort per subscriber — a bounded
//! ring buffer backs each subscription; when it's full the oldest queued
//! event for that subscriber is dropped, on the assumption the UI will
//! re-hydrate from the next snapshot.
//!
//! The registry is guarded by a `parking_lot::Mutex`, the same choice the
//! rest of this service makes for short, synchronous, shared-state critical
//! sections (see `low-tide-store`, `low-tide-scheduler`).

mod event;
mod subscription;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

pub use event::BrokerEvent;
pub use subscription::Subscription;
use subscription::Subscriber;

/// Bounded capacity of each subscriber's delivery queue.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SubscriberId(u64);

/// The in-process pub/sub hub. Cheap to clone; all clones share one
/// registry.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<Inner>,
}

struct Inner {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<SubscriberId, Arc<Subscriber>>>,
    capacity: usize,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Broker {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(0),
                subscribers: Mutex::new(HashMap::new()),
                capacity,
            }),
        }
    }

    /// Register a new subscriber. Dropping the returned `Subscription`
    /// unsubscribes it.
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let subscriber = Arc::new(Subscriber::new(self.inner.capacity));
        self.inner.subscribers.lock().insert(id, subscriber.clone());
        Subscription::new(id.0, subscriber, self.clone())
    }

    fn unsubscribe(&self, id: u64) {
        self.inner.subscribers.lock().remove(&SubscriberId(id));
    }

    /// Publish a full job snapshot to every current subscriber.
    pub fn publish_snapshot(&self, job: low_tide_core::Job) {
        self.publish(BrokerEvent::JobSnapshot(Box::new(job)));
    }

    /// Publish one captured log line for a job.
    pub fn publish_log_line(&self, job_id: low_tide_core::JobId, seq: u64, line: String) {
        self.publish(BrokerEvent::JobLog { job_id, seq, line });
    }

    /// Publish the bulk-archive notification.
    pub fn publish_jobs_archived(&self) {
        self.publish(BrokerEvent::JobsArchived);
    }

    fn publish(&self, event: BrokerEvent) {
        let subscribers: Vec<_> = self.inner.subscribers.lock().values().cloned().collect();
        for subscriber in subscribers {
            subscriber.deliver(event.clone());
        }
    }

    /// Number of currently registered subscribers (for diagnostics/tests).
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
