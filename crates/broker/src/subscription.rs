// SPDX-License-Identifier: MIT

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::event::BrokerEvent;
use crate::Broker;

/// Per-subscriber bounded queue. Shared between the publishing side
/// (`Broker::publish`) and the receiving side (`Subscription::recv`).
pub(crate) struct Subscriber {
    queue: Mutex<VecDeque<BrokerEvent>>,
    capacity: usize,
    notify: Notify,
}

impl Subscriber {
    pub(crate) fn new(capacity: usize) -> Self {
        Self { queue: Mutex::new(VecDeque::with_capacity(capacity)), capacity, notify: Notify::new() }
    }

    /// Push an event, dropping the oldest queued one if at capacity.
    pub(crate) fn deliver(&self, event: BrokerEvent) {
        let mut queue = self.queue.lock();
        if queue.len() >= self.capacity {
            queue.pop_front();
            tracing::warn!("broker subscriber queue full, dropped oldest event");
        }
        queue.push_back(event);
        drop(queue);
        self.notify.notify_one();
    }

    fn try_pop(&self) -> Option<BrokerEvent> {
        self.queue.lock().pop_front()
    }
}

/// A live subscription to the Broker. Drop it (or call `unsubscribe`) to
/// stop receiving events.
pub struct Subscription {
    id: u64,
    subscriber: Arc<Subscriber>,
    broker: Broker,
    unsubscribed: bool,
}

impl Subscription {
    pub(crate) fn new(id: u64, subscriber: Arc<Subscriber>, broker: Broker) -> Self {
        Self { id, subscriber, broker, unsubscribed: false }
    }

    /// Wait for and return the next event for this subscription.
    pub async fn recv(&mut self) -> BrokerEvent {
        loop {
            if let Some(event) = self.subscriber.try_pop() {
                return event;
            }
            self.subscriber.notify.notified().await;
        }
    }

    /// Explicitly unsubscribe. Idempotent; also happens on `Drop`.
    pub fn unsubscribe(mut self) {
        self.unsubscribe_inner();
    }

    fn unsubscribe_inner(&mut self) {
        if !self.unsubscribed {
            self.broker.unsubscribe(self.id);
            self.unsubscribed = true;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe_inner();
    }
}
