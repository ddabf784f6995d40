// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project-scoped pub/sub for lifecycle events.
//!
//! Many short-lived subscribers (SSE connections) attach and detach while
//! workflows run. Delivery is bounded: a subscriber that stops draining its
//! channel loses events rather than stalling the publisher.

use parking_lot::Mutex;
use qm_core::Event;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default per-subscriber buffer capacity.
pub const DEFAULT_EVENT_BUFFER: usize = 100;

/// Bounded, non-blocking event broker for one project.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    capacity: usize,
    subscribers: Mutex<Vec<mpsc::Sender<Event>>>,
    closed: AtomicBool,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_BUFFER)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                capacity: capacity.max(1),
                subscribers: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Register a subscriber. It receives every event published after this
    /// call, in publish order, subject to buffer headroom.
    ///
    /// Subscribing to a closed bus yields a receiver that terminates
    /// immediately.
    pub fn subscribe(&self) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        if !self.inner.closed.load(Ordering::SeqCst) {
            self.inner.subscribers.lock().push(tx);
        }
        rx
    }

    /// Deliver an event to every live subscriber without blocking.
    ///
    /// A full subscriber buffer drops the event for that subscriber only;
    /// disconnected subscribers are pruned.
    pub fn publish(&self, event: Event) {
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(
                    workflow_id = %event.workflow_id,
                    event = event.name(),
                    "dropping event for slow subscriber"
                );
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// End all subscriber streams. Later publishes are discarded.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.subscribers.lock().clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
