//! Broadcast hub
//!
//! Wraps a `tokio::sync::broadcast` channel. Sending never waits on
//! receivers: a receiver that falls more than `capacity` events behind loses
//! the oldest ones and resumes from the newest.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::registry::Bin;

use super::event::BinEvent;

/// Default per-subscriber buffer, in events
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Fan-out hub for bin updates
///
/// Cheap to clone; all clones share one channel.
#[derive(Clone)]
pub struct FanoutHub {
    tx: broadcast::Sender<BinEvent>,
    subscribers: Arc<AtomicUsize>,
}

impl FanoutHub {
    /// Create a hub with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BROADCAST_CAPACITY)
    }

    /// Create a hub with a custom per-subscriber capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            subscribers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Push a bin snapshot to every connected observer
    ///
    /// Returns the number of observers the event was queued for, or 0 if
    /// there are none.
    pub fn broadcast(&self, bin: &Bin) -> usize {
        self.send(BinEvent::from(bin))
    }

    /// Push a prepared event
    pub fn send(&self, event: BinEvent) -> usize {
        // Err only means there are no receivers
        self.tx.send(event).unwrap_or(0)
    }

    /// Attach a new observer
    ///
    /// The observer only sees events broadcast after this call.
    pub fn subscribe(&self) -> Subscription {
        let count = self.subscribers.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(subscribers = count, "Observer subscribed");

        Subscription {
            rx: self.tx.subscribe(),
            subscribers: Arc::clone(&self.subscribers),
            missed: 0,
        }
    }

    /// Detach an observer
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Number of currently attached observers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::Relaxed)
    }
}

impl Default for FanoutHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half held by one observer
pub struct Subscription {
    rx: broadcast::Receiver<BinEvent>,
    subscribers: Arc<AtomicUsize>,
    missed: u64,
}

impl Subscription {
    /// Wait for the next event
    ///
    /// Skips over events lost to lag. Returns `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<BinEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(n)) => self.record_lag(n),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next event if one is ready
    pub fn try_recv(&mut self) -> Option<BinEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(n)) => self.record_lag(n),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Total events this observer lost by falling behind
    pub fn missed(&self) -> u64 {
        self.missed
    }

    fn record_lag(&mut self, n: u64) {
        self.missed += n;
        tracing::debug!(skipped = n, "Observer lagging, dropped oldest events");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let prev = self.subscribers.fetch_sub(1, Ordering::Relaxed);
        tracing::debug!(subscribers = prev.saturating_sub(1), "Observer unsubscribed");
    }
}
