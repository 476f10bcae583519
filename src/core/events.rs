//! Typed change notifications.
//!
//! A [`Broadcaster`] fans events out to any number of [`Subscription`]s over
//! crossbeam channels. Each subscriber receives every event published after
//! it subscribed, in publish order. The consumer drains its subscription on
//! whatever context is safe for it (normally the UI thread), so publishers
//! never run consumer code.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Identifier handed out by [`Broadcaster::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Receiving end of a broadcast.
///
/// Dropping the subscription unsubscribes it lazily: the broadcaster prunes
/// disconnected subscribers on the next publish.
#[derive(Debug)]
pub struct Subscription<E> {
    id: SubscriberId,
    receiver: Receiver<E>,
}

impl<E> Subscription<E> {
    /// Identifier to pass to [`Broadcaster::unsubscribe`].
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Take the next pending event without blocking.
    pub fn try_next(&self) -> Option<E> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event.
    pub fn next_timeout(&self, timeout: Duration) -> Option<E> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Drain every pending event.
    pub fn drain(&self) -> Vec<E> {
        self.receiver.try_iter().collect()
    }
}

/// Fan-out publisher.
pub struct Broadcaster<E> {
    subscribers: Mutex<Vec<(SubscriberId, Sender<E>)>>,
    next_id: AtomicU64,
}

impl<E: Clone> Broadcaster<E> {
    /// Create a broadcaster with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Subscription<E> {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = channel::unbounded();
        self.subscribers.lock().push((id, sender));
        Subscription { id, receiver }
    }

    /// Remove a subscriber. Events queued before this call stay readable on
    /// the subscription; nothing further is delivered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Deliver an event to every live subscriber, in subscription order.
    pub fn publish(&self, event: E) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|(_, sender)| sender.send(event.clone()).is_ok());
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl<E: Clone> Default for Broadcaster<E> {
    fn default() -> Self {
        Self::new()
    }
}
