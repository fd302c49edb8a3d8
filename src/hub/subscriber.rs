//! Subscriber handles
//!
//! Each subscriber is split in two halves joined by a bounded mailbox:
//! the hub keeps a [`SubscriberSlot`] (the sending side) in its subscriber
//! map, and the caller receives a [`Subscription`] (the receiving side) to
//! hand to exactly one delivery task. Removing the slot closes the mailbox.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

use crate::event::FramedEvent;

/// Identifier the hub assigns to each subscriber
pub type SubscriberId = u64;

/// Result of offering an event to a mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Offer {
    /// Event queued
    Queued,
    /// Mailbox full, event dropped for this subscriber
    Dropped,
    /// Receiving side is gone
    Disconnected,
}

/// Hub-side half of a subscriber
pub(super) struct SubscriberSlot {
    tx: mpsc::Sender<FramedEvent>,
    stale: Arc<AtomicBool>,
    pub(super) registered_at: Instant,
}

impl SubscriberSlot {
    /// Non-blocking enqueue
    pub(super) fn offer(&self, event: &FramedEvent) -> Offer {
        match self.tx.try_send(event.clone()) {
            Ok(()) => Offer::Queued,
            Err(TrySendError::Full(_)) => Offer::Dropped,
            Err(TrySendError::Closed(_)) => Offer::Disconnected,
        }
    }

    pub(super) fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }
}

/// Create both halves of a subscriber with a mailbox of `capacity` events
pub(super) fn channel(
    id: SubscriberId,
    last_seen_id: Option<u64>,
    capacity: usize,
) -> (SubscriberSlot, Subscription) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let stale = Arc::new(AtomicBool::new(false));

    let slot = SubscriberSlot {
        tx,
        stale: Arc::clone(&stale),
        registered_at: Instant::now(),
    };

    let subscription = Subscription {
        id,
        last_seen_id,
        rx,
        stale,
    };

    (slot, subscription)
}

/// Receiving half of a subscriber, returned by
/// [`EventHub::subscribe`](super::EventHub::subscribe)
///
/// Yields framed events in non-decreasing id order: replayed history first,
/// then live events. Events may be missing when the mailbox overflowed or the
/// history had already evicted them.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    last_seen_id: Option<u64>,
    rx: mpsc::Receiver<FramedEvent>,
    stale: Arc<AtomicBool>,
}

impl Subscription {
    /// Hub-assigned subscriber id, used to unsubscribe
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// The id the subscriber resumed from, if any
    pub fn last_seen_id(&self) -> Option<u64> {
        self.last_seen_id
    }

    /// Wait for the next event
    ///
    /// Returns `None` once the subscriber was removed from the hub and every
    /// queued event has been taken.
    pub async fn recv(&mut self) -> Option<FramedEvent> {
        self.rx.recv().await
    }

    /// Take the next queued event without waiting
    ///
    /// Returns `None` when the mailbox is currently empty or closed.
    pub fn try_recv(&mut self) -> Option<FramedEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Whether the delivery path for this subscriber failed
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// Mark the subscriber stale
    ///
    /// Returns `true` only for the call that flipped the flag.
    pub fn mark_stale(&self) -> bool {
        !self.stale.swap(true, Ordering::AcqRel)
    }
}
