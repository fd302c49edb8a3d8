//! Event hub implementation
//!
//! The hub is the single authority over the event sequence, the replay
//! history and the subscriber set. All of it lives behind one mutex so that
//! publish, subscribe, unsubscribe and close are strictly ordered.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::event::{EventRecord, FramedEvent};
use crate::stats::{HubCounters, HubStats};

use super::config::HubConfig;
use super::history::HistoryBuffer;
use super::subscriber::{self, Offer, SubscriberId, SubscriberSlot, Subscription};

/// State mutated only while holding the hub lock
struct HubState {
    /// Id assigned to the next broadcast event
    next_id: u64,
    /// Recent events for replay
    history: HistoryBuffer,
    /// Registered subscribers
    subscribers: HashMap<SubscriberId, SubscriberSlot>,
    /// Terminal flag
    closed: bool,
}

struct HubInner {
    state: Mutex<HubState>,
    config: HubConfig,
    next_subscriber_id: AtomicU64,
    subscriber_count: AtomicUsize,
    counters: HubCounters,
}

/// Broadcast coordinator for one event stream
///
/// Cheap to clone; every clone refers to the same hub.
///
/// # Example
/// ```
/// use sse_hub::EventHub;
///
/// # async fn example() -> sse_hub::Result<()> {
/// let hub = EventHub::new();
/// let mut sub = hub.subscribe(None).await?;
///
/// let id = hub.publish("message", b"hello").await?;
/// let event = sub.recv().await.unwrap();
/// assert_eq!(event.id(), id);
///
/// hub.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl EventHub {
    /// Create a hub with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a hub with custom configuration
    pub fn with_config(config: HubConfig) -> Self {
        let state = HubState {
            next_id: 0,
            history: HistoryBuffer::with_capacity(config.history_capacity),
            subscribers: HashMap::new(),
            closed: false,
        };

        Self {
            inner: Arc::new(HubInner {
                state: Mutex::new(state),
                config,
                next_subscriber_id: AtomicU64::new(1),
                subscriber_count: AtomicUsize::new(0),
                counters: HubCounters::new(),
            }),
        }
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Broadcast an event to every registered subscriber
    ///
    /// The payload is copied before this returns. The event gets the next
    /// sequence id, is appended to the history, and is offered to each
    /// mailbox without waiting: a subscriber whose mailbox is full simply
    /// misses it. Returns the assigned id once every offer has been made.
    pub async fn publish(&self, topic: impl Into<String>, payload: &[u8]) -> Result<u64> {
        let record = EventRecord::new(topic, payload);

        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;

        if state.closed {
            return Err(Error::Closed);
        }

        let id = state.next_id;
        let framed = record.frame(id);
        state.next_id += 1;
        state.history.push(framed.clone());

        let mut attempts = 0u64;
        let mut dropped = 0u64;
        let mut disconnected = Vec::new();

        for (&sub_id, slot) in &state.subscribers {
            match slot.offer(&framed) {
                Offer::Queued => attempts += 1,
                Offer::Dropped => {
                    attempts += 1;
                    dropped += 1;
                    tracing::debug!(subscriber = sub_id, event_id = id, "Mailbox full, event dropped");
                }
                Offer::Disconnected => disconnected.push(sub_id),
            }
        }

        for sub_id in disconnected {
            state.subscribers.remove(&sub_id);
            tracing::debug!(subscriber = sub_id, "Subscription dropped, subscriber removed");
        }

        self.inner
            .subscriber_count
            .store(state.subscribers.len(), Ordering::Relaxed);
        self.inner.counters.record_published(attempts, dropped);

        tracing::trace!(
            event_id = id,
            topic = record.topic(),
            subscribers = state.subscribers.len(),
            "Event broadcast"
        );

        Ok(id)
    }

    /// Register a new subscriber
    ///
    /// With `Some(last_seen_id)`, retained events with a greater id are queued
    /// first, oldest first, using the same drop-on-full policy as live events.
    /// No replay happens for `None` or for an id that has not been assigned
    /// yet. If the history no longer holds the event after `last_seen_id`,
    /// replay starts at the oldest retained event.
    pub async fn subscribe(&self, last_seen_id: Option<u64>) -> Result<Subscription> {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;

        if state.closed {
            return Err(Error::Closed);
        }

        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let (slot, subscription) =
            subscriber::channel(id, last_seen_id, self.inner.config.mailbox_capacity);

        let missed = missed_events(state, last_seen_id);
        let mut replayed = 0u64;
        let mut dropped = 0u64;

        for event in &missed {
            match slot.offer(event) {
                Offer::Queued => replayed += 1,
                Offer::Dropped => dropped += 1,
                Offer::Disconnected => break,
            }
        }

        state.subscribers.insert(id, slot);
        self.inner
            .subscriber_count
            .store(state.subscribers.len(), Ordering::Relaxed);

        self.inner.counters.record_subscriber();
        self.inner.counters.record_replay(replayed + dropped, dropped);

        tracing::info!(
            subscriber = id,
            last_seen_id = ?last_seen_id,
            replayed = replayed,
            dropped = dropped,
            subscribers = state.subscribers.len(),
            "Subscriber added"
        );

        Ok(subscription)
    }

    /// Remove a subscriber and close its mailbox
    ///
    /// Events already queued stay readable. Unknown ids, repeated calls and
    /// calls after [`close`](Self::close) are no-ops. Returns whether a
    /// subscriber was removed.
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut state = self.inner.state.lock().await;

        let removed = state.subscribers.remove(&id);
        if let Some(ref slot) = removed {
            self.inner
                .subscriber_count
                .store(state.subscribers.len(), Ordering::Relaxed);

            tracing::debug!(
                subscriber = id,
                stale = slot.is_stale(),
                connected_secs = slot.registered_at.elapsed().as_secs(),
                subscribers = state.subscribers.len(),
                "Subscriber removed"
            );
        }

        removed.is_some()
    }

    /// Report a subscriber whose delivery path failed
    ///
    /// Unsubscribes it and, if it was still registered, counts it as stale.
    /// Safe to call from a delivery task at any time; the hub never waits on
    /// subscribers while holding its lock.
    pub async fn report_stale(&self, id: SubscriberId) {
        if self.unsubscribe(id).await {
            self.inner.counters.record_stale();
            tracing::warn!(subscriber = id, "Stale subscriber removed");
        }
    }

    /// Close the hub
    ///
    /// Closes every mailbox, discards the history and rejects further
    /// publishes and subscriptions. Idempotent.
    pub async fn close(&self) {
        let mut state = self.inner.state.lock().await;

        if state.closed {
            return;
        }

        let subscribers = state.subscribers.len();
        state.closed = true;
        state.subscribers.clear();
        state.history.clear();
        self.inner.subscriber_count.store(0, Ordering::Relaxed);

        tracing::info!(subscribers = subscribers, next_id = state.next_id, "Event hub closed");
    }

    /// Whether [`close`](Self::close) has been called
    pub async fn is_closed(&self) -> bool {
        self.inner.state.lock().await.closed
    }

    /// Number of currently registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count.load(Ordering::Relaxed)
    }

    /// Create a publisher bound to one topic
    pub fn sender(&self, topic: impl Into<String>) -> TopicSender {
        let topic: String = topic.into();
        TopicSender {
            hub: self.clone(),
            topic: Arc::from(topic),
        }
    }

    /// Snapshot of hub statistics
    pub async fn stats(&self) -> HubStats {
        let state = self.inner.state.lock().await;

        HubStats {
            active_subscribers: state.subscribers.len(),
            history_len: state.history.len(),
            next_id: state.next_id,
            closed: state.closed,
            ..self.inner.counters.snapshot()
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("config", &self.inner.config)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Events a subscriber resuming after `last_seen_id` has missed
fn missed_events(state: &HubState, last_seen_id: Option<u64>) -> Vec<FramedEvent> {
    match last_seen_id {
        Some(last) if last < state.next_id => state.history.entries_after(last),
        _ => Vec::new(),
    }
}

/// Publisher bound to a single topic
///
/// Obtained from [`EventHub::sender`].
#[derive(Clone, Debug)]
pub struct TopicSender {
    hub: EventHub,
    topic: Arc<str>,
}

impl TopicSender {
    /// Topic this sender publishes under
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish a payload under the bound topic
    pub async fn send(&self, payload: &[u8]) -> Result<u64> {
        self.hub.publish(&*self.topic, payload).await
    }
}
