//! Statistics for the event hub

use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters kept by the hub
///
/// Updated with relaxed atomics; values are monotonic and only read for
/// reporting.
#[derive(Debug, Default)]
pub struct HubCounters {
    events_published: AtomicU64,
    fanout_attempts: AtomicU64,
    fanout_dropped: AtomicU64,
    replay_attempts: AtomicU64,
    replay_dropped: AtomicU64,
    subscribers_total: AtomicU64,
    subscribers_stale: AtomicU64,
}

impl HubCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one published event and the live offers it made
    pub fn record_published(&self, attempts: u64, dropped: u64) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        add(&self.fanout_attempts, attempts);
        add(&self.fanout_dropped, dropped);
    }

    /// Record the replay offers made to one new subscriber
    pub fn record_replay(&self, attempts: u64, dropped: u64) {
        add(&self.replay_attempts, attempts);
        add(&self.replay_dropped, dropped);
    }

    pub fn record_subscriber(&self) {
        self.subscribers_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.subscribers_stale.fetch_add(1, Ordering::Relaxed);
    }

    /// Build a snapshot, filling in the counter fields
    pub fn snapshot(&self) -> HubStats {
        HubStats {
            events_published: self.events_published.load(Ordering::Relaxed),
            fanout_attempts: self.fanout_attempts.load(Ordering::Relaxed),
            fanout_dropped: self.fanout_dropped.load(Ordering::Relaxed),
            replay_attempts: self.replay_attempts.load(Ordering::Relaxed),
            replay_dropped: self.replay_dropped.load(Ordering::Relaxed),
            subscribers_total: self.subscribers_total.load(Ordering::Relaxed),
            subscribers_stale: self.subscribers_stale.load(Ordering::Relaxed),
            ..HubStats::default()
        }
    }
}

fn add(counter: &AtomicU64, count: u64) {
    if count > 0 {
        counter.fetch_add(count, Ordering::Relaxed);
    }
}

/// Point-in-time hub statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Events broadcast since the hub was created
    pub events_published: u64,
    /// Live events offered to subscriber mailboxes
    pub fanout_attempts: u64,
    /// Live events dropped because a mailbox was full
    pub fanout_dropped: u64,
    /// Retained events offered to new subscribers on subscribe
    pub replay_attempts: u64,
    /// Retained events dropped because a new subscriber's mailbox filled up
    pub replay_dropped: u64,
    /// Subscribers ever registered
    pub subscribers_total: u64,
    /// Subscribers removed after a fatal delivery failure
    pub subscribers_stale: u64,
    /// Currently registered subscribers
    pub active_subscribers: usize,
    /// Events currently retained for replay
    pub history_len: usize,
    /// Id the next published event will receive
    pub next_id: u64,
    /// Whether the hub has been closed
    pub closed: bool,
}

impl HubStats {
    /// Events dropped on either path
    pub fn events_dropped(&self) -> u64 {
        self.fanout_dropped.saturating_add(self.replay_dropped)
    }

    /// Retained events queued to new subscribers
    pub fn events_replayed(&self) -> u64 {
        self.replay_attempts.saturating_sub(self.replay_dropped)
    }

    /// Share of live offers that were dropped, in percent
    pub fn drop_rate(&self) -> f64 {
        percent(self.fanout_dropped, self.fanout_attempts)
    }

    /// Share of replay offers that were dropped, in percent
    pub fn replay_drop_rate(&self) -> f64 {
        percent(self.replay_dropped, self.replay_attempts)
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole > 0 {
        (part as f64 / whole as f64) * 100.0
    } else {
        0.0
    }
}
