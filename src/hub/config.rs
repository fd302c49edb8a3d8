//! Hub configuration

use std::time::Duration;

use super::history::DEFAULT_HISTORY_CAPACITY;

/// Default per-subscriber mailbox capacity
pub const DEFAULT_MAILBOX_CAPACITY: usize = 10;

/// Default deadline for a single write to a subscriber
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Event hub configuration
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Number of recent events retained for replay
    pub history_capacity: usize,

    /// Events buffered per subscriber before new ones are dropped
    pub mailbox_capacity: usize,

    /// Deadline for writing one event to a subscriber transport
    pub write_timeout: Duration,

    /// Treat a write timeout as fatal for the subscriber
    ///
    /// When off, a timeout that cut a frame short still ends delivery, since
    /// the client could not parse what follows. Only timeouts that left the
    /// stream on a frame boundary are tolerated.
    pub close_on_timeout: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            close_on_timeout: false,
        }
    }
}

impl HubConfig {
    /// Set the replay history capacity (minimum 1)
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity.max(1);
        self
    }

    /// Set the per-subscriber mailbox capacity (minimum 1)
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }

    /// Set the write deadline
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Drop subscribers whose writes time out
    pub fn close_on_timeout(mut self, close: bool) -> Self {
        self.close_on_timeout = close;
        self
    }
}
