//! Event hub for broadcast and replay
//!
//! The hub assigns sequence ids to published events, keeps a bounded replay
//! history and fans each event out to every subscriber mailbox.
//!
//! # Architecture
//!
//! ```text
//!                            EventHub (Arc)
//!                     ┌──────────────────────────┐
//!                     │ Mutex<HubState {         │
//!                     │   next_id,               │
//!                     │   history: ring buffer,  │
//!                     │   subscribers: HashMap<  │
//!                     │     id, mpsc::Sender>,   │
//!                     │ }>                       │
//!                     └────────────┬─────────────┘
//!                                  │ try_send (never blocks)
//!         ┌────────────────────────┼────────────────────────┐
//!         │                        │                        │
//!         ▼                        ▼                        ▼
//!    [Publisher]            [Subscription]           [Subscription]
//!    hub.publish()          mailbox.recv()           mailbox.recv()
//!                                  │                        │
//!                           DeliveryAdapter ──► TCP  DeliveryAdapter ──► TCP
//!                                  │
//!                                  └── on fatal write error: hub.report_stale()
//! ```
//!
//! # Backpressure
//!
//! Mailboxes are bounded. When a subscriber's mailbox is full the event is
//! dropped for that subscriber only; the publisher and other subscribers are
//! never held up. Delivery is at-most-once per subscriber.

pub mod config;
pub mod history;
pub mod store;
pub mod subscriber;

pub use config::HubConfig;
pub use history::HistoryBuffer;
pub use store::{EventHub, TopicSender};
pub use subscriber::{SubscriberId, Subscription};
