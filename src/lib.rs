//! # sse-hub
//!
//! A Server-Sent Events broadcast hub with bounded replay history.
//!
//! Publishers push named events into an [`EventHub`]; the hub numbers them,
//! remembers the most recent ones and fans each out to every subscriber's
//! bounded mailbox. Subscribers that reconnect with a `Last-Event-ID` get the
//! retained events they missed before live events resume.
//!
//! Delivery is best-effort per subscriber: a subscriber that cannot keep up
//! loses events instead of slowing everyone else down.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use sse_hub::{EventHub, ServerConfig, SseServer};
//!
//! # async fn example() -> sse_hub::Result<()> {
//! let hub = EventHub::new();
//!
//! let sender = hub.sender("message");
//! tokio::spawn(async move {
//!     while sender.send(b"hello").await.is_ok() {
//!         tokio::time::sleep(Duration::from_secs(2)).await;
//!     }
//! });
//!
//! let server = SseServer::new(ServerConfig::default(), hub);
//! server
//!     .run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`hub`]: the broadcast coordinator, replay history and subscriber handles
//! - [`event`]: event records and their wire framing
//! - [`delivery`]: writing a subscriber's mailbox to its transport
//! - [`server`]: an axum route and listener streaming the hub over HTTP
//! - [`stats`]: hub counters

pub mod delivery;
pub mod error;
pub mod event;
pub mod hub;
pub mod server;
pub mod stats;

pub use delivery::{DeliveryAdapter, DeliveryEnd, StaleReason, WriteOutcome};
pub use error::{Error, Result};
pub use event::{EventRecord, FramedEvent};
pub use hub::{EventHub, HistoryBuffer, HubConfig, SubscriberId, Subscription, TopicSender};
pub use server::{ServerConfig, SseServer};
pub use stats::HubStats;
