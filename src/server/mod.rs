//! Server-Sent Events transport
//!
//! An axum route that resumes from the `Last-Event-ID` header and streams
//! framed events until the subscriber is removed or its client goes away.

pub mod config;
pub mod listener;
pub mod routes;

pub use config::ServerConfig;
pub use listener::SseServer;
pub use routes::{last_event_id, router, LAST_EVENT_ID};
