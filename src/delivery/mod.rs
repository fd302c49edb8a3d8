//! Delivery of subscriber mailboxes to their transports

pub mod adapter;

pub use adapter::{write_with_deadline, DeliveryAdapter, DeliveryEnd, StaleReason, WriteOutcome};
