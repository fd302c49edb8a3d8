//! Published event records

use bytes::Bytes;

use super::frame::FramedEvent;

/// One published occurrence: a topic label and an opaque payload
///
/// The payload is copied on construction, so the caller's buffer can be
/// reused as soon as the record exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    topic: String,
    payload: Bytes,
}

impl EventRecord {
    /// Create a record, copying the payload
    pub fn new(topic: impl Into<String>, payload: &[u8]) -> Self {
        Self {
            topic: topic.into(),
            payload: Bytes::copy_from_slice(payload),
        }
    }

    /// Topic label (may be empty)
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Payload bytes
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Serialize into a framed event carrying the given sequence id
    pub fn frame(&self, id: u64) -> FramedEvent {
        FramedEvent::encode(id, &self.topic, &self.payload)
    }
}
