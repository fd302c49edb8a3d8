//! Framed events
//!
//! A framed event is the ready-to-write wire form of a record:
//!
//! ```text
//! id: <sequence id>
//! event: <topic>
//! data: <payload>
//!
//! ```
//!
//! The payload is written as-is. Frames are built once per broadcast and shared
//! between the history buffer and every mailbox; cloning only bumps the
//! reference count of the underlying `Bytes`.

use bytes::{BufMut, Bytes, BytesMut};

const ID_PREFIX: &[u8] = b"id: ";
const EVENT_PREFIX: &[u8] = b"event: ";
const DATA_PREFIX: &[u8] = b"data: ";

/// A serialized event with its sequence id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedEvent {
    id: u64,
    data: Bytes,
}

impl FramedEvent {
    /// Encode a frame from its parts
    pub fn encode(id: u64, topic: &str, payload: &[u8]) -> Self {
        let id_str = id.to_string();
        let len = ID_PREFIX.len()
            + id_str.len()
            + EVENT_PREFIX.len()
            + topic.len()
            + DATA_PREFIX.len()
            + payload.len()
            + 4;

        let mut buf = BytesMut::with_capacity(len);
        buf.put_slice(ID_PREFIX);
        buf.put_slice(id_str.as_bytes());
        buf.put_u8(b'\n');
        buf.put_slice(EVENT_PREFIX);
        buf.put_slice(topic.as_bytes());
        buf.put_u8(b'\n');
        buf.put_slice(DATA_PREFIX);
        buf.put_slice(payload);
        buf.put_slice(b"\n\n");

        Self {
            id,
            data: buf.freeze(),
        }
    }

    /// Sequence id assigned by the hub
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wire bytes
    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    /// Size of the frame in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Frames always carry at least the field names
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
