//! Event records and their wire framing

pub mod frame;
pub mod record;

pub use frame::FramedEvent;
pub use record::EventRecord;
