//! Mailbox-to-transport delivery
//!
//! One adapter runs per subscriber. It takes events from the subscriber's
//! mailbox and writes them to the transport, each write bounded by a
//! deadline. Write errors end delivery: the subscriber is marked stale, the
//! transport is shut down and the hub is told to drop the subscriber.
//!
//! A timed-out write is only survivable when it left the stream on a frame
//! boundary. Once part of a frame has gone out, the next frame would be
//! appended to a torn `id/event/data` block, so delivery ends instead.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::hub::{EventHub, Subscription};

/// Outcome of writing a single event
#[derive(Debug)]
pub enum WriteOutcome {
    /// All bytes written and flushed
    Written,
    /// The write deadline passed first
    ///
    /// `written` bytes of the `total`-byte frame reached the transport. When
    /// that is neither none nor all of it, the client holds a partial frame
    /// and the stream can no longer be parsed.
    TimedOut { written: usize, total: usize },
    /// The transport returned an error
    Failed(io::Error),
}

impl WriteOutcome {
    /// Whether the write stopped partway through the frame
    pub fn is_partial(&self) -> bool {
        match *self {
            WriteOutcome::TimedOut { written, total } => written > 0 && written < total,
            _ => false,
        }
    }
}

/// Why a subscriber was declared stale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// A write timed out and timeouts are fatal
    Timeout,
    /// A write timed out after sending part of a frame
    PartialWrite,
    /// The transport failed
    Write(io::ErrorKind),
}

/// How a delivery loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryEnd {
    /// The mailbox was closed by the hub and fully drained
    Closed,
    /// Delivery failed; the subscriber was reported to the hub
    Stale(StaleReason),
}

/// Write `buf` to `writer` and flush, giving up after `deadline`
pub async fn write_with_deadline<W>(writer: &mut W, buf: &[u8], deadline: Duration) -> WriteOutcome
where
    W: AsyncWrite + Unpin,
{
    let total = buf.len();
    let mut written = 0;

    let write = async {
        while written < total {
            match writer.write(&buf[written..]).await? {
                0 => return Err(io::ErrorKind::WriteZero.into()),
                n => written += n,
            }
        }
        writer.flush().await
    };
    let result = tokio::time::timeout(deadline, write).await;

    match result {
        Ok(Ok(())) => WriteOutcome::Written,
        Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => WriteOutcome::TimedOut { written, total },
        Ok(Err(e)) => WriteOutcome::Failed(e),
        Err(_) => WriteOutcome::TimedOut { written, total },
    }
}

/// Drains one subscription into one transport
pub struct DeliveryAdapter<W> {
    hub: EventHub,
    subscription: Subscription,
    writer: W,
    write_timeout: Duration,
    close_on_timeout: bool,
}

impl<W> DeliveryAdapter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Create an adapter using the hub's write deadline and timeout policy
    pub fn new(hub: EventHub, subscription: Subscription, writer: W) -> Self {
        let write_timeout = hub.config().write_timeout;
        let close_on_timeout = hub.config().close_on_timeout;

        Self {
            hub,
            subscription,
            writer,
            write_timeout,
            close_on_timeout,
        }
    }

    /// Override the write deadline
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Override whether timeouts are fatal
    pub fn close_on_timeout(mut self, close: bool) -> Self {
        self.close_on_timeout = close;
        self
    }

    /// Map a write outcome to the stale reason it implies, if any
    fn classify(&self, outcome: WriteOutcome) -> Option<StaleReason> {
        let partial = outcome.is_partial();

        match outcome {
            WriteOutcome::Written => None,
            WriteOutcome::TimedOut { .. } if self.close_on_timeout => Some(StaleReason::Timeout),
            WriteOutcome::TimedOut { written, total } if partial => {
                tracing::debug!(
                    subscriber = self.subscription.id(),
                    written = written,
                    total = total,
                    "Write timed out mid-frame"
                );
                Some(StaleReason::PartialWrite)
            }
            WriteOutcome::TimedOut { .. } => {
                tracing::debug!(
                    subscriber = self.subscription.id(),
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "Write timed out, continuing"
                );
                None
            }
            WriteOutcome::Failed(e) => {
                tracing::debug!(subscriber = self.subscription.id(), error = %e, "Write failed");
                Some(StaleReason::Write(e.kind()))
            }
        }
    }

    /// Run until the mailbox closes or delivery fails
    pub async fn run(mut self) -> DeliveryEnd {
        let id = self.subscription.id();

        while let Some(event) = self.subscription.recv().await {
            let outcome =
                write_with_deadline(&mut self.writer, event.as_bytes(), self.write_timeout).await;

            if let Some(reason) = self.classify(outcome) {
                self.subscription.mark_stale();
                self.shutdown().await;
                self.hub.report_stale(id).await;

                tracing::warn!(subscriber = id, reason = ?reason, "Subscriber is stale");
                return DeliveryEnd::Stale(reason);
            }
        }

        self.shutdown().await;
        tracing::debug!(subscriber = id, "Mailbox closed, delivery finished");
        DeliveryEnd::Closed
    }

    async fn shutdown(&mut self) {
        match tokio::time::timeout(self.write_timeout, self.writer.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::trace!(subscriber = self.subscription.id(), error = %e, "Transport shutdown failed");
            }
            Err(_) => {
                tracing::trace!(subscriber = self.subscription.id(), "Transport shutdown timed out");
            }
        }
    }
}
