//! Error types
//!
//! A single error enum covers the hub, the delivery path and the SSE server.
//! Errors raised while answering a stream request render as plain-text HTTP
//! responses.

use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for hub and server operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on a subscriber transport or listener
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The hub has been closed and accepts no further publishes or subscribers
    #[error("event hub closed")]
    Closed,

    /// `Last-Event-ID` supplied by a client is not a sequence id
    #[error("invalid Last-Event-ID: {0:?}")]
    InvalidLastEventId(String),

    /// The server is already serving its maximum number of streams
    #[error("stream limit of {0} reached")]
    StreamLimit(usize),
}

impl Error {
    /// Whether the error came from a client request rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidLastEventId(_))
    }

    /// HTTP status used when the error answers a stream request
    pub fn status_code(&self) -> StatusCode {
        match self {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            Error::Closed | Error::StreamLimit(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::Closed.to_string(), "event hub closed");
        assert_eq!(
            Error::InvalidLastEventId("abc".into()).to_string(),
            "invalid Last-Event-ID: \"abc\""
        );
        assert_eq!(Error::StreamLimit(8).to_string(), "stream limit of 8 reached");
    }

    #[test]
    fn test_io_conversion() {
        let err: Error = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_client_error());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_client_errors() {
        assert!(Error::InvalidLastEventId("x".into()).is_client_error());
        assert!(!Error::Closed.is_client_error());
        assert!(!Error::StreamLimit(1).is_client_error());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::InvalidLastEventId("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::Closed.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(Error::StreamLimit(4).status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let response = Error::Closed.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
