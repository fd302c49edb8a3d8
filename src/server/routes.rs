//! HTTP routes
//!
//! A single `GET` route streams events. The request's `Last-Event-ID` header
//! picks the resumption point. A delivery adapter writes the subscriber's
//! mailbox into an in-memory pipe whose read half is the response body:
//! a client that stops reading fills the pipe and runs into the write
//! deadline, and a client that goes away drops the body so the next write
//! fails.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::sync::Semaphore;
use tokio_util::io::ReaderStream;

use crate::delivery::DeliveryAdapter;
use crate::error::{Error, Result};
use crate::hub::EventHub;

use super::config::ServerConfig;

/// Request header carrying the id of the last event a client saw
pub const LAST_EVENT_ID: &str = "last-event-id";

/// Shared state of the stream route
pub struct StreamState {
    hub: EventHub,
    headers: HeaderMap,
    stream_buffer: usize,
    max_connections: usize,
    connection_semaphore: Option<Arc<Semaphore>>,
    next_session_id: AtomicU64,
}

impl StreamState {
    pub fn new(hub: EventHub, config: &ServerConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            hub,
            headers: extra_headers(&config.headers),
            stream_buffer: config.stream_buffer.max(1),
            max_connections: config.max_connections,
            connection_semaphore,
            next_session_id: AtomicU64::new(1),
        }
    }
}

/// Build the router serving the event stream at `config.path`
pub fn router(hub: EventHub, config: &ServerConfig) -> Router {
    let state = Arc::new(StreamState::new(hub, config));

    Router::new()
        .route(&config.path, get(stream_events))
        .with_state(state)
}

/// Resumption point from the request headers
///
/// A missing or empty header means no replay. Anything other than an
/// unsigned integer is rejected.
pub fn last_event_id(headers: &HeaderMap) -> Result<Option<u64>> {
    let value = match headers.get(LAST_EVENT_ID) {
        Some(value) => value,
        None => return Ok(None),
    };

    let text = value
        .to_str()
        .map_err(|_| Error::InvalidLastEventId(String::from_utf8_lossy(value.as_bytes()).into_owned()))?
        .trim();

    if text.is_empty() {
        return Ok(None);
    }

    text.parse::<u64>()
        .map(Some)
        .map_err(|_| Error::InvalidLastEventId(text.to_string()))
}

async fn stream_events(State(state): State<Arc<StreamState>>, headers: HeaderMap) -> Result<Response> {
    // Check stream limit
    let permit = match state.connection_semaphore {
        Some(ref sem) => match sem.clone().try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(limit = state.max_connections, "Stream rejected: limit reached");
                return Err(Error::StreamLimit(state.max_connections));
            }
        },
        None => None,
    };

    let last_event_id = last_event_id(&headers).inspect_err(|e| {
        tracing::debug!(error = %e, "Request rejected");
    })?;

    let subscription = state.hub.subscribe(last_event_id).await?;
    let subscriber_id = subscription.id();
    let session_id = state.next_session_id.fetch_add(1, Ordering::Relaxed);

    tracing::debug!(
        session_id = session_id,
        subscriber = subscriber_id,
        last_event_id = ?last_event_id,
        "Stream opened"
    );

    let (writer, reader) = tokio::io::duplex(state.stream_buffer);
    let adapter = DeliveryAdapter::new(state.hub.clone(), subscription, writer);

    tokio::spawn(async move {
        let _permit = permit;
        let end = adapter.run().await;

        tracing::debug!(
            session_id = session_id,
            subscriber = subscriber_id,
            end = ?end,
            "Stream ended"
        );
    });

    let mut response = Response::new(Body::from_stream(ReaderStream::new(reader)));
    let response_headers = response.headers_mut();
    response_headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    response_headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response_headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    for (name, value) in &state.headers {
        response_headers.append(name.clone(), value.clone());
    }

    Ok(response)
}

/// Parse configured extra headers, skipping any that are not valid HTTP
fn extra_headers(headers: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();

    for (name, value) in headers {
        let parsed = HeaderName::try_from(name.as_str())
            .ok()
            .zip(HeaderValue::try_from(value.as_str()).ok());

        match parsed {
            Some((name, value)) => {
                map.append(name, value);
            }
            None => {
                tracing::warn!(name = %name, "Ignoring invalid response header");
            }
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::{Request, StatusCode};
    use futures::StreamExt;
    use tower::ServiceExt;

    use super::*;
    use crate::hub::HubConfig;

    fn request(last_event_id: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/events");
        if let Some(id) = last_event_id {
            builder = builder.header("Last-Event-ID", id);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn read_until(body: Body, needle: &str) -> String {
        let mut stream = body.into_data_stream();
        let read = async {
            let mut text = String::new();
            while !text.contains(needle) {
                let chunk = stream.next().await.expect("stream ended early").unwrap();
                text.push_str(std::str::from_utf8(&chunk).unwrap());
            }
            text
        };

        tokio::time::timeout(Duration::from_secs(5), read)
            .await
            .expect("timed out waiting for stream data")
    }

    async fn wait_for_subscribers(hub: &EventHub, count: usize) {
        for _ in 0..100 {
            if hub.subscriber_count() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(hub.subscriber_count(), count);
    }

    #[test]
    fn test_last_event_id_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(last_event_id(&headers).unwrap(), None);

        headers.insert(LAST_EVENT_ID, HeaderValue::from_static(""));
        assert_eq!(last_event_id(&headers).unwrap(), None);

        headers.insert(LAST_EVENT_ID, HeaderValue::from_static(" 42 "));
        assert_eq!(last_event_id(&headers).unwrap(), Some(42));

        headers.insert(LAST_EVENT_ID, HeaderValue::from_static("-1"));
        assert!(matches!(last_event_id(&headers), Err(Error::InvalidLastEventId(_))));

        headers.insert(LAST_EVENT_ID, HeaderValue::from_static("abc"));
        assert!(matches!(last_event_id(&headers), Err(Error::InvalidLastEventId(_))));
    }

    #[test]
    fn test_extra_headers_skip_invalid() {
        let headers = extra_headers(&[
            ("X-Test".to_string(), "1".to_string()),
            ("bad header".to_string(), "2".to_string()),
        ]);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("x-test").unwrap(), "1");
    }

    #[tokio::test]
    async fn test_stream_with_replay() {
        let hub = EventHub::new();
        for payload in ["a", "b", "c"] {
            hub.publish("t", payload.as_bytes()).await.unwrap();
        }

        let config = ServerConfig::default().header("X-Test", "1");
        let response = router(hub.clone(), &config)
            .oneshot(request(Some("0")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "text/event-stream");
        assert_eq!(response.headers().get(CACHE_CONTROL).unwrap(), "no-cache");
        assert_eq!(response.headers().get("x-test").unwrap(), "1");

        let text = read_until(response.into_body(), "data: c\n\n").await;
        assert!(text.contains("id: 1\nevent: t\ndata: b\n\nid: 2\nevent: t\ndata: c\n\n"));
        assert!(!text.contains("data: a"));

        hub.close().await;
    }

    #[tokio::test]
    async fn test_malformed_last_event_id() {
        let hub = EventHub::new();
        let response = router(hub.clone(), &ServerConfig::default())
            .oneshot(request(Some("nope")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_hub_rejected() {
        let hub = EventHub::new();
        hub.close().await;

        let response = router(hub, &ServerConfig::default())
            .oneshot(request(None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let hub = EventHub::new();
        let response = router(hub.clone(), &ServerConfig::default())
            .oneshot(Request::builder().uri("/other").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_limit() {
        let hub = EventHub::new();
        let app = router(hub.clone(), &ServerConfig::default().max_connections(1));

        let first = app.clone().oneshot(request(None)).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.clone().oneshot(request(None)).await.unwrap();
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(hub.subscriber_count(), 1);

        // Ending the first stream frees its slot
        drop(first);
        hub.publish("t", b"ping").await.unwrap();
        wait_for_subscribers(&hub, 0).await;

        // The permit is released when the delivery task returns
        let mut status = StatusCode::SERVICE_UNAVAILABLE;
        for _ in 0..100 {
            status = app.clone().oneshot(request(None)).await.unwrap().status();
            if status == StatusCode::OK {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_dropped_body_unsubscribes() {
        let hub = EventHub::with_config(HubConfig::default());
        let response = router(hub.clone(), &ServerConfig::default())
            .oneshot(request(None))
            .await
            .unwrap();
        assert_eq!(hub.subscriber_count(), 1);

        drop(response);

        // The next write into the closed pipe fails
        hub.publish("t", b"ping").await.unwrap();
        wait_for_subscribers(&hub, 0).await;
        assert_eq!(hub.stats().await.subscribers_stale, 1);
    }

    #[tokio::test]
    async fn test_close_ends_body() {
        let hub = EventHub::new();
        let response = router(hub.clone(), &ServerConfig::default())
            .oneshot(request(None))
            .await
            .unwrap();

        hub.publish("t", b"last").await.unwrap();
        hub.close().await;

        let mut stream = response.into_body().into_data_stream();
        let mut text = String::new();
        let drain = async {
            while let Some(chunk) = stream.next().await {
                text.push_str(std::str::from_utf8(&chunk.unwrap()).unwrap());
            }
        };
        tokio::time::timeout(Duration::from_secs(5), drain)
            .await
            .expect("body not ended on close");

        assert_eq!(text, "id: 0\nevent: t\ndata: last\n\n");
    }
}
