//! End-to-end tests over real TCP connections
//!
//! Stream bodies arrive chunk-encoded, so assertions look for whole frames
//! rather than exact byte runs spanning several events.

use std::net::SocketAddr;
use std::time::Duration;

use sse_hub::{EventHub, HubConfig, ServerConfig, SseServer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct TestServer {
    addr: SocketAddr,
    hub: EventHub,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<sse_hub::Result<()>>,
}

impl TestServer {
    async fn start(hub_config: HubConfig) -> Self {
        init_tracing();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hub = EventHub::with_config(hub_config);
        let server = SseServer::new(ServerConfig::with_addr(addr), hub.clone());
        let (tx, rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            server
                .serve(listener, async move {
                    let _ = rx.await;
                })
                .await
        });

        Self {
            addr,
            hub,
            shutdown: Some(tx),
            task,
        }
    }

    async fn connect(&self, last_event_id: Option<&str>) -> TcpStream {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        let mut request = String::from("GET /events HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\nConnection: close\r\n");
        if let Some(id) = last_event_id {
            request.push_str(&format!("Last-Event-ID: {}\r\n", id));
        }
        request.push_str("\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        stream
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task.await.unwrap().unwrap();
    }
}

async fn read_until(stream: &mut TcpStream, needle: &[u8]) -> String {
    let read = async {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(needle.len()).any(|w| w == needle) {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed early: {:?}", String::from_utf8_lossy(&buf));
            buf.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8(buf).unwrap()
    };

    tokio::time::timeout(Duration::from_secs(5), read)
        .await
        .expect("timed out waiting for stream data")
}

#[tokio::test]
async fn test_live_events_reach_every_client() {
    let server = TestServer::start(HubConfig::default()).await;

    let mut first = server.connect(None).await;
    let mut second = server.connect(None).await;
    read_until(&mut first, b"\r\n\r\n").await;
    read_until(&mut second, b"\r\n\r\n").await;
    assert_eq!(server.hub.subscriber_count(), 2);

    server.hub.publish("message", b"x").await.unwrap();

    let expected = "id: 0\nevent: message\ndata: x\n\n";
    assert!(read_until(&mut first, expected.as_bytes()).await.contains(expected));
    assert!(read_until(&mut second, expected.as_bytes()).await.contains(expected));

    server.stop().await;
}

#[tokio::test]
async fn test_reconnect_resumes_from_last_event_id() {
    let server = TestServer::start(HubConfig::default().history_capacity(3)).await;

    for payload in ["a", "b", "c", "d"] {
        server.hub.publish("t", payload.as_bytes()).await.unwrap();
    }

    let mut resumed = server.connect(Some("1")).await;
    let text = read_until(&mut resumed, b"data: d\n\n").await;
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains("content-type: text/event-stream\r\n"));
    let second = text.find("id: 2\nevent: t\ndata: c\n\n").expect("id 2 replayed");
    let third = text.find("id: 3\nevent: t\ndata: d\n\n").expect("id 3 replayed");
    assert!(second < third);
    assert!(!text.contains("data: b"));

    // live events continue after the replay
    server.hub.publish("t", b"e").await.unwrap();
    read_until(&mut resumed, b"id: 4\nevent: t\ndata: e\n\n").await;

    server.stop().await;
}

#[tokio::test]
async fn test_malformed_last_event_id_is_rejected() {
    let server = TestServer::start(HubConfig::default()).await;

    let mut client = server.connect(Some("not-a-number")).await;
    let mut response = String::new();
    client.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert_eq!(server.hub.subscriber_count(), 0);

    server.stop().await;
}

#[tokio::test]
async fn test_disconnected_client_is_unsubscribed() {
    let server = TestServer::start(HubConfig::default()).await;

    let mut client = server.connect(None).await;
    read_until(&mut client, b"\r\n\r\n").await;
    assert_eq!(server.hub.subscriber_count(), 1);
    drop(client);

    // Writes to a closed peer fail after the first RST comes back
    for _ in 0..100 {
        if server.hub.subscriber_count() == 0 {
            break;
        }
        server.hub.publish("t", b"ping").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(server.hub.subscriber_count(), 0);
    assert_eq!(server.hub.stats().await.subscribers_stale, 1);

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_ends_streams() {
    let server = TestServer::start(HubConfig::default()).await;

    let mut client = server.connect(None).await;
    read_until(&mut client, b"\r\n\r\n").await;
    let hub = server.hub.clone();

    server.stop().await;
    assert!(hub.is_closed().await);

    let mut rest = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut rest))
        .await
        .expect("stream not closed on shutdown")
        .unwrap();
}
