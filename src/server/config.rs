//! Server configuration

use std::net::SocketAddr;

/// Default route serving the event stream
pub const DEFAULT_STREAM_PATH: &str = "/events";

/// Default size of the in-memory pipe between a delivery task and its response body
pub const DEFAULT_STREAM_BUFFER: usize = 16 * 1024;

/// SSE server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Route serving the event stream
    pub path: String,

    /// Maximum concurrent streams (0 = unlimited)
    pub max_connections: usize,

    /// Bytes a stream may buffer before writes wait on the client
    pub stream_buffer: usize,

    /// Extra headers sent with every stream response
    pub headers: Vec<(String, String)>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            path: DEFAULT_STREAM_PATH.to_string(),
            max_connections: 0, // Unlimited
            stream_buffer: DEFAULT_STREAM_BUFFER,
            headers: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the stream route
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set maximum concurrent streams
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the per-stream buffer size (minimum 1 byte)
    pub fn stream_buffer(mut self, size: usize) -> Self {
        self.stream_buffer = size.max(1);
        self
    }

    /// Add a header to every stream response
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}
