//! SSE server listener
//!
//! Binds the stream router to a TCP listener. Accepting connections, HTTP
//! parsing and connection-level errors are left to `axum::serve`.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

use crate::error::Result;
use crate::hub::EventHub;
use crate::server::config::ServerConfig;
use crate::server::routes;

/// Server-Sent Events server backed by one [`EventHub`]
pub struct SseServer {
    config: ServerConfig,
    hub: EventHub,
}

impl SseServer {
    /// Create a new server streaming events from `hub`
    pub fn new(config: ServerConfig, hub: EventHub) -> Self {
        Self { config, hub }
    }

    /// Get the hub this server streams from
    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Router serving the event stream, for mounting into a larger app
    pub fn router(&self) -> Router {
        routes::router(self.hub.clone(), &self.config)
    }

    /// Run the server
    ///
    /// This method blocks until serving fails irrecoverably.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, path = %self.config.path, "SSE server listening");

        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    /// Run the server until `shutdown` resolves, then close the hub
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, path = %self.config.path, "SSE server listening");

        self.serve(listener, shutdown).await
    }

    /// Serve connections from an already bound listener until `shutdown`
    /// resolves
    ///
    /// The hub is closed as soon as `shutdown` fires so that every open
    /// stream drains its mailbox and ends; the call returns once they have.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let hub = self.hub.clone();
        let signal = async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");

            // Ends every delivery task once its mailbox drains
            hub.close().await;
        };

        axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .await?;

        // Covers a server that stopped without the signal firing
        self.hub.close().await;
        Ok(())
    }
}
