//! `RelayServer` builder and accept loop.
//!
//! The relay is the meeting point for participants that can't reach each
//! other directly. It tracks which connection is in which room and
//! forwards every frame to the other members of the sender's room. All
//! timer logic stays on the participants.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use summsync_protocol::{JsonCodec, RoomId};
use summsync_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::registry::Registry;
use crate::{RelayConfig, SummsyncError};

/// Shared relay state passed to each connection handler task.
pub(crate) struct RelayState {
    pub(crate) registry: Mutex<Registry>,
    pub(crate) codec: JsonCodec,
    pub(crate) idle_timeout: Duration,
    pub(crate) outbound_buffer: usize,
}

/// Builder for configuring and starting a relay.
///
/// # Example
///
/// ```rust,no_run
/// use summsync::prelude::*;
///
/// # async fn run() -> Result<(), SummsyncError> {
/// let server = RelayServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RelayServerBuilder {
    config: RelayConfig,
}

impl RelayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every setting at once, e.g. with [`RelayConfig::from_env`].
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets how long a silent connection is kept.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Binds the listener.
    pub async fn build(self) -> Result<RelayServer, SummsyncError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        let state = Arc::new(RelayState {
            registry: Mutex::new(Registry::new()),
            codec: JsonCodec,
            idle_timeout: self.config.idle_timeout,
            outbound_buffer: self.config.outbound_buffer.max(1),
        });
        Ok(RelayServer { transport, state })
    }
}

/// A bound relay. Call [`run()`](Self::run) to start accepting.
pub struct RelayServer {
    transport: WebSocketTransport,
    state: Arc<RelayState>,
}

impl RelayServer {
    /// Creates a new builder.
    pub fn builder() -> RelayServerBuilder {
        RelayServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle for inspecting rooms while [`run()`](Self::run) owns the
    /// server.
    pub fn handle(&self) -> RelayHandle {
        RelayHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Runs the accept loop, spawning a handler task per connection.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), SummsyncError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "relay running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Read-only view of a running relay's rooms.
#[derive(Clone)]
pub struct RelayHandle {
    state: Arc<RelayState>,
}

impl RelayHandle {
    /// Number of rooms with at least one member.
    pub async fn room_count(&self) -> usize {
        self.state.registry.lock().await.room_count()
    }

    /// Number of connections currently in `room_id`.
    pub async fn member_count(&self, room_id: &RoomId) -> usize {
        self.state.registry.lock().await.member_count(room_id)
    }
}
