//! `KnockoutServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → room.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use knockout_protocol::{Codec, JsonCodec};
use knockout_room::{RoomConfig, RoomManager};
use knockout_transport::{Transport, WebSocketTransport};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::KnockoutError;
use crate::handler::handle_connection;

/// Server-wide settings, fixed once the server is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Room a client lands in when `CONNECT` names none.
    pub default_room: String,
    /// Settings every room is created with.
    pub room_config: RoomConfig,
    /// How long a new connection has to send `CONNECT`.
    pub handshake_timeout: Duration,
    /// A connected client that sends nothing for this long is dropped.
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_room: "arena".to_string(),
            room_config: RoomConfig::default(),
            handshake_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) rooms: Mutex<RoomManager>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Knockout server.
///
/// # Example
///
/// ```rust,no_run
/// use knockout::prelude::*;
///
/// # async fn start() -> Result<(), KnockoutError> {
/// let server = KnockoutServer::builder()
///     .bind("0.0.0.0:8080")
///     .room_config(RoomConfig {
///         style: PlayStyle::TurnBased,
///         ..RoomConfig::default()
///     })
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct KnockoutServerBuilder {
    bind_addr: String,
    config: ServerConfig,
}

impl KnockoutServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn default_room(mut self, name: &str) -> Self {
        self.config.default_room = name.to_string();
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.config.room_config = config;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Binds the listener. Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<KnockoutServer<JsonCodec>, KnockoutError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            rooms: Mutex::new(RoomManager::new(self.config.room_config.clone())),
            codec: JsonCodec,
            config: self.config,
        });

        Ok(KnockoutServer { transport, state })
    }
}

impl Default for KnockoutServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Knockout server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct KnockoutServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl KnockoutServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> KnockoutServerBuilder {
        KnockoutServerBuilder::new()
    }
}

impl<C: Codec> KnockoutServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, KnockoutError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the accept loop until the process is terminated.
    ///
    /// Each accepted connection gets its own handler task; a failed accept
    /// is logged and the loop carries on.
    pub async fn run(mut self) -> Result<(), KnockoutError> {
        tracing::info!(
            default_room = %self.state.config.default_room,
            style = ?self.state.config.room_config.style,
            "Knockout server running"
        );

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
