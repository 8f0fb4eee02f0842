//! `VeilroomServer` builder and server loop.
//!
//! This is the entry point for running a relay. It ties together all the
//! layers: transport → protocol → hub (sessions + rooms).

use std::sync::Arc;

use tokio::sync::Mutex;
use veilroom_protocol::{Codec, JsonCodec};
use veilroom_room::KeyStrategy;
use veilroom_transport::{DEFAULT_MAX_LINE_BYTES, TcpLineTransport, Transport};
#[cfg(feature = "websocket")]
use veilroom_transport::WebSocketTransport;

use crate::handler::handle_connection;
use crate::{Hub, RelayConfig, RelayError, RelayMode};

/// The address the relay listens on unless told otherwise.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:1337";

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The hub is
/// the only mutable part, and every operation on it holds the lock for
/// its whole (synchronous) duration.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) hub: Mutex<Hub>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Veilroom relay.
///
/// # Example
///
/// ```rust,no_run
/// use veilroom::prelude::*;
///
/// # async fn run() -> Result<(), RelayError> {
/// let server = VeilroomServer::builder()
///     .bind("0.0.0.0:1337")
///     .relay_mode(RelayMode::Addressed)
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct VeilroomServerBuilder {
    bind_addr: String,
    relay_config: RelayConfig,
    max_line_bytes: usize,
}

impl VeilroomServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            relay_config: RelayConfig::default(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Replaces the whole relay configuration.
    pub fn relay_config(mut self, config: RelayConfig) -> Self {
        self.relay_config = config;
        self
    }

    /// Sets the relay mode.
    pub fn relay_mode(mut self, mode: RelayMode) -> Self {
        self.relay_config.relay_mode = mode;
        self
    }

    /// Sets the key distribution strategy.
    pub fn key_strategy(mut self, strategy: KeyStrategy) -> Self {
        self.relay_config.key_strategy = strategy;
        self
    }

    /// Rejects `username` commands that carry no public key.
    pub fn require_public_key(mut self, required: bool) -> Self {
        self.relay_config.require_public_key = required;
        self
    }

    /// Caps the length of one line on the TCP transport. Longer lines
    /// end the connection.
    pub fn max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = max;
        self
    }

    /// Binds a newline-delimited TCP listener and returns the server.
    pub async fn build(
        self,
    ) -> Result<VeilroomServer<TcpLineTransport, JsonCodec>, RelayError> {
        let transport =
            TcpLineTransport::bind(&self.bind_addr, self.max_line_bytes).await?;
        Ok(VeilroomServer {
            transport,
            state: self.into_state(),
        })
    }

    /// Binds a WebSocket listener (one record per frame) and returns the
    /// server.
    #[cfg(feature = "websocket")]
    pub async fn build_websocket(
        self,
    ) -> Result<VeilroomServer<WebSocketTransport, JsonCodec>, RelayError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        Ok(VeilroomServer {
            transport,
            state: self.into_state(),
        })
    }

    fn into_state(self) -> Arc<ServerState<JsonCodec>> {
        tracing::info!(
            relay_mode = ?self.relay_config.relay_mode,
            key_strategy = ?self.relay_config.key_strategy,
            require_public_key = self.relay_config.require_public_key,
            "relay configured"
        );
        Arc::new(ServerState {
            hub: Mutex::new(Hub::new(self.relay_config)),
            codec: JsonCodec,
        })
    }
}

impl Default for VeilroomServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Veilroom relay.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct VeilroomServer<T: Transport, C: Codec> {
    transport: T,
    state: Arc<ServerState<C>>,
}

impl VeilroomServer<TcpLineTransport, JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> VeilroomServerBuilder {
        VeilroomServerBuilder::new()
    }
}

impl<T, C> VeilroomServer<T, C>
where
    T: Transport,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), RelayError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Veilroom relay running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
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
