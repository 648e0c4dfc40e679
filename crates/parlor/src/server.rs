//! `ParlorServer` builder and accept loop.

use std::sync::Arc;

use parlor_room::RoomManager;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::ParlorError;

/// Shared server state handed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) rooms: Mutex<RoomManager>,
}

/// Builder for configuring and starting a Parlor server.
///
/// # Example
///
/// ```rust,no_run
/// use parlor::ParlorServer;
///
/// # async fn run() -> Result<(), parlor::ParlorError> {
/// let server = ParlorServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ParlorServerBuilder {
    bind_addr: String,
}

impl ParlorServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }

    /// Sets the address to bind to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Binds the listener and builds the server.
    pub async fn build(self) -> Result<ParlorServer, ParlorError> {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        tracing::info!(addr = %self.bind_addr, "parlor server listening");
        Ok(ParlorServer {
            listener,
            state: Arc::new(ServerState {
                rooms: Mutex::new(RoomManager::new()),
            }),
        })
    }
}

impl Default for ParlorServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Parlor server.
pub struct ParlorServer {
    listener: TcpListener,
    state: Arc<ServerState>,
}

impl ParlorServer {
    /// Creates a new builder.
    pub fn builder() -> ParlorServerBuilder {
        ParlorServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop: one spawned handler task per connection.
    /// Runs until the process terminates.
    pub async fn run(self) -> Result<(), ParlorError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    tracing::debug!(%addr, "accepted connection");
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, state).await {
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
