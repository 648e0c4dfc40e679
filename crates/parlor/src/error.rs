//! Error types for the server front end.

/// Errors that can occur while serving connections.
#[derive(Debug, thiserror::Error)]
pub enum ParlorError {
    /// Socket-level I/O failure (bind, accept).
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// WebSocket handshake or framing failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The player's room went away mid-conversation.
    #[error(transparent)]
    Room(#[from] parlor_room::RoomError),
}
