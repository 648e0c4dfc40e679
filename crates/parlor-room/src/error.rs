//! Error types for the room layer.

/// Errors that can occur when talking to a room actor.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room's command channel is closed — the room has torn down.
    #[error("room {0} is unavailable")]
    Unavailable(String),
}
