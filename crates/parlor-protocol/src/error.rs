//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON, or does not match any known
    /// message kind (unknown `type` tag, wrong or missing fields).
    #[error("invalid message: {0}")]
    Decode(serde_json::Error),

    /// Serialization of an outbound message failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),
}
