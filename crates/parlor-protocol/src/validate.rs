//! Boundary validation: raw frames into typed messages, raw names into
//! displayable ones.
//!
//! Inbound frames are decoded exactly once, here. Everything past this
//! point works with [`ClientMessage`] and never re-inspects raw JSON,
//! except for game-input payloads, which stay opaque until the active
//! game module validates them itself.

use crate::{ClientMessage, PlayerId, ProtocolError};

/// Maximum length of a display name, in characters.
pub const MAX_NAME_LEN: usize = 20;

/// Decodes a raw text frame into a [`ClientMessage`].
///
/// # Errors
/// Returns [`ProtocolError::Decode`] for unparseable JSON, an unknown
/// `type` tag, or wrong/missing fields for the tagged kind. The caller
/// answers with an `INVALID_MESSAGE` error to the sender only.
pub fn decode_client_message(raw: &str) -> Result<ClientMessage, ProtocolError> {
    serde_json::from_str(raw).map_err(ProtocolError::Decode)
}

/// Sanitizes a player-supplied display name.
///
/// Keeps word characters, whitespace, and hyphens; trims the ends; caps
/// at [`MAX_NAME_LEN`] characters. Idempotent. May return an empty
/// string — callers fall back to [`default_name`].
pub fn sanitize_name(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    kept.trim().chars().take(MAX_NAME_LEN).collect()
}

/// Generated fallback name for players whose sanitized name is empty.
pub fn default_name(id: &PlayerId) -> String {
    let short: String = id.as_str().chars().take(4).collect();
    format!("Player {short}")
}
