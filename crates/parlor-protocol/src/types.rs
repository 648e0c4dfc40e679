//! Core protocol types: everything that travels on the wire.
//!
//! The wire format is flat JSON with a `type` discriminator and camelCase
//! fields, e.g. `{"type":"c2s:ready","ready":true,"seq":4}`. Client and
//! server messages are closed tagged unions — an unrecognized `type` tag
//! fails to decode, there is no catch-all variant.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A player's identifier — the connection id assigned by the transport.
///
/// A reconnecting client presents the same id, which is how a room
/// recognizes it and reuses the existing roster record. Serialized as a
/// plain JSON string.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Borrows the raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Room phase
// ---------------------------------------------------------------------------

/// The room's top-level state.
///
/// Transitions are strictly ordered — lobby → countdown → playing →
/// results → lobby — with teardown possible from any phase once the
/// roster empties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomPhase {
    Lobby,
    Countdown,
    Playing,
    Results,
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobby => write!(f, "lobby"),
            Self::Countdown => write!(f, "countdown"),
            Self::Playing => write!(f, "playing"),
            Self::Results => write!(f, "results"),
        }
    }
}

// ---------------------------------------------------------------------------
// Roster and results
// ---------------------------------------------------------------------------

/// One roster entry as shown to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub ready: bool,
    pub connected: bool,
}

/// One player's outcome of a finished game.
///
/// `player_name` is a snapshot taken when results were computed, not a
/// live reference into the roster. Ranks are dense and 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    pub player_id: PlayerId,
    pub player_name: String,
    pub score: i64,
    pub rank: u32,
    /// Free-form per-game diagnostics (WPM, false starts, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<serde_json::Map<String, serde_json::Value>>,
}

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// Machine-readable codes carried by `s2c:error`.
///
/// All of these are recoverable — the sender can retry a corrected
/// action. None terminate the room or the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Unparseable frame or schema-invalid message.
    InvalidMessage,
    /// A non-host attempted a host-only action.
    NotHost,
    /// `start_game` without a selected game.
    NoGame,
    /// `start_game` while a connected player is not ready.
    NotReady,
    /// Connected player count below the game's minimum.
    TooFewPlayers,
    /// Connected player count above the game's maximum.
    TooManyPlayers,
    /// The selected game id is not in the registry. Broadcast room-wide,
    /// since it reflects a room-level configuration problem.
    UnknownGame,
}

// ---------------------------------------------------------------------------
// Client → room
// ---------------------------------------------------------------------------

/// Messages a client can send to its room.
///
/// Decoding doubles as structural validation: a frame that is missing a
/// required field, carries the wrong type, or names an unknown kind is
/// rejected at the boundary with `INVALID_MESSAGE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Informational — the actual join is driven by connection
    /// establishment, not by this message.
    #[serde(rename = "c2s:join_room")]
    JoinRoom { player_name: String },

    #[serde(rename = "c2s:leave_room")]
    LeaveRoom,

    #[serde(rename = "c2s:select_game")]
    SelectGame { game_id: String },

    #[serde(rename = "c2s:ready")]
    Ready { ready: bool },

    #[serde(rename = "c2s:start_game")]
    StartGame,

    /// Opaque per-game input. `payload` is interpreted (and validated)
    /// by the active game module alone.
    #[serde(rename = "c2s:game_input")]
    GameInput {
        game_id: String,
        payload: serde_json::Value,
    },

    /// Replaces the room's game settings wholesale.
    #[serde(rename = "c2s:game_settings")]
    GameSettings {
        game_id: String,
        settings: serde_json::Map<String, serde_json::Value>,
    },

    #[serde(rename = "c2s:return_to_lobby")]
    ReturnToLobby,
}

// ---------------------------------------------------------------------------
// Room → clients
// ---------------------------------------------------------------------------

/// Messages a room sends to its clients.
///
/// Every outbound message is wrapped in [`Sequenced`] before encoding, so
/// the wire shape always carries the room's `seq` counter alongside the
/// tagged body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Full room snapshot, personalized per recipient via `your_id`.
    #[serde(rename = "s2c:room_state")]
    RoomState {
        room_code: String,
        phase: RoomPhase,
        players: Vec<PlayerInfo>,
        host_id: Option<PlayerId>,
        selected_game_id: Option<String>,
        session_scores: BTreeMap<PlayerId, i64>,
        game_settings: serde_json::Map<String, serde_json::Value>,
        your_id: PlayerId,
    },

    #[serde(rename = "s2c:game_starting")]
    GameStarting {
        game_id: String,
        config: serde_json::Value,
        countdown_secs: u32,
    },

    #[serde(rename = "s2c:game_state")]
    GameState {
        game_id: String,
        state: serde_json::Value,
        is_delta: bool,
    },

    #[serde(rename = "s2c:game_over")]
    GameOver {
        game_id: String,
        results: Vec<GameResult>,
    },

    /// Sent only to the offending connection, except for `UNKNOWN_GAME`
    /// which is broadcast.
    #[serde(rename = "s2c:error")]
    Error { code: ErrorCode, message: String },
}

/// An outbound message stamped with the room's monotonic sequence number.
///
/// `seq` starts at 0 and increments once per logical outbound message —
/// a personalized broadcast spends a single number even though each
/// recipient gets its own frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequenced {
    pub seq: u64,
    #[serde(flatten)]
    pub msg: ServerMessage,
}

// =========================================================================
// Tests
// =========================================================================
