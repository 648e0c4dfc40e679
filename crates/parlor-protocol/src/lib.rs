//! Wire protocol for Parlor.
//!
//! This crate defines the "language" that clients and rooms speak:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`RoomPhase`], etc.) —
//!   the closed set of message shapes that travel on the wire.
//! - **Validation** ([`decode_client_message`], [`sanitize_name`]) — the
//!   single place where untrusted text becomes typed messages.
//! - **Room codes** ([`room_code`]) — short join codes without
//!   easily-confused letters.
//!
//! The protocol layer knows nothing about sockets or rooms — it only
//! defines shapes and how raw frames are narrowed into them.

mod error;
mod types;
mod validate;

pub mod room_code;

pub use error::ProtocolError;
pub use types::{
    ClientMessage, ErrorCode, GameResult, PlayerId, PlayerInfo, RoomPhase,
    Sequenced, ServerMessage,
};
pub use validate::{decode_client_message, default_name, sanitize_name, MAX_NAME_LEN};
