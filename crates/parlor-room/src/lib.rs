//! Room lifecycle for Parlor.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns the
//! authoritative phase, roster, selected game, settings, per-player
//! session scores and — while a game is live — the opaque game state.
//! All mutation happens inside the actor's command/timer loop, so a room
//! is race-free by construction; rooms share nothing with each other.
//!
//! # Key types
//!
//! - [`RoomHandle`] — send connects, frames, and disconnects to a room
//! - [`RoomManager`] — room-code → handle registry with get-or-spawn
//! - [`Broadcaster`] — sequence-stamped fan-out to the room's connections

mod broadcaster;
mod error;
mod manager;
mod session;

pub use broadcaster::{Broadcaster, OutboundSender};
pub use error::RoomError;
pub use manager::RoomManager;
pub use session::{spawn_room, RoomHandle, COUNTDOWN_SECS};
