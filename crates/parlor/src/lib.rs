//! WebSocket front end for Parlor.
//!
//! Clients connect to `ws://host/room/<CODE>?id=<id>&name=<name>`. The
//! front end resolves the room actor for the code (spawning it on first
//! contact), then pumps raw text frames inward and the room's sequenced
//! broadcasts outward. Everything stateful lives in the room actors —
//! this layer only owns sockets.

mod error;
mod handler;
mod server;

pub use error::ParlorError;
pub use server::{ParlorServer, ParlorServerBuilder};
