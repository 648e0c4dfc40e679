//! Room manager: looks up or spawns room actors by room code.

use std::collections::HashMap;
use std::sync::Arc;

use parlor_game::MonotonicClock;

use crate::session::spawn_room;
use crate::RoomHandle;

/// Tracks all live rooms on this server, keyed by room code.
///
/// The first connection for a code spawns the room; later connections
/// for the same code attach to the running actor. A room that tore down
/// (roster emptied) is replaced on the next attach.
pub struct RoomManager {
    rooms: HashMap<String, RoomHandle>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    /// Returns the handle for `code`, spawning a fresh room if none is
    /// running. Each room gets its own monotonic clock anchored at
    /// creation.
    pub fn get_or_create(&mut self, code: &str) -> RoomHandle {
        if let Some(handle) = self.rooms.get(code) {
            if !handle.is_closed() {
                return handle.clone();
            }
            tracing::debug!(room = code, "room had torn down, respawning");
        }
        let handle = spawn_room(code.to_owned(), Arc::new(MonotonicClock::new()));
        self.rooms.insert(code.to_owned(), handle.clone());
        handle
    }

    /// Drops handles whose rooms have stopped.
    pub fn prune(&mut self) {
        self.rooms.retain(|_, handle| !handle.is_closed());
    }

    /// Number of tracked rooms (including any not yet pruned).
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}
