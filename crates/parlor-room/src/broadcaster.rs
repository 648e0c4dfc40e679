//! Sequence-stamped fan-out to a room's connections.
//!
//! Every outbound message spends exactly one sequence number, including
//! personalized `room_state` fan-outs where each recipient gets its own
//! frame — clients use the shared `seq` to detect gaps or reordering.
//! Sends are fire-and-forget: a dead receiver is dropped silently and
//! cleaned up on disconnect.

use std::collections::HashMap;

use parlor_protocol::{PlayerId, Sequenced, ServerMessage};
use tokio::sync::mpsc;
use tracing::warn;

/// Channel over which a connection receives its encoded frames.
pub type OutboundSender = mpsc::UnboundedSender<String>;

/// Per-room outbound state: who is reachable, and the `seq` counter.
pub struct Broadcaster {
    senders: HashMap<PlayerId, OutboundSender>,
    seq: u64,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            senders: HashMap::new(),
            seq: 0,
        }
    }

    /// Registers (or replaces) the outbound channel for a player.
    pub fn register(&mut self, id: PlayerId, sender: OutboundSender) {
        self.senders.insert(id, sender);
    }

    /// Removes a player's outbound channel.
    pub fn unregister(&mut self, id: &PlayerId) {
        self.senders.remove(id);
    }

    /// The next sequence number that will be spent.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Sends one message to a single player.
    pub fn send_to(&mut self, id: &PlayerId, msg: ServerMessage) {
        let seq = self.stamp();
        if let Some(tx) = self.senders.get(id) {
            if let Some(text) = encode(seq, msg) {
                let _ = tx.send(text);
            }
        }
    }

    /// Sends one message to every connection in the room.
    pub fn broadcast(&mut self, msg: ServerMessage) {
        let seq = self.stamp();
        let Some(text) = encode(seq, msg) else { return };
        for tx in self.senders.values() {
            let _ = tx.send(text.clone());
        }
    }

    /// Sends a per-recipient message built by `f`, spending a single
    /// sequence number for the whole fan-out.
    pub fn broadcast_with(&mut self, f: impl Fn(&PlayerId) -> ServerMessage) {
        let seq = self.stamp();
        for (id, tx) in &self.senders {
            if let Some(text) = encode(seq, f(id)) {
                let _ = tx.send(text);
            }
        }
    }

    fn stamp(&mut self) -> u64 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(seq: u64, msg: ServerMessage) -> Option<String> {
    match serde_json::to_string(&Sequenced { seq, msg }) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(error = %e, "failed to encode outbound message");
            None
        }
    }
}
