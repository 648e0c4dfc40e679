//! The `GameModule` trait — the contract every mini-game implements.
//!
//! The room session calls these methods at the right time; the module
//! just encodes one game's rules. Game state is a type-erased box the
//! room stores but never inspects: every lifecycle call consumes the box
//! and returns it (possibly mutated), so the module's internal
//! representation is invisible to the room.
//!
//! A module must treat every input as possibly adversarial: `on_input`
//! validates the payload shape itself and hands the state back unchanged
//! for malformed payloads, unknown players, or duplicate submissions —
//! input handling is idempotent against retries by construction.

use std::any::Any;

use parlor_protocol::{GameResult, PlayerId, PlayerInfo};
use serde_json::Value;

use crate::Clock;

/// Opaque game state. Only the owning module knows the concrete type;
/// it downcasts on every call and returns foreign boxes untouched.
pub type GameState = Box<dyn Any + Send>;

/// How a game is driven once playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingMode {
    /// Advances only on player input; no tick loop runs.
    TurnBased,
    /// Driven by the room's tick/broadcast loops.
    Realtime,
}

/// Timing limits for one game.
#[derive(Debug, Clone, Copy)]
pub struct GameTiming {
    pub mode: TimingMode,
    /// Simulation rate in Hz. 0 for turn-based games.
    pub tick_hz: u32,
    /// State fan-out rate in Hz, independent of (and usually below) the
    /// tick rate. 0 for turn-based games.
    pub broadcast_hz: u32,
    /// Maximum game duration in seconds.
    pub max_duration_secs: u64,
}

/// Static metadata registered for one game id.
#[derive(Debug, Clone, Copy)]
pub struct GameMeta {
    pub game_id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub min_players: usize,
    pub max_players: usize,
    pub timing: GameTiming,
}

/// The client-facing projection produced by [`GameModule::serialize`].
#[derive(Debug, Clone)]
pub struct Serialized {
    pub data: Value,
    /// `true` when `data` is a patch against the previously broadcast
    /// payload rather than a full snapshot. Neither reference module
    /// emits deltas; this is an extension point.
    pub is_delta: bool,
}

impl Serialized {
    /// A full (non-delta) snapshot.
    pub fn full(data: Value) -> Self {
        Self {
            data,
            is_delta: false,
        }
    }
}

/// One mini-game's rules.
pub trait GameModule: Send {
    /// Static metadata for this game.
    fn meta(&self) -> &'static GameMeta;

    /// Builds the initial state for the given (connected) players and
    /// room settings. The returned `Value` is the config revealed to
    /// clients up front; it must not leak information that would give a
    /// client an unearned advantage.
    fn init(
        &mut self,
        players: &[PlayerInfo],
        settings: &serde_json::Map<String, Value>,
        clock: &dyn Clock,
    ) -> (GameState, Value);

    /// Applies one player's input. Returns the state unchanged if the
    /// payload is malformed, the player is unknown, or the player has
    /// already completed this turn/round.
    fn on_input(
        &mut self,
        state: GameState,
        player: &PlayerId,
        payload: &Value,
        clock: &dyn Clock,
    ) -> GameState;

    /// Advances the simulation by `dt` seconds. Only called for
    /// realtime games. Must tolerate accumulation: one call with the
    /// total elapsed time is equivalent to many smaller calls.
    fn tick(&mut self, state: GameState, dt: f64, clock: &dyn Clock) -> GameState {
        let _ = (dt, clock);
        state
    }

    /// Produces the client-facing projection of `state`. `prev` is the
    /// previously broadcast payload, the only thing a delta could
    /// legally patch. Returning a full snapshot is always correct.
    fn serialize(&self, state: &GameState, prev: Option<&Value>) -> Serialized;

    /// Whether the game has ended. Must stay `true` once `true` for the
    /// rest of this game instance.
    fn is_game_over(&self, state: &GameState, clock: &dyn Clock) -> bool;

    /// Final results. Ranks form a dense sequence starting at 1; ties
    /// resolve by the module's documented ordering.
    fn results(&self, state: &GameState) -> Vec<GameResult>;

    /// Neutralizes a player who dropped mid-game (auto-finish,
    /// auto-timeout) without removing them from the ranking.
    fn on_player_disconnect(
        &mut self,
        state: GameState,
        player: &PlayerId,
        clock: &dyn Clock,
    ) -> GameState {
        let _ = (player, clock);
        state
    }

    /// Restores a player who reconnected mid-game. Must not re-enter
    /// them into a round that already resolved.
    fn on_player_reconnect(
        &mut self,
        state: GameState,
        player: &PlayerId,
        clock: &dyn Clock,
    ) -> GameState {
        let _ = (player, clock);
        state
    }

    /// Releases any resources. Called exactly once, when the game ends
    /// or the room tears down mid-game.
    fn dispose(&mut self) {}
}
