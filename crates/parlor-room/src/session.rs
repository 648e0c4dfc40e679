//! Room session actor: one Tokio task that owns everything about a room.
//!
//! The actor is fed raw text frames by the transport; it narrows them
//! through the protocol validator, dispatches to a handler, and fans the
//! resulting messages out through the [`Broadcaster`]. Phase transitions
//! follow a strict cycle — lobby → countdown → playing → results → lobby
//! — with teardown from any phase once the roster empties.
//!
//! Every transition that starts a timer first cancels the timers of the
//! phase it leaves, so at most one live timer of each kind exists per
//! room and a stale countdown or tick can never fire a duplicate
//! transition.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parlor_game::{registry, Clock, GameModule, GameState, TimingMode};
use parlor_protocol::{
    decode_client_message, default_name, sanitize_name, ClientMessage, ErrorCode,
    PlayerInfo, PlayerId, RoomPhase, ServerMessage,
};
use parlor_tick::{Due, Scheduler};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{Broadcaster, OutboundSender, RoomError};

/// Fixed length of the pre-game countdown, in seconds.
pub const COUNTDOWN_SECS: u32 = 3;

/// Command channel depth per room.
const CHANNEL_SIZE: usize = 64;

/// Commands delivered to a room actor by the transport layer.
pub(crate) enum RoomCommand {
    /// A connection (new or reconnecting) attached to this room.
    Connect {
        player_id: PlayerId,
        name: String,
        sender: OutboundSender,
    },
    /// A raw text frame from a connection.
    Frame { sender: PlayerId, text: String },
    /// A connection closed.
    Disconnect { player_id: PlayerId },
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    room_code: String,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// The room's join code.
    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    /// Registers a connection with the room.
    pub async fn connect(
        &self,
        player_id: PlayerId,
        name: String,
        sender: OutboundSender,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::Connect {
            player_id,
            name,
            sender,
        })
        .await
    }

    /// Delivers a raw inbound frame (fire-and-forget).
    pub async fn frame(&self, sender: PlayerId, text: String) -> Result<(), RoomError> {
        self.send(RoomCommand::Frame { sender, text }).await
    }

    /// Reports that a connection closed.
    pub async fn disconnect(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.send(RoomCommand::Disconnect { player_id }).await
    }

    /// `true` once the room actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code.clone()))
    }
}

/// Spawns a new room actor task and returns a handle to it.
pub fn spawn_room(room_code: String, clock: Arc<dyn Clock>) -> RoomHandle {
    let (tx, rx) = mpsc::channel(CHANNEL_SIZE);

    let session = RoomSession {
        room_code: room_code.clone(),
        phase: RoomPhase::Lobby,
        players: Vec::new(),
        host_id: None,
        selected_game_id: None,
        game_settings: serde_json::Map::new(),
        session_scores: BTreeMap::new(),
        game: None,
        broadcaster: Broadcaster::new(),
        timers: Scheduler::new(),
        clock,
        receiver: rx,
        saw_player: false,
    };

    tokio::spawn(session.run());

    RoomHandle {
        room_code,
        sender: tx,
    }
}

/// One roster entry. Insertion order is join order.
struct PlayerRecord {
    id: PlayerId,
    name: String,
    ready: bool,
    connected: bool,
}

/// The live game, present during countdown setup and play only.
struct ActiveGame {
    game_id: String,
    module: Box<dyn GameModule>,
    /// Opaque module state. `None` only transiently, while a call has
    /// taken ownership of the box.
    state: Option<GameState>,
    /// The config revealed at `game_starting`, kept for late joiners.
    config: serde_json::Value,
    /// The previously broadcast projection — the anchor a delta would
    /// patch against. Not advanced by personal catch-up snapshots.
    last_broadcast: Option<serde_json::Value>,
}

struct RoomSession {
    room_code: String,
    phase: RoomPhase,
    players: Vec<PlayerRecord>,
    host_id: Option<PlayerId>,
    selected_game_id: Option<String>,
    game_settings: serde_json::Map<String, serde_json::Value>,
    session_scores: BTreeMap<PlayerId, i64>,
    game: Option<ActiveGame>,
    broadcaster: Broadcaster,
    timers: Scheduler,
    clock: Arc<dyn Clock>,
    receiver: mpsc::Receiver<RoomCommand>,
    /// Set on the first connect; gates teardown so a freshly spawned
    /// room doesn't exit before anyone arrives.
    saw_player: bool,
}

impl RoomSession {
    async fn run(mut self) {
        info!(room = %self.room_code, "room session started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                due = self.timers.due() => match due {
                    Due::Countdown => self.on_countdown_elapsed(),
                    Due::Tick { dt } => self.on_tick(dt),
                    Due::Broadcast => self.broadcast_game_state(),
                },
            }

            if self.saw_player && self.players.is_empty() {
                break;
            }
        }

        self.teardown();
        info!(room = %self.room_code, "room session stopped");
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Connect {
                player_id,
                name,
                sender,
            } => self.handle_connect(player_id, name, sender),
            RoomCommand::Frame { sender, text } => self.handle_frame(&sender, &text),
            RoomCommand::Disconnect { player_id } => self.handle_disconnect(&player_id),
        }
    }

    // -----------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------

    fn handle_connect(&mut self, player_id: PlayerId, name: String, sender: OutboundSender) {
        let name = {
            let sanitized = sanitize_name(&name);
            if sanitized.is_empty() {
                default_name(&player_id)
            } else {
                sanitized
            }
        };

        self.broadcaster.register(player_id.clone(), sender);
        self.saw_player = true;

        if let Some(idx) = self.players.iter().position(|p| p.id == player_id) {
            // Same id back again: reuse the record, refresh the name.
            self.players[idx].name = name;
            self.players[idx].connected = true;
            info!(room = %self.room_code, player = %player_id, "player reconnected");

            if self.phase == RoomPhase::Playing {
                self.with_game_state(|module, state, player, clock| {
                    module.on_player_reconnect(state, player, clock)
                }, &player_id);
            }
        } else {
            self.players.push(PlayerRecord {
                id: player_id.clone(),
                name,
                ready: false,
                connected: true,
            });
            info!(
                room = %self.room_code,
                player = %player_id,
                players = self.players.len(),
                "player joined"
            );
        }

        if self.host_id.is_none() {
            self.host_id = Some(player_id.clone());
        }

        self.broadcast_room_state();
        self.send_catch_up(&player_id);
    }

    /// Brings a connection that arrived mid-game up to speed.
    fn send_catch_up(&mut self, player_id: &PlayerId) {
        match self.phase {
            RoomPhase::Countdown => {
                if let Some(game) = &self.game {
                    let msg = ServerMessage::GameStarting {
                        game_id: game.game_id.clone(),
                        config: game.config.clone(),
                        countdown_secs: COUNTDOWN_SECS,
                    };
                    self.broadcaster.send_to(player_id, msg);
                }
            }
            RoomPhase::Playing => {
                // A personal full snapshot; deliberately does not touch
                // the broadcast delta chain.
                if let Some(game) = &self.game {
                    if let Some(state) = &game.state {
                        let out = game.module.serialize(state, None);
                        let msg = ServerMessage::GameState {
                            game_id: game.game_id.clone(),
                            state: out.data,
                            is_delta: false,
                        };
                        self.broadcaster.send_to(player_id, msg);
                    }
                }
            }
            RoomPhase::Lobby | RoomPhase::Results => {}
        }
    }

    fn handle_disconnect(&mut self, player_id: &PlayerId) {
        let Some(idx) = self.players.iter().position(|p| &p.id == player_id) else {
            return;
        };

        match self.phase {
            RoomPhase::Countdown | RoomPhase::Playing => {
                // Keep the record so scores still resolve; let the game
                // neutralize the player.
                self.players[idx].connected = false;
                self.broadcaster.unregister(player_id);
                info!(room = %self.room_code, player = %player_id, "player disconnected mid-game");

                if self.phase == RoomPhase::Playing {
                    self.with_game_state(|module, state, player, clock| {
                        module.on_player_disconnect(state, player, clock)
                    }, player_id);
                    // The hook may have auto-finished the last open turn.
                    self.check_game_over();
                }
            }
            RoomPhase::Lobby | RoomPhase::Results => {
                self.players.remove(idx);
                self.broadcaster.unregister(player_id);
                info!(room = %self.room_code, player = %player_id, "player left");
            }
        }

        if self.host_id.as_ref() == Some(player_id) {
            self.transfer_host();
        }
        if !self.players.is_empty() {
            self.broadcast_room_state();
        }
    }

    // -----------------------------------------------------------------
    // Message dispatch
    // -----------------------------------------------------------------

    fn handle_frame(&mut self, sender: &PlayerId, text: &str) {
        if !self.players.iter().any(|p| &p.id == sender) {
            warn!(room = %self.room_code, player = %sender, "frame from non-member, ignoring");
            return;
        }

        let msg = match decode_client_message(text) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(room = %self.room_code, player = %sender, error = %e, "invalid frame");
                self.send_error(sender, ErrorCode::InvalidMessage, "Could not parse message");
                return;
            }
        };

        match msg {
            // Informational: the actual join happened at connect time.
            ClientMessage::JoinRoom { .. } => {}
            ClientMessage::SelectGame { game_id } => self.handle_select_game(sender, game_id),
            ClientMessage::Ready { ready } => self.handle_ready(sender, ready),
            ClientMessage::StartGame => self.handle_start_game(sender),
            ClientMessage::GameInput { payload, .. } => self.handle_game_input(sender, payload),
            ClientMessage::GameSettings { settings, .. } => {
                self.handle_game_settings(sender, settings)
            }
            ClientMessage::LeaveRoom => self.handle_leave(sender),
            ClientMessage::ReturnToLobby => self.handle_return_to_lobby(sender),
        }
    }

    fn handle_select_game(&mut self, sender: &PlayerId, game_id: String) {
        if !self.is_host(sender) {
            self.send_error(sender, ErrorCode::NotHost, "Only the host can select a game");
            return;
        }
        if self.phase != RoomPhase::Lobby {
            return;
        }
        if game_id.is_empty() {
            self.send_error(sender, ErrorCode::InvalidMessage, "gameId must not be empty");
            return;
        }

        self.selected_game_id = Some(game_id);
        self.game_settings.clear();
        for p in &mut self.players {
            p.ready = false;
        }
        self.broadcast_room_state();
    }

    fn handle_ready(&mut self, sender: &PlayerId, ready: bool) {
        if self.phase != RoomPhase::Lobby {
            return;
        }
        if let Some(p) = self.players.iter_mut().find(|p| &p.id == sender) {
            p.ready = ready;
            self.broadcast_room_state();
        }
    }

    fn handle_game_settings(
        &mut self,
        sender: &PlayerId,
        settings: serde_json::Map<String, serde_json::Value>,
    ) {
        if !self.is_host(sender) {
            self.send_error(sender, ErrorCode::NotHost, "Only the host can change settings");
            return;
        }
        if self.phase != RoomPhase::Lobby {
            return;
        }
        self.game_settings = settings;
        self.broadcast_room_state();
    }

    fn handle_start_game(&mut self, sender: &PlayerId) {
        if !self.is_host(sender) {
            self.send_error(sender, ErrorCode::NotHost, "Only the host can start the game");
            return;
        }
        if self.phase != RoomPhase::Lobby {
            return;
        }
        let Some(game_id) = self.selected_game_id.clone() else {
            self.send_error(sender, ErrorCode::NoGame, "No game selected");
            return;
        };

        if !self
            .players
            .iter()
            .filter(|p| p.connected)
            .all(|p| p.ready)
        {
            self.send_error(sender, ErrorCode::NotReady, "Not all players are ready");
            return;
        }

        let Some(mut module) = registry::create(&game_id) else {
            // Room-wide: the selected game is bad for everyone, and the
            // start attempt is aborted with the phase unchanged.
            self.broadcast_error(
                ErrorCode::UnknownGame,
                &format!("Game \"{game_id}\" not found"),
            );
            return;
        };

        let connected = self.connected_players();
        let meta = module.meta();
        if connected.len() < meta.min_players {
            self.send_error(
                sender,
                ErrorCode::TooFewPlayers,
                &format!("{} needs at least {} players", meta.display_name, meta.min_players),
            );
            return;
        }
        if connected.len() > meta.max_players {
            self.send_error(
                sender,
                ErrorCode::TooManyPlayers,
                &format!("{} allows at most {} players", meta.display_name, meta.max_players),
            );
            return;
        }

        let (state, config) = module.init(&connected, &self.game_settings, self.clock.as_ref());
        self.game = Some(ActiveGame {
            game_id: game_id.clone(),
            module,
            state: Some(state),
            config: config.clone(),
            last_broadcast: None,
        });

        self.phase = RoomPhase::Countdown;
        self.broadcast_room_state();
        self.broadcaster.broadcast(ServerMessage::GameStarting {
            game_id: game_id.clone(),
            config,
            countdown_secs: COUNTDOWN_SECS,
        });

        // Replace, never stack: one live countdown per room.
        self.timers.cancel_countdown();
        self.timers
            .arm_countdown(Duration::from_secs(u64::from(COUNTDOWN_SECS)));

        info!(
            room = %self.room_code,
            game = %game_id,
            players = connected.len(),
            "game starting"
        );
    }

    fn handle_game_input(&mut self, sender: &PlayerId, payload: serde_json::Value) {
        if self.phase != RoomPhase::Playing {
            return;
        }
        let clock = Arc::clone(&self.clock);
        let Some(game) = &mut self.game else { return };
        let Some(state) = game.state.take() else { return };
        game.state = Some(
            game.module
                .on_input(state, sender, &payload, clock.as_ref()),
        );
        let turn_based = game.module.meta().timing.mode == TimingMode::TurnBased;

        // Turn-based games have no tick: publish and re-check game over
        // right after every input.
        if turn_based {
            self.broadcast_game_state();
            self.check_game_over();
        }
    }

    fn handle_leave(&mut self, sender: &PlayerId) {
        let Some(idx) = self.players.iter().position(|p| &p.id == sender) else {
            return;
        };
        let leaving = self.players.remove(idx);
        self.broadcaster.unregister(&leaving.id);
        info!(room = %self.room_code, player = %leaving.id, "player left room");

        // Mid-game, the module still has to neutralize them so the game
        // can resolve; their result (if any) keys by id.
        if self.phase == RoomPhase::Playing {
            self.with_game_state(|module, state, player, clock| {
                module.on_player_disconnect(state, player, clock)
            }, &leaving.id);
            self.check_game_over();
        }

        if self.host_id.as_ref() == Some(&leaving.id) {
            self.transfer_host();
        }
        if !self.players.is_empty() {
            self.broadcast_room_state();
        }
    }

    fn handle_return_to_lobby(&mut self, sender: &PlayerId) {
        if !self.is_host(sender) {
            self.send_error(sender, ErrorCode::NotHost, "Only the host can return to the lobby");
            return;
        }
        if self.phase != RoomPhase::Results {
            return;
        }

        self.phase = RoomPhase::Lobby;

        // Disconnected players did not come back during results: drop
        // their records now.
        let dropped: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|p| !p.connected)
            .map(|p| p.id.clone())
            .collect();
        self.players.retain(|p| p.connected);
        for id in &dropped {
            self.broadcaster.unregister(id);
        }

        for p in &mut self.players {
            p.ready = false;
        }

        let host_present = self
            .host_id
            .as_ref()
            .is_some_and(|h| self.players.iter().any(|p| &p.id == h));
        if !host_present {
            self.transfer_host();
        }

        if !self.players.is_empty() {
            self.broadcast_room_state();
        }
    }

    // -----------------------------------------------------------------
    // Timer callbacks
    // -----------------------------------------------------------------

    fn on_countdown_elapsed(&mut self) {
        // A disconnect or teardown may have moved the room on while the
        // timer was pending.
        if self.phase != RoomPhase::Countdown {
            return;
        }

        self.phase = RoomPhase::Playing;
        self.broadcast_room_state();
        self.broadcast_game_state();

        if let Some(game) = &self.game {
            let timing = game.module.meta().timing;
            if timing.mode == TimingMode::Realtime {
                self.timers.arm_game_loop(timing.tick_hz, timing.broadcast_hz);
            }
        }
        info!(room = %self.room_code, "game running");
    }

    fn on_tick(&mut self, dt: Duration) {
        if self.phase != RoomPhase::Playing {
            return;
        }
        let clock = Arc::clone(&self.clock);
        let Some(game) = &mut self.game else { return };
        let Some(state) = game.state.take() else { return };
        game.state = Some(game.module.tick(state, dt.as_secs_f64(), clock.as_ref()));
        self.check_game_over();
    }

    // -----------------------------------------------------------------
    // Game lifecycle helpers
    // -----------------------------------------------------------------

    /// Runs an ownership-transferring module call over the stored state.
    fn with_game_state(
        &mut self,
        call: impl FnOnce(&mut dyn GameModule, GameState, &PlayerId, &dyn Clock) -> GameState,
        player: &PlayerId,
    ) {
        let clock = Arc::clone(&self.clock);
        let Some(game) = &mut self.game else { return };
        let Some(state) = game.state.take() else { return };
        game.state = Some(call(game.module.as_mut(), state, player, clock.as_ref()));
    }

    fn broadcast_game_state(&mut self) {
        if self.phase != RoomPhase::Playing {
            return;
        }
        let Some(game) = &mut self.game else { return };
        let Some(state) = &game.state else { return };

        let out = game.module.serialize(state, game.last_broadcast.as_ref());
        game.last_broadcast = Some(out.data.clone());
        let msg = ServerMessage::GameState {
            game_id: game.game_id.clone(),
            state: out.data,
            is_delta: out.is_delta,
        };
        self.broadcaster.broadcast(msg);
    }

    fn check_game_over(&mut self) {
        let over = match &self.game {
            Some(game) => match &game.state {
                Some(state) => game.module.is_game_over(state, self.clock.as_ref()),
                None => false,
            },
            None => false,
        };
        if over {
            self.end_game();
        }
    }

    fn end_game(&mut self) {
        self.timers.cancel_game_loop();

        let Some(mut game) = self.game.take() else { return };
        let results = match &game.state {
            Some(state) => game.module.results(state),
            None => Vec::new(),
        };

        // Results are additive: a score is never subtracted or replaced.
        for r in &results {
            *self.session_scores.entry(r.player_id.clone()).or_insert(0) += r.score;
        }

        self.broadcaster.broadcast(ServerMessage::GameOver {
            game_id: game.game_id.clone(),
            results,
        });

        game.module.dispose();
        // The opaque state drops with `game` — nothing survives into the
        // next round.

        self.phase = RoomPhase::Results;
        self.broadcast_room_state();
        info!(room = %self.room_code, game = %game.game_id, "game finished");
    }

    // -----------------------------------------------------------------
    // Roster helpers
    // -----------------------------------------------------------------

    fn is_host(&self, player: &PlayerId) -> bool {
        self.host_id.as_ref() == Some(player)
    }

    /// First currently-connected player in join order, or nobody.
    fn transfer_host(&mut self) {
        self.host_id = self
            .players
            .iter()
            .find(|p| p.connected)
            .map(|p| p.id.clone());
        if let Some(host) = &self.host_id {
            info!(room = %self.room_code, player = %host, "host transferred");
        }
    }

    fn connected_players(&self) -> Vec<PlayerInfo> {
        self.players
            .iter()
            .filter(|p| p.connected)
            .map(|p| PlayerInfo {
                id: p.id.clone(),
                name: p.name.clone(),
                ready: p.ready,
                connected: p.connected,
            })
            .collect()
    }

    // -----------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------

    fn broadcast_room_state(&mut self) {
        let room_code = self.room_code.clone();
        let phase = self.phase;
        let players: Vec<PlayerInfo> = self
            .players
            .iter()
            .map(|p| PlayerInfo {
                id: p.id.clone(),
                name: p.name.clone(),
                ready: p.ready,
                connected: p.connected,
            })
            .collect();
        let host_id = self.host_id.clone();
        let selected_game_id = self.selected_game_id.clone();
        let session_scores = self.session_scores.clone();
        let game_settings = self.game_settings.clone();

        self.broadcaster.broadcast_with(move |recipient| ServerMessage::RoomState {
            room_code: room_code.clone(),
            phase,
            players: players.clone(),
            host_id: host_id.clone(),
            selected_game_id: selected_game_id.clone(),
            session_scores: session_scores.clone(),
            game_settings: game_settings.clone(),
            your_id: recipient.clone(),
        });
    }

    fn send_error(&mut self, to: &PlayerId, code: ErrorCode, message: &str) {
        self.broadcaster.send_to(
            to,
            ServerMessage::Error {
                code,
                message: message.to_owned(),
            },
        );
    }

    fn broadcast_error(&mut self, code: ErrorCode, message: &str) {
        self.broadcaster.broadcast(ServerMessage::Error {
            code,
            message: message.to_owned(),
        });
    }

    // -----------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------

    fn teardown(&mut self) {
        self.timers.cancel_all();
        if let Some(mut game) = self.game.take() {
            game.module.dispose();
        }
        info!(room = %self.room_code, "room torn down");
    }
}
