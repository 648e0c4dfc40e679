//! Integration tests for the room session actor.
//!
//! Tests drive a room through its `RoomHandle` exactly like the
//! transport does — connects, raw JSON frames, disconnects — and read
//! the encoded frames each client would receive. Tokio time is paused
//! (`start_paused`) so the 3-second countdown resolves deterministically,
//! and game time comes from a `ManualClock` the tests advance by hand.

use std::sync::Arc;
use std::time::Duration;

use parlor_game::ManualClock;
use parlor_protocol::{
    ErrorCode, PlayerId, RoomPhase, Sequenced, ServerMessage,
};
use parlor_room::{spawn_room, RoomHandle};
use serde_json::json;
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

struct Client {
    id: PlayerId,
    rx: mpsc::UnboundedReceiver<String>,
}

impl Client {
    async fn recv(&mut self) -> Sequenced {
        let text = tokio::time::timeout(Duration::from_secs(30), self.rx.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("outbound channel closed");
        serde_json::from_str(&text).expect("frame should decode as Sequenced")
    }

    async fn recv_msg(&mut self) -> ServerMessage {
        self.recv().await.msg
    }

    /// Reads frames until one matches, discarding the rest.
    async fn recv_until(
        &mut self,
        pred: impl Fn(&ServerMessage) -> bool,
    ) -> ServerMessage {
        loop {
            let msg = self.recv_msg().await;
            if pred(&msg) {
                return msg;
            }
        }
    }

    fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

async fn join(room: &RoomHandle, id: &str, name: &str) -> Client {
    let (tx, rx) = mpsc::unbounded_channel();
    room.connect(id.into(), name.into(), tx).await.unwrap();
    Client { id: id.into(), rx }
}

async fn say(room: &RoomHandle, who: &Client, msg: serde_json::Value) {
    room.frame(who.id.clone(), msg.to_string()).await.unwrap();
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn is_room_state(msg: &ServerMessage) -> bool {
    matches!(msg, ServerMessage::RoomState { .. })
}

fn is_playing(msg: &ServerMessage) -> bool {
    matches!(
        msg,
        ServerMessage::RoomState {
            phase: RoomPhase::Playing,
            ..
        }
    )
}

fn is_lobby(msg: &ServerMessage) -> bool {
    matches!(
        msg,
        ServerMessage::RoomState {
            phase: RoomPhase::Lobby,
            ..
        }
    )
}

fn is_game_over(msg: &ServerMessage) -> bool {
    matches!(msg, ServerMessage::GameOver { .. })
}

/// Spawns a room on a manual clock with two joined players, with the
/// join-time room_state frames drained.
async fn lobby_with_two() -> (RoomHandle, Arc<ManualClock>, Client, Client) {
    let clock = Arc::new(ManualClock::new(0));
    let room = spawn_room("ABCD".into(), clock.clone());
    let mut p1 = join(&room, "p1", "Alice").await;
    let mut p2 = join(&room, "p2", "Bob").await;
    let _ = p1.recv_msg().await; // after p1's join
    let _ = p1.recv_msg().await; // after p2's join
    let _ = p2.recv_msg().await;
    (room, clock, p1, p2)
}

/// Host selects `game_id`, both players ready up, host starts. Returns
/// the `game_starting` config. Leaves the room in countdown.
async fn select_ready_start(
    room: &RoomHandle,
    p1: &mut Client,
    p2: &mut Client,
    game_id: &str,
) -> serde_json::Value {
    say(room, p1, json!({"type": "c2s:select_game", "gameId": game_id})).await;
    say(room, p1, json!({"type": "c2s:ready", "ready": true})).await;
    say(room, p2, json!({"type": "c2s:ready", "ready": true})).await;
    say(room, p1, json!({"type": "c2s:start_game"})).await;

    let starting = p1
        .recv_until(|m| matches!(m, ServerMessage::GameStarting { .. }))
        .await;
    let _ = p2
        .recv_until(|m| matches!(m, ServerMessage::GameStarting { .. }))
        .await;
    match starting {
        ServerMessage::GameStarting { config, .. } => config,
        _ => unreachable!(),
    }
}

/// Waits out the countdown on both clients and drains the first full
/// game_state snapshot.
async fn until_playing(p1: &mut Client, p2: &mut Client) {
    p1.recv_until(is_playing).await;
    p2.recv_until(is_playing).await;
    let state = p1
        .recv_until(|m| matches!(m, ServerMessage::GameState { .. }))
        .await;
    match state {
        ServerMessage::GameState { is_delta, .. } => assert!(!is_delta),
        _ => unreachable!(),
    }
    let _ = p2
        .recv_until(|m| matches!(m, ServerMessage::GameState { .. }))
        .await;
}

fn typed(game_id: &str, text: &str) -> serde_json::Value {
    json!({"type": "c2s:game_input", "gameId": game_id, "payload": {"typed": text}})
}

// =========================================================================
// Lobby basics
// =========================================================================

#[tokio::test(start_paused = true)]
async fn first_joiner_becomes_host_and_frames_are_personalized() {
    let clock = Arc::new(ManualClock::new(0));
    let room = spawn_room("QRST".into(), clock);
    let mut p1 = join(&room, "p1", "Alice").await;

    match p1.recv_msg().await {
        ServerMessage::RoomState {
            room_code,
            phase,
            players,
            host_id,
            your_id,
            selected_game_id,
            ..
        } => {
            assert_eq!(room_code, "QRST");
            assert_eq!(phase, RoomPhase::Lobby);
            assert_eq!(host_id, Some(PlayerId::from("p1")));
            assert_eq!(your_id, PlayerId::from("p1"));
            assert!(selected_game_id.is_none());
            assert_eq!(players.len(), 1);
            assert_eq!(players[0].name, "Alice");
            assert!(!players[0].ready);
            assert!(players[0].connected);
        }
        other => panic!("expected room_state, got {other:?}"),
    }

    let mut p2 = join(&room, "p2", "  Bob  ").await;
    let _ = p1.recv_msg().await;
    match p2.recv_msg().await {
        ServerMessage::RoomState {
            players,
            host_id,
            your_id,
            ..
        } => {
            assert_eq!(your_id, PlayerId::from("p2"));
            assert_eq!(host_id, Some(PlayerId::from("p1")));
            // Join order and name sanitization.
            assert_eq!(players[0].id, PlayerId::from("p1"));
            assert_eq!(players[1].id, PlayerId::from("p2"));
            assert_eq!(players[1].name, "Bob");
        }
        other => panic!("expected room_state, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn unusable_names_fall_back_to_a_generated_default() {
    let clock = Arc::new(ManualClock::new(0));
    let room = spawn_room("QRST".into(), clock);
    let mut p1 = join(&room, "abcdef", "!@#$%").await;

    match p1.recv_msg().await {
        ServerMessage::RoomState { players, .. } => {
            assert_eq!(players[0].name, "Player abcd");
        }
        other => panic!("expected room_state, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn select_game_is_host_only() {
    let (room, _clock, mut p1, mut p2) = lobby_with_two().await;

    say(&room, &p2, json!({"type": "c2s:select_game", "gameId": "type-racer"})).await;
    match p2.recv_msg().await {
        ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::NotHost),
        other => panic!("expected error, got {other:?}"),
    }
    settle().await;
    assert!(p1.try_recv().is_none(), "errors must be scoped to the sender");
}

#[tokio::test(start_paused = true)]
async fn selecting_a_game_resets_ready_flags() {
    let (room, _clock, mut p1, mut p2) = lobby_with_two().await;

    say(&room, &p2, json!({"type": "c2s:ready", "ready": true})).await;
    let _ = p1.recv_until(is_room_state).await;
    let _ = p2.recv_until(is_room_state).await;

    say(&room, &p1, json!({"type": "c2s:select_game", "gameId": "type-racer"})).await;
    match p2.recv_until(is_room_state).await {
        ServerMessage::RoomState {
            selected_game_id,
            players,
            ..
        } => {
            assert_eq!(selected_game_id.as_deref(), Some("type-racer"));
            assert!(players.iter().all(|p| !p.ready));
        }
        _ => unreachable!(),
    }
}

#[tokio::test(start_paused = true)]
async fn start_game_guards_in_order() {
    let (room, _clock, mut p1, mut p2) = lobby_with_two().await;

    // Non-host is rejected regardless of readiness.
    say(&room, &p2, json!({"type": "c2s:start_game"})).await;
    match p2.recv_msg().await {
        ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::NotHost),
        other => panic!("expected NOT_HOST, got {other:?}"),
    }

    // Host without a selected game.
    say(&room, &p1, json!({"type": "c2s:start_game"})).await;
    match p1.recv_msg().await {
        ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::NoGame),
        other => panic!("expected NO_GAME, got {other:?}"),
    }

    // Game selected but a connected player is not ready.
    say(&room, &p1, json!({"type": "c2s:select_game", "gameId": "type-racer"})).await;
    say(&room, &p1, json!({"type": "c2s:ready", "ready": true})).await;
    say(&room, &p1, json!({"type": "c2s:start_game"})).await;
    let err = p1
        .recv_until(|m| matches!(m, ServerMessage::Error { .. }))
        .await;
    match err {
        ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::NotReady),
        _ => unreachable!(),
    }
}

#[tokio::test(start_paused = true)]
async fn unknown_game_error_is_broadcast_and_start_aborts() {
    let (room, _clock, mut p1, mut p2) = lobby_with_two().await;

    say(&room, &p1, json!({"type": "c2s:select_game", "gameId": "moon-lander"})).await;
    say(&room, &p1, json!({"type": "c2s:ready", "ready": true})).await;
    say(&room, &p2, json!({"type": "c2s:ready", "ready": true})).await;
    say(&room, &p1, json!({"type": "c2s:start_game"})).await;

    // Both clients see the failure; the phase never leaves lobby.
    for client in [&mut p1, &mut p2] {
        let err = client
            .recv_until(|m| matches!(m, ServerMessage::Error { .. }))
            .await;
        match err {
            ServerMessage::Error { code, message } => {
                assert_eq!(code, ErrorCode::UnknownGame);
                assert!(message.contains("moon-lander"));
            }
            _ => unreachable!(),
        }
    }

    // The lobby still works: re-selecting a real game broadcasts state.
    say(&room, &p1, json!({"type": "c2s:select_game", "gameId": "type-racer"})).await;
    match p2.recv_until(is_room_state).await {
        ServerMessage::RoomState { phase, .. } => assert_eq!(phase, RoomPhase::Lobby),
        _ => unreachable!(),
    }
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_get_a_scoped_invalid_message_error() {
    let (room, _clock, mut p1, mut p2) = lobby_with_two().await;

    room.frame(p1.id.clone(), "not json at all".into()).await.unwrap();
    match p1.recv_msg().await {
        ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::InvalidMessage),
        other => panic!("expected INVALID_MESSAGE, got {other:?}"),
    }

    room.frame(p1.id.clone(), json!({"type": "c2s:warp"}).to_string())
        .await
        .unwrap();
    match p1.recv_msg().await {
        ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::InvalidMessage),
        other => panic!("expected INVALID_MESSAGE, got {other:?}"),
    }

    settle().await;
    assert!(p2.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn sequence_numbers_increase_monotonically() {
    let (room, _clock, mut p1, _p2) = lobby_with_two().await;

    say(&room, &p1, json!({"type": "c2s:select_game", "gameId": "type-racer"})).await;
    say(&room, &p1, json!({"type": "c2s:ready", "ready": true})).await;
    say(&room, &p1, json!({"type": "c2s:ready", "ready": false})).await;

    let mut last = None;
    for _ in 0..3 {
        let frame = p1.recv().await;
        if let Some(prev) = last {
            assert!(frame.seq > prev, "seq {} did not advance past {}", frame.seq, prev);
        }
        last = Some(frame.seq);
    }
}

// =========================================================================
// Type racer: full flows
// =========================================================================

#[tokio::test(start_paused = true)]
async fn type_racer_end_to_end() {
    let (room, clock, mut p1, mut p2) = lobby_with_two().await;

    let config = select_ready_start(&room, &mut p1, &mut p2, "type-racer").await;
    let text = config["text"].as_str().expect("config carries the passage").to_owned();
    assert_eq!(config["durationSecs"], 60);

    // The countdown runs on (paused) tokio time; waiting for the playing
    // room_state advances through it.
    until_playing(&mut p1, &mut p2).await;

    // Player 1 finishes first.
    clock.advance(5_000);
    say(&room, &p1, typed("type-racer", &text)).await;
    let state = p1
        .recv_until(|m| matches!(m, ServerMessage::GameState { .. }))
        .await;
    match state {
        ServerMessage::GameState { state, .. } => {
            assert_eq!(state["players"][0]["finished"], true);
            assert_eq!(state["players"][1]["finished"], false);
        }
        _ => unreachable!(),
    }

    // Player 2 finishes; the game resolves.
    clock.advance(2_000);
    say(&room, &p2, typed("type-racer", &text)).await;

    let over = p1.recv_until(is_game_over).await;
    let ServerMessage::GameOver { game_id, results } = over else {
        unreachable!()
    };
    assert_eq!(game_id, "type-racer");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].player_id, PlayerId::from("p1"));
    assert_eq!(results[0].rank, 1);
    assert_eq!(results[0].score, 100);
    assert_eq!(results[1].player_id, PlayerId::from("p2"));
    assert_eq!(results[1].rank, 2);
    assert_eq!(results[1].score, 80);

    match p1.recv_until(is_room_state).await {
        ServerMessage::RoomState {
            phase,
            session_scores,
            ..
        } => {
            assert_eq!(phase, RoomPhase::Results);
            assert_eq!(session_scores.get(&PlayerId::from("p1")), Some(&100));
            assert_eq!(session_scores.get(&PlayerId::from("p2")), Some(&80));
        }
        _ => unreachable!(),
    }
    let _ = p2.recv_until(is_game_over).await;
}

#[tokio::test(start_paused = true)]
async fn session_scores_are_additive_across_games() {
    let (room, clock, mut p1, mut p2) = lobby_with_two().await;

    for _ in 0..2 {
        let config = select_ready_start(&room, &mut p1, &mut p2, "type-racer").await;
        let text = config["text"].as_str().unwrap().to_owned();
        until_playing(&mut p1, &mut p2).await;

        clock.advance(5_000);
        say(&room, &p1, typed("type-racer", &text)).await;
        clock.advance(1_000);
        say(&room, &p2, typed("type-racer", &text)).await;

        let _ = p1.recv_until(is_game_over).await;
        let _ = p2.recv_until(is_game_over).await;

        say(&room, &p1, json!({"type": "c2s:return_to_lobby"})).await;
        match p1.recv_until(is_lobby).await {
            ServerMessage::RoomState { players, .. } => {
                assert!(players.iter().all(|p| !p.ready));
            }
            _ => unreachable!(),
        }
        let _ = p2.recv_until(is_lobby).await;
    }

    // Two first-place and two second-place finishes.
    say(&room, &p1, json!({"type": "c2s:ready", "ready": true})).await;
    match p1.recv_until(is_room_state).await {
        ServerMessage::RoomState { session_scores, .. } => {
            assert_eq!(session_scores.get(&PlayerId::from("p1")), Some(&200));
            assert_eq!(session_scores.get(&PlayerId::from("p2")), Some(&160));
        }
        _ => unreachable!(),
    }
}

#[tokio::test(start_paused = true)]
async fn return_to_lobby_is_host_gated() {
    let (room, clock, mut p1, mut p2) = lobby_with_two().await;
    let config = select_ready_start(&room, &mut p1, &mut p2, "type-racer").await;
    let text = config["text"].as_str().unwrap().to_owned();
    until_playing(&mut p1, &mut p2).await;

    clock.advance(5_000);
    say(&room, &p1, typed("type-racer", &text)).await;
    say(&room, &p2, typed("type-racer", &text)).await;
    let _ = p1.recv_until(is_game_over).await;
    let _ = p2.recv_until(is_game_over).await;

    say(&room, &p2, json!({"type": "c2s:return_to_lobby"})).await;
    match p2.recv_until(|m| matches!(m, ServerMessage::Error { .. })).await {
        ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::NotHost),
        _ => unreachable!(),
    }
}

#[tokio::test(start_paused = true)]
async fn game_settings_shape_the_next_game() {
    let (room, _clock, mut p1, mut p2) = lobby_with_two().await;

    say(&room, &p1, json!({"type": "c2s:select_game", "gameId": "type-racer"})).await;
    say(
        &room,
        &p1,
        json!({
            "type": "c2s:game_settings",
            "gameId": "type-racer",
            "settings": {"passageLength": "short", "timeLimit": 20}
        }),
    )
    .await;
    // Settings are echoed in room_state.
    let state = p2
        .recv_until(|m| match m {
            ServerMessage::RoomState { game_settings, .. } => !game_settings.is_empty(),
            _ => false,
        })
        .await;
    match state {
        ServerMessage::RoomState { game_settings, .. } => {
            assert_eq!(game_settings["passageLength"], "short");
        }
        _ => unreachable!(),
    }

    say(&room, &p1, json!({"type": "c2s:ready", "ready": true})).await;
    say(&room, &p2, json!({"type": "c2s:ready", "ready": true})).await;
    say(&room, &p1, json!({"type": "c2s:start_game"})).await;

    let starting = p1
        .recv_until(|m| matches!(m, ServerMessage::GameStarting { .. }))
        .await;
    let ServerMessage::GameStarting { config, .. } = starting else {
        unreachable!()
    };
    assert_eq!(config["durationSecs"], 20);
    assert!(config["text"].as_str().unwrap().len() < 60, "expected a short passage");
}

#[tokio::test(start_paused = true)]
async fn settings_are_host_only() {
    let (room, _clock, _p1, mut p2) = lobby_with_two().await;
    say(
        &room,
        &p2,
        json!({"type": "c2s:game_settings", "gameId": "type-racer", "settings": {}}),
    )
    .await;
    match p2.recv_msg().await {
        ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::NotHost),
        other => panic!("expected NOT_HOST, got {other:?}"),
    }
}

// =========================================================================
// Disconnect / reconnect / leave
// =========================================================================

#[tokio::test(start_paused = true)]
async fn disconnect_mid_game_keeps_the_player_in_the_results() {
    let (room, clock, mut p1, mut p2) = lobby_with_two().await;
    let config = select_ready_start(&room, &mut p1, &mut p2, "type-racer").await;
    let text = config["text"].as_str().unwrap().to_owned();
    until_playing(&mut p1, &mut p2).await;

    room.disconnect(p2.id.clone()).await.unwrap();
    match p1.recv_until(is_room_state).await {
        ServerMessage::RoomState { players, .. } => {
            // Still on the roster, marked disconnected.
            assert_eq!(players.len(), 2);
            assert!(!players[1].connected);
        }
        _ => unreachable!(),
    }

    // p2 was auto-finished at the disconnect; p1 finishing resolves the
    // game with both players ranked and scored.
    clock.advance(1_000);
    say(&room, &p1, typed("type-racer", &text)).await;

    let over = p1.recv_until(is_game_over).await;
    let ServerMessage::GameOver { results, .. } = over else {
        unreachable!()
    };
    assert_eq!(results.len(), 2);
    assert!(results.iter().any(|r| r.player_id == PlayerId::from("p2")));

    match p1.recv_until(is_room_state).await {
        ServerMessage::RoomState {
            phase,
            session_scores,
            ..
        } => {
            assert_eq!(phase, RoomPhase::Results);
            assert!(session_scores.contains_key(&PlayerId::from("p2")));
        }
        _ => unreachable!(),
    }
}

#[tokio::test(start_paused = true)]
async fn disconnected_players_are_dropped_on_return_to_lobby() {
    let (room, clock, mut p1, mut p2) = lobby_with_two().await;
    let config = select_ready_start(&room, &mut p1, &mut p2, "type-racer").await;
    let text = config["text"].as_str().unwrap().to_owned();
    until_playing(&mut p1, &mut p2).await;

    room.disconnect(p2.id.clone()).await.unwrap();
    clock.advance(1_000);
    say(&room, &p1, typed("type-racer", &text)).await;
    let _ = p1.recv_until(is_game_over).await;

    say(&room, &p1, json!({"type": "c2s:return_to_lobby"})).await;
    match p1.recv_until(is_lobby).await {
        ServerMessage::RoomState {
            players,
            session_scores,
            ..
        } => {
            assert_eq!(players.len(), 1);
            assert_eq!(players[0].id, PlayerId::from("p1"));
            // Their accumulated score survives the cleanup.
            assert!(session_scores.contains_key(&PlayerId::from("p2")));
        }
        _ => unreachable!(),
    }
}

#[tokio::test(start_paused = true)]
async fn reconnecting_with_the_same_id_reuses_the_record() {
    let (room, _clock, mut p1, mut p2) = lobby_with_two().await;
    let _ = select_ready_start(&room, &mut p1, &mut p2, "type-racer").await;
    until_playing(&mut p1, &mut p2).await;

    room.disconnect(p2.id.clone()).await.unwrap();
    let _ = p1.recv_until(is_room_state).await;

    // Same id comes back on a fresh channel with a refreshed name.
    let mut p2_again = join(&room, "p2", "Bobby").await;
    match p2_again.recv_until(is_room_state).await {
        ServerMessage::RoomState {
            players, your_id, ..
        } => {
            assert_eq!(your_id, PlayerId::from("p2"));
            // No duplicate record.
            assert_eq!(players.len(), 2);
            assert_eq!(players[1].name, "Bobby");
            assert!(players[1].connected);
        }
        _ => unreachable!(),
    }

    // Catch-up: a personal full snapshot of the running game.
    match p2_again.recv_msg().await {
        ServerMessage::GameState { is_delta, .. } => assert!(!is_delta),
        other => panic!("expected a catch-up game_state, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn leaving_transfers_the_host_in_join_order() {
    let (room, _clock, mut p1, mut p2) = lobby_with_two().await;

    say(&room, &p1, json!({"type": "c2s:leave_room"})).await;
    match p2.recv_until(is_room_state).await {
        ServerMessage::RoomState {
            players, host_id, ..
        } => {
            assert_eq!(players.len(), 1);
            assert_eq!(host_id, Some(PlayerId::from("p2")));
        }
        _ => unreachable!(),
    }

    settle().await;
    assert!(p1.try_recv().is_none(), "a departed player receives nothing");
}

#[tokio::test(start_paused = true)]
async fn room_tears_down_when_the_roster_empties() {
    let clock = Arc::new(ManualClock::new(0));
    let room = spawn_room("ABCD".into(), clock);
    let p1 = join(&room, "p1", "Alice").await;

    say(&room, &p1, json!({"type": "c2s:leave_room"})).await;
    settle().await;

    assert!(room.is_closed());
    assert!(room
        .frame(p1.id.clone(), json!({"type": "c2s:ready", "ready": true}).to_string())
        .await
        .is_err());
}

#[tokio::test(start_paused = true)]
async fn disconnect_in_lobby_removes_the_record() {
    let (room, _clock, mut p1, p2) = lobby_with_two().await;

    room.disconnect(p2.id.clone()).await.unwrap();
    match p1.recv_until(is_room_state).await {
        ServerMessage::RoomState { players, .. } => {
            assert_eq!(players.len(), 1);
            assert_eq!(players[0].id, PlayerId::from("p1"));
        }
        _ => unreachable!(),
    }
}

// =========================================================================
// Reaction speed: realtime flow
// =========================================================================

#[tokio::test(start_paused = true)]
async fn reaction_speed_end_to_end() {
    let (room, clock, mut p1, mut p2) = lobby_with_two().await;

    let config = select_ready_start(&room, &mut p1, &mut p2, "reaction-speed").await;
    assert_eq!(config["totalRounds"], 5);
    until_playing(&mut p1, &mut p2).await;

    // Five rounds. Game time is the manual clock; the tick loop runs on
    // (paused) tokio time, so each step sleeps a little to let ticks
    // observe the advanced clock.
    for _ in 0..5 {
        // The signal delay is 2–5 s; +5 s is past it but inside the 3 s
        // round timeout window.
        clock.advance(5_000);
        tokio::time::sleep(Duration::from_millis(200)).await;

        // p1 taps first every round, so p1 has the lower average.
        say(&room, &p1, json!({"type": "c2s:game_input", "gameId": "reaction-speed", "payload": {"action": "tap"}})).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        clock.advance(100);
        say(&room, &p2, json!({"type": "c2s:game_input", "gameId": "reaction-speed", "payload": {"action": "tap"}})).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Pause between rounds, then the next round (or the finish).
        clock.advance(1_600);
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    let over = p1.recv_until(is_game_over).await;
    let ServerMessage::GameOver { game_id, results } = over else {
        unreachable!()
    };
    assert_eq!(game_id, "reaction-speed");
    assert_eq!(results[0].player_id, PlayerId::from("p1"));
    assert_eq!(results[0].rank, 1);
    assert_eq!(results[0].score, 100);
    assert_eq!(results[1].player_id, PlayerId::from("p2"));
    assert_eq!(results[1].score, 80);

    let stats = results[0].stats.as_ref().expect("reaction results carry stats");
    assert!(stats.contains_key("avgMs"));
    assert!(stats.contains_key("falseStarts"));

    match p1.recv_until(is_room_state).await {
        ServerMessage::RoomState { phase, .. } => assert_eq!(phase, RoomPhase::Results),
        _ => unreachable!(),
    }
}
