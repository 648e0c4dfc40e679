//! Realtime reference game: tap when the signal shows.
//!
//! Five rounds. Each round waits a random 2–5 s before showing the "go"
//! signal; tapping early records a false start (the `-1` sentinel),
//! tapping after records the elapsed milliseconds. A round closes when
//! everyone has tapped or the 3 s timeout credits the stragglers, then a
//! short pause leads into the next round. Lowest average reaction time
//! wins; false starts average in as a 500 ms penalty.

use parlor_protocol::{GameResult, PlayerId, PlayerInfo};
use rand::Rng;
use serde_json::{json, Value};

use crate::{Clock, GameMeta, GameModule, GameState, GameTiming, Serialized, TimingMode};

pub static META: GameMeta = GameMeta {
    game_id: "reaction-speed",
    display_name: "Reaction Speed",
    description: "Tap the instant the signal shows!",
    min_players: 1,
    max_players: 10,
    timing: GameTiming {
        mode: TimingMode::Realtime,
        tick_hz: 20,
        broadcast_hz: 10,
        max_duration_secs: 120,
    },
};

const TOTAL_ROUNDS: u32 = 5;
const MIN_DELAY_MS: u64 = 2_000;
const MAX_DELAY_MS: u64 = 5_000;
/// Sentinel stored for a tap before the signal.
const FALSE_START: i64 = -1;
/// What a false start counts as when averaging.
const FALSE_START_PENALTY_MS: i64 = 500;
/// A round ends this long after the signal even if someone never taps;
/// the stragglers are credited this value.
const ROUND_TIMEOUT_MS: u64 = 3_000;
/// Breather between a round closing and the next one starting.
const ROUND_PAUSE_MS: u64 = 1_500;
/// Average reported for a player with no recorded rounds.
const NO_RECORD_AVG_MS: i64 = 9_999;

#[derive(Debug)]
struct Tapper {
    id: PlayerId,
    name: String,
    /// One entry per completed round: milliseconds, [`FALSE_START`], or
    /// [`ROUND_TIMEOUT_MS`] for a credited timeout.
    reaction_times: Vec<i64>,
    tapped_this_round: bool,
}

#[derive(Debug)]
struct TapState {
    tappers: Vec<Tapper>,
    round: u32,
    /// When the current round's signal fires (or fired).
    signal_at_ms: u64,
    signal_shown: bool,
    round_over: bool,
    /// When the current round closed; 0 while the round is live.
    round_ended_at_ms: u64,
    finished: bool,
}

fn random_delay() -> u64 {
    rand::rng().random_range(MIN_DELAY_MS..=MAX_DELAY_MS)
}

fn average_ms(times: &[i64]) -> i64 {
    if times.is_empty() {
        return NO_RECORD_AVG_MS;
    }
    let sum: i64 = times
        .iter()
        .map(|&t| if t == FALSE_START { FALSE_START_PENALTY_MS } else { t })
        .sum();
    (sum as f64 / times.len() as f64).round() as i64
}

/// Factory used by the registry.
pub fn boxed() -> Box<dyn GameModule> {
    Box::new(ReactionSpeed)
}

pub struct ReactionSpeed;

impl GameModule for ReactionSpeed {
    fn meta(&self) -> &'static GameMeta {
        &META
    }

    fn init(
        &mut self,
        players: &[PlayerInfo],
        _settings: &serde_json::Map<String, Value>,
        clock: &dyn Clock,
    ) -> (GameState, Value) {
        let tappers = players
            .iter()
            .map(|p| Tapper {
                id: p.id.clone(),
                name: p.name.clone(),
                reaction_times: Vec::new(),
                tapped_this_round: false,
            })
            .collect();

        let state = TapState {
            tappers,
            round: 1,
            signal_at_ms: clock.now_ms() + random_delay(),
            signal_shown: false,
            round_over: false,
            round_ended_at_ms: 0,
            finished: false,
        };
        (Box::new(state), json!({ "totalRounds": TOTAL_ROUNDS }))
    }

    fn on_input(
        &mut self,
        state: GameState,
        player: &PlayerId,
        payload: &Value,
        clock: &dyn Clock,
    ) -> GameState {
        let mut boxed = match state.downcast::<TapState>() {
            Ok(s) => s,
            Err(other) => return other,
        };
        apply_tap(&mut boxed, player, payload, clock);
        boxed
    }

    fn tick(&mut self, state: GameState, _dt: f64, clock: &dyn Clock) -> GameState {
        let mut boxed = match state.downcast::<TapState>() {
            Ok(s) => s,
            Err(other) => return other,
        };
        advance(&mut boxed, clock);
        boxed
    }

    fn serialize(&self, state: &GameState, _prev: Option<&Value>) -> Serialized {
        let Some(tap) = state.downcast_ref::<TapState>() else {
            return Serialized::full(Value::Null);
        };
        let players: Vec<Value> = tap
            .tappers
            .iter()
            .map(|p| {
                json!({
                    "id": p.id,
                    "name": p.name,
                    "reactionTimes": p.reaction_times,
                    "tappedThisRound": p.tapped_this_round,
                    "avgMs": average_ms(&p.reaction_times),
                })
            })
            .collect();
        Serialized::full(json!({
            "round": tap.round,
            "totalRounds": TOTAL_ROUNDS,
            "signalShown": tap.signal_shown,
            "roundOver": tap.round_over,
            "finished": tap.finished,
            "players": players,
        }))
    }

    fn is_game_over(&self, state: &GameState, _clock: &dyn Clock) -> bool {
        state
            .downcast_ref::<TapState>()
            .is_some_and(|tap| tap.finished)
    }

    fn results(&self, state: &GameState) -> Vec<GameResult> {
        let Some(tap) = state.downcast_ref::<TapState>() else {
            return Vec::new();
        };

        // Ascending average reaction time; stable, so ties keep join order.
        let mut ranked: Vec<&Tapper> = tap.tappers.iter().collect();
        ranked.sort_by_key(|p| average_ms(&p.reaction_times));

        ranked
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let false_starts =
                    p.reaction_times.iter().filter(|&&t| t == FALSE_START).count();
                GameResult {
                    player_id: p.id.clone(),
                    player_name: p.name.clone(),
                    score: (100 - 20 * i as i64).max(10),
                    rank: i as u32 + 1,
                    stats: Some(serde_json::Map::from_iter([
                        ("avgMs".to_string(), json!(average_ms(&p.reaction_times))),
                        ("falseStarts".to_string(), json!(false_starts)),
                    ])),
                }
            })
            .collect()
    }

    fn on_player_disconnect(
        &mut self,
        state: GameState,
        player: &PlayerId,
        _clock: &dyn Clock,
    ) -> GameState {
        let mut boxed = match state.downcast::<TapState>() {
            Ok(s) => s,
            Err(other) => return other,
        };
        // Credit the current round as a timeout so later rounds (and the
        // round-close logic) don't wait on them. They stay in the ranking.
        if let Some(p) = boxed.tappers.iter_mut().find(|p| &p.id == player) {
            if !p.tapped_this_round {
                p.tapped_this_round = true;
                p.reaction_times.push(ROUND_TIMEOUT_MS as i64);
            }
        }
        boxed
    }
}

fn apply_tap(tap: &mut TapState, player: &PlayerId, payload: &Value, clock: &dyn Clock) {
    if payload.get("action").and_then(Value::as_str) != Some("tap") {
        tracing::debug!(%player, "reaction-speed input rejected: bad shape");
        return;
    }
    if tap.finished || tap.round_over {
        return;
    }

    let now = clock.now_ms();
    let signal_shown = tap.signal_shown;
    let signal_at = tap.signal_at_ms;

    let Some(p) = tap.tappers.iter_mut().find(|p| &p.id == player) else {
        return;
    };
    if p.tapped_this_round {
        return;
    }

    p.tapped_this_round = true;
    if signal_shown {
        p.reaction_times.push(now.saturating_sub(signal_at) as i64);
    } else {
        p.reaction_times.push(FALSE_START);
    }

    // Last tap of the round closes it in the same update.
    if tap.tappers.iter().all(|p| p.tapped_this_round) {
        tap.round_over = true;
        tap.round_ended_at_ms = now;
    }
}

fn advance(tap: &mut TapState, clock: &dyn Clock) {
    if tap.finished {
        return;
    }
    let now = clock.now_ms();

    if !tap.signal_shown && now >= tap.signal_at_ms {
        tap.signal_shown = true;
    }

    // Timeout: credit anyone still waiting and close the round.
    if tap.signal_shown
        && !tap.round_over
        && now.saturating_sub(tap.signal_at_ms) > ROUND_TIMEOUT_MS
    {
        for p in &mut tap.tappers {
            if !p.tapped_this_round {
                p.tapped_this_round = true;
                p.reaction_times.push(ROUND_TIMEOUT_MS as i64);
            }
        }
        tap.round_over = true;
        tap.round_ended_at_ms = now;
    }

    // Pause between rounds, then either the next round or the finish.
    if tap.round_over && now.saturating_sub(tap.round_ended_at_ms) > ROUND_PAUSE_MS {
        if tap.round >= TOTAL_ROUNDS {
            tap.finished = true;
        } else {
            tap.round += 1;
            tap.signal_at_ms = now + random_delay();
            tap.signal_shown = false;
            tap.round_over = false;
            tap.round_ended_at_ms = 0;
            for p in &mut tap.tappers {
                p.tapped_this_round = false;
            }
        }
    }
}
