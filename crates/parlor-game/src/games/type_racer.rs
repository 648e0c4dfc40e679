//! Turn-based reference game: race to type a passage.
//!
//! Each player submits their typed text as they go; only strict prefixes
//! of the target passage are accepted. The race ends when everyone has
//! finished or the duration elapses (observed on the next input, since
//! turn-based games have no tick).

use parlor_protocol::{GameResult, PlayerId, PlayerInfo};
use rand::Rng;
use serde_json::{json, Value};

use crate::{Clock, GameMeta, GameModule, GameState, GameTiming, Serialized, TimingMode};

pub static META: GameMeta = GameMeta {
    game_id: "type-racer",
    display_name: "Type Racer",
    description: "Race to type a passage the fastest!",
    min_players: 1,
    max_players: 10,
    timing: GameTiming {
        mode: TimingMode::TurnBased,
        tick_hz: 0,
        broadcast_hz: 0,
        max_duration_secs: 60,
    },
};

const SHORT_PASSAGES: &[&str] = &[
    "The quick brown fox jumps over the lazy dog.",
    "How vexingly quick daft zebras jump.",
    "Pack my box with five dozen liquor jugs.",
    "Six big juicy steaks sizzled in the pan.",
    "The job requires extra pluck and zeal.",
];

const MEDIUM_PASSAGES: &[&str] = &[
    "The quick brown fox jumps over the lazy dog. Pack my box with five dozen liquor jugs.",
    "How vexingly quick daft zebras jump. The five boxing wizards jump quickly at dawn.",
    "Amazingly few discotheques provide jukeboxes. Crazy Frederick bought many very exquisite opal jewels.",
    "The wizard quickly jinxed the gnomes before they vaporized. Six big juicy steaks sizzled in the pan.",
    "Grumpy wizards make toxic brew for the evil queen and jack. The job requires extra pluck and zeal.",
];

const LONG_PASSAGES: &[&str] = &[
    "The quick brown fox jumps over the lazy dog. Pack my box with five dozen liquor jugs. How vexingly quick daft zebras jump. The five boxing wizards jump quickly at dawn.",
    "Amazingly few discotheques provide jukeboxes. Crazy Frederick bought many very exquisite opal jewels. The wizard quickly jinxed the gnomes before they vaporized. Six big juicy steaks sizzled in the pan.",
    "We promptly judged antique ivory buckles for the next prize. A quart jar of oil mixed with zinc oxide makes a bright paint. Grumpy wizards make toxic brew for the evil queen and jack. The job requires extra pluck and zeal.",
];

const MIN_DURATION_SECS: u64 = 15;
const MAX_DURATION_SECS: u64 = 300;

#[derive(Debug)]
struct Racer {
    id: PlayerId,
    name: String,
    typed: String,
    wpm: u32,
    finished: bool,
    finish_ms: Option<u64>,
}

#[derive(Debug)]
struct RaceState {
    text: String,
    racers: Vec<Racer>,
    started_at_ms: u64,
    duration_secs: u64,
}

impl RaceState {
    fn progress(&self, racer: &Racer) -> f64 {
        if self.text.is_empty() {
            0.0
        } else {
            racer.typed.len() as f64 / self.text.len() as f64
        }
    }
}

/// Factory used by the registry.
pub fn boxed() -> Box<dyn GameModule> {
    Box::new(TypeRacer)
}

pub struct TypeRacer;

impl GameModule for TypeRacer {
    fn meta(&self) -> &'static GameMeta {
        &META
    }

    fn init(
        &mut self,
        players: &[PlayerInfo],
        settings: &serde_json::Map<String, Value>,
        clock: &dyn Clock,
    ) -> (GameState, Value) {
        let pool = match settings.get("passageLength").and_then(Value::as_str) {
            Some("short") => SHORT_PASSAGES,
            Some("long") => LONG_PASSAGES,
            _ => MEDIUM_PASSAGES,
        };
        let text = pool[rand::rng().random_range(0..pool.len())].to_owned();

        let duration_secs = settings
            .get("timeLimit")
            .and_then(Value::as_u64)
            .unwrap_or(META.timing.max_duration_secs)
            .clamp(MIN_DURATION_SECS, MAX_DURATION_SECS);

        let racers = players
            .iter()
            .map(|p| Racer {
                id: p.id.clone(),
                name: p.name.clone(),
                typed: String::new(),
                wpm: 0,
                finished: false,
                finish_ms: None,
            })
            .collect();

        let config = json!({ "text": text, "durationSecs": duration_secs });
        let state = RaceState {
            text,
            racers,
            started_at_ms: clock.now_ms(),
            duration_secs,
        };
        (Box::new(state), config)
    }

    fn on_input(
        &mut self,
        state: GameState,
        player: &PlayerId,
        payload: &Value,
        clock: &dyn Clock,
    ) -> GameState {
        let mut race = match state.downcast::<RaceState>() {
            Ok(s) => s,
            Err(other) => return other,
        };
        apply_input(&mut race, player, payload, clock);
        race
    }

    fn serialize(&self, state: &GameState, _prev: Option<&Value>) -> Serialized {
        let Some(race) = state.downcast_ref::<RaceState>() else {
            return Serialized::full(Value::Null);
        };
        let players: Vec<Value> = race
            .racers
            .iter()
            .map(|r| {
                json!({
                    "id": r.id,
                    "name": r.name,
                    "progress": race.progress(r),
                    "wpm": r.wpm,
                    "finished": r.finished,
                })
            })
            .collect();
        Serialized::full(json!({
            "text": race.text,
            "players": players,
            "durationSecs": race.duration_secs,
        }))
    }

    fn is_game_over(&self, state: &GameState, clock: &dyn Clock) -> bool {
        let Some(race) = state.downcast_ref::<RaceState>() else {
            return false;
        };
        let all_finished = race.racers.iter().all(|r| r.finished);
        let timed_out =
            clock.now_ms().saturating_sub(race.started_at_ms) > race.duration_secs * 1000;
        all_finished || timed_out
    }

    fn results(&self, state: &GameState) -> Vec<GameResult> {
        let Some(race) = state.downcast_ref::<RaceState>() else {
            return Vec::new();
        };

        // Finished racers by finish time ascending, then unfinished by
        // characters typed descending. Stable, so ties keep join order.
        let mut ranked: Vec<&Racer> = race.racers.iter().collect();
        ranked.sort_by(|a, b| match (a.finished, b.finished) {
            (true, true) => a.finish_ms.cmp(&b.finish_ms),
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            (false, false) => b.typed.len().cmp(&a.typed.len()),
        });

        ranked
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let progress = race.progress(r);
                let score = if r.finished {
                    (100 - 20 * i as i64).max(10)
                } else {
                    (progress * 50.0).round() as i64
                };
                GameResult {
                    player_id: r.id.clone(),
                    player_name: r.name.clone(),
                    score,
                    rank: i as u32 + 1,
                    stats: Some(serde_json::Map::from_iter([
                        ("wpm".to_string(), json!(r.wpm)),
                        ("progress".to_string(), json!(progress)),
                    ])),
                }
            })
            .collect()
    }

    fn on_player_disconnect(
        &mut self,
        state: GameState,
        player: &PlayerId,
        clock: &dyn Clock,
    ) -> GameState {
        let mut race = match state.downcast::<RaceState>() {
            Ok(s) => s,
            Err(other) => return other,
        };
        if let Some(r) = race.racers.iter_mut().find(|r| &r.id == player) {
            if !r.finished {
                // Auto-finish at the moment of disconnect so the race can
                // still resolve; they rank by that instant.
                r.finished = true;
                r.finish_ms = Some(clock.now_ms());
            }
        }
        race
    }
}

fn apply_input(race: &mut RaceState, player: &PlayerId, payload: &Value, clock: &dyn Clock) {
    let Some(typed) = payload.get("typed").and_then(Value::as_str) else {
        tracing::debug!(%player, "type-racer input rejected: bad shape");
        return;
    };
    // A valid submission is a prefix of the target; this also rules out
    // anything longer than the passage.
    if !race.text.starts_with(typed) {
        return;
    }

    let now = clock.now_ms();
    let full_text = typed == race.text;
    let elapsed_min = now.saturating_sub(race.started_at_ms) as f64 / 60_000.0;

    let Some(r) = race.racers.iter_mut().find(|r| &r.id == player) else {
        return;
    };
    if r.finished {
        return;
    }

    r.typed = typed.to_owned();
    if elapsed_min > 0.0 {
        let words = r.typed.split_whitespace().count();
        r.wpm = (words as f64 / elapsed_min).round() as u32;
    }
    if full_text {
        r.finished = true;
        r.finish_ms = Some(now);
    }
}
