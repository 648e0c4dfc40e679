//! Static game registry: id → (metadata, factory).

use crate::games::{reaction_speed, type_racer};
use crate::{GameMeta, GameModule};

type Factory = fn() -> Box<dyn GameModule>;

static GAMES: &[(&GameMeta, Factory)] = &[
    (&type_racer::META, type_racer::boxed),
    (&reaction_speed::META, reaction_speed::boxed),
];

/// Creates a fresh module instance for `game_id`, or `None` for an
/// unknown id.
pub fn create(game_id: &str) -> Option<Box<dyn GameModule>> {
    GAMES
        .iter()
        .find(|(meta, _)| meta.game_id == game_id)
        .map(|(_, factory)| factory())
}

/// Looks up the static metadata for `game_id`.
pub fn meta(game_id: &str) -> Option<&'static GameMeta> {
    GAMES
        .iter()
        .find(|(meta, _)| meta.game_id == game_id)
        .map(|(meta, _)| *meta)
}

/// All registered games, in registration order.
pub fn available() -> impl Iterator<Item = &'static GameMeta> {
    GAMES.iter().map(|(meta, _)| *meta)
}
