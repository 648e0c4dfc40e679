//! Mini-game modules for Parlor.
//!
//! A room runs at most one game at a time, chosen at runtime by id. Every
//! mini-game implements the [`GameModule`] contract over an opaque state
//! value that the room owns but never interprets; the [`registry`] maps
//! game ids to metadata and factories.
//!
//! # Key types
//!
//! - [`GameModule`] — the trait every mini-game implements
//! - [`GameMeta`] / [`GameTiming`] — player-count and timing limits
//! - [`Clock`] — injected time source, so game rules never read the
//!   system clock directly
//! - [`registry`] — id → (meta, factory) lookup

mod clock;
mod module;

pub mod games;
pub mod registry;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use module::{GameMeta, GameModule, GameState, GameTiming, Serialized, TimingMode};
