//! Injected time source for game logic.
//!
//! Game rules need "now" for WPM, signal delays, and timeouts, but
//! reading the system clock inside a module makes those rules untestable.
//! The room owns a [`Clock`] and passes it into every module call;
//! production uses [`MonotonicClock`], tests use [`ManualClock`] and
//! advance time explicitly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A monotonic, room-relative time source in milliseconds.
pub trait Clock: Send + Sync {
    /// Milliseconds elapsed since the clock's epoch (room creation).
    fn now_ms(&self) -> u64;
}

/// Production clock backed by `Instant`, anchored at creation.
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock for tests. Time moves only when told to.
pub struct ManualClock {
    ms: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            ms: AtomicU64::new(start_ms),
        }
    }

    /// Jumps to an absolute time. Must not move backwards.
    pub fn set(&self, ms: u64) {
        self.ms.store(ms, Ordering::SeqCst);
    }

    /// Moves time forward by `ms` milliseconds.
    pub fn advance(&self, ms: u64) {
        self.ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.ms.load(Ordering::SeqCst)
    }
}
