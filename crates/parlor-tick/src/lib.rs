//! Room timer scheduler.
//!
//! A room needs at most three timers: a one-shot countdown (lobby →
//! playing), a simulation tick loop, and a broadcast loop that fans the
//! current state out at a lower rate. [`Scheduler`] owns all three and
//! exposes a single [`Scheduler::due`] future that resolves with
//! whichever deadline comes first — and pends forever while nothing is
//! armed, which is the correct behavior for a lobby or a turn-based game.
//!
//! # Integration
//!
//! The scheduler sits inside a room actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         due = scheduler.due() => match due {
//!             Due::Countdown => { /* countdown elapsed */ }
//!             Due::Tick { dt } => { /* advance simulation by dt */ }
//!             Due::Broadcast => { /* fan out current state */ }
//!         }
//!     }
//! }
//! ```
//!
//! Arming a timer replaces any previous deadline of that kind, so a
//! phase transition that re-arms cannot leave a stale timer behind; at
//! most one live timer of each kind exists per room.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::debug;

/// Which timer fired, returned by [`Scheduler::due`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Due {
    /// The one-shot countdown elapsed (and is now disarmed).
    Countdown,
    /// The simulation tick fired. `dt` is the real time elapsed since
    /// the previous tick (or since arming, for the first one), so game
    /// logic driven by it is accumulation-tolerant: a late tick carries
    /// a proportionally larger `dt`.
    Tick { dt: Duration },
    /// The broadcast loop fired.
    Broadcast,
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Countdown,
    Tick,
    Broadcast,
}

struct LoopTimer {
    period: Duration,
    next: Instant,
    last_fire: Instant,
}

impl LoopTimer {
    fn from_hz(hz: u32, now: Instant) -> Option<Self> {
        if hz == 0 {
            return None;
        }
        let period = Duration::from_secs_f64(1.0 / f64::from(hz));
        Some(Self {
            period,
            next: now + period,
            last_fire: now,
        })
    }
}

/// The three room timers behind a single awaitable.
pub struct Scheduler {
    countdown: Option<Instant>,
    tick: Option<LoopTimer>,
    broadcast: Option<LoopTimer>,
}

impl Scheduler {
    /// Creates an idle scheduler with nothing armed.
    pub fn new() -> Self {
        Self {
            countdown: None,
            tick: None,
            broadcast: None,
        }
    }

    /// Arms (or re-arms) the one-shot countdown to fire after `delay`.
    pub fn arm_countdown(&mut self, delay: Duration) {
        self.countdown = Some(Instant::now() + delay);
        debug!(?delay, "countdown armed");
    }

    /// Disarms a pending countdown, if any.
    pub fn cancel_countdown(&mut self) {
        self.countdown = None;
    }

    /// Arms the tick and broadcast loops. A rate of 0 leaves that loop
    /// unarmed. Replaces any previously running loops.
    pub fn arm_game_loop(&mut self, tick_hz: u32, broadcast_hz: u32) {
        let now = Instant::now();
        self.tick = LoopTimer::from_hz(tick_hz, now);
        self.broadcast = LoopTimer::from_hz(broadcast_hz, now);
        debug!(tick_hz, broadcast_hz, "game loop armed");
    }

    /// Stops both the tick and broadcast loops.
    pub fn cancel_game_loop(&mut self) {
        self.tick = None;
        self.broadcast = None;
    }

    /// Disarms everything.
    pub fn cancel_all(&mut self) {
        self.cancel_countdown();
        self.cancel_game_loop();
    }

    /// `true` when no timer is armed.
    pub fn is_idle(&self) -> bool {
        self.countdown.is_none() && self.tick.is_none() && self.broadcast.is_none()
    }

    /// Waits for the next armed deadline.
    ///
    /// Pends forever while idle — `tokio::select!` keeps servicing its
    /// other branches. Ties resolve countdown before tick before
    /// broadcast.
    pub async fn due(&mut self) -> Due {
        loop {
            let Some((deadline, kind)) = self.earliest() else {
                // Nothing armed: this future never completes.
                std::future::pending::<()>().await;
                unreachable!()
            };

            time::sleep_until(deadline).await;
            let now = Instant::now();

            match kind {
                Kind::Countdown => {
                    self.countdown = None;
                    return Due::Countdown;
                }
                Kind::Tick => {
                    if let Some(t) = &mut self.tick {
                        let dt = now.duration_since(t.last_fire);
                        t.last_fire = now;
                        // Reschedule from now, not from the missed
                        // deadline — a slow tick must not cause a burst.
                        t.next = now + t.period;
                        return Due::Tick { dt };
                    }
                }
                Kind::Broadcast => {
                    if let Some(t) = &mut self.broadcast {
                        t.next = now + t.period;
                        return Due::Broadcast;
                    }
                }
            }
        }
    }

    fn earliest(&self) -> Option<(Instant, Kind)> {
        let mut best: Option<(Instant, Kind)> = None;
        let candidates = [
            (self.countdown, Kind::Countdown),
            (self.tick.as_ref().map(|t| t.next), Kind::Tick),
            (self.broadcast.as_ref().map(|t| t.next), Kind::Broadcast),
        ];
        for (deadline, kind) in candidates {
            let Some(deadline) = deadline else { continue };
            match best {
                Some((current, _)) if current <= deadline => {}
                _ => best = Some((deadline, kind)),
            }
        }
        best
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
