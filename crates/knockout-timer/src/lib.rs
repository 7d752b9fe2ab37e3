//! Cancellable countdown timers for Knockout rooms.
//!
//! A [`TimedEvent`] counts down a whole number of units, calling `on_tick`
//! after each unit with the number of units left and `on_complete` once the
//! count reaches zero.
//!
//! # Cancellation
//!
//! Both callbacks run while the timer holds its internal gate, and
//! [`TimedEvent::cancel`] takes the same gate. When `cancel()` returns, any
//! callback that was already running has finished and none will start
//! afterwards, even if its unit elapsed a moment earlier. A callback must
//! therefore never cancel its own timer.
//!
//! # Integration
//!
//! Room actors don't touch game state from callbacks. They forward a signal
//! into their own channel and handle it inside the actor loop:
//!
//! ```ignore
//! let tx = timer_tx.clone();
//! let done = timer_tx.clone();
//! let event = TimedEvent::start(
//!     30,
//!     config.unit,
//!     move |left| { let _ = tx.send(Signal::Tick(left)); },
//!     move || { let _ = done.send(Signal::Expired); },
//! );
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Timer settings shared by every countdown in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// Length of one countdown unit. Default: one second.
    pub unit: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            unit: Duration::from_secs(1),
        }
    }
}

impl TimerConfig {
    /// Smallest unit a timer will run with.
    pub const MIN_UNIT: Duration = Duration::from_millis(1);

    /// A config with the given unit.
    pub fn with_unit(unit: Duration) -> Self {
        Self { unit }
    }

    /// Fix out-of-range values. A zero unit would spin the timer task, so it
    /// is raised to [`Self::MIN_UNIT`].
    pub fn validated(mut self) -> Self {
        if self.unit < Self::MIN_UNIT {
            warn!(unit = ?self.unit, min = ?Self::MIN_UNIT, "timer unit too small, clamping");
            self.unit = Self::MIN_UNIT;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// TimedEvent
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Gate {
    remaining: u32,
    cancelled: bool,
    finished: bool,
}

fn lock(gate: &Mutex<Gate>) -> MutexGuard<'_, Gate> {
    // A panicking callback poisons the gate; the flags are still coherent.
    gate.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A running countdown.
///
/// Dropping the handle cancels the countdown.
#[derive(Debug)]
pub struct TimedEvent {
    gate: Arc<Mutex<Gate>>,
    task: JoinHandle<()>,
    duration: u32,
}

impl TimedEvent {
    /// Start counting down `duration_units` units of length `unit`.
    ///
    /// `on_tick(remaining)` fires once per elapsed unit; the last tick
    /// reports 0. `on_complete` fires exactly once, right after that last
    /// tick. A zero-unit timer skips the ticks and completes straight away.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn start<T, C>(duration_units: u32, unit: Duration, mut on_tick: T, on_complete: C) -> Self
    where
        T: FnMut(u32) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let unit = TimerConfig::with_unit(unit).validated().unit;
        let gate = Arc::new(Mutex::new(Gate {
            remaining: duration_units,
            cancelled: false,
            finished: false,
        }));

        let shared = Arc::clone(&gate);
        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + unit, unit);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut remaining = duration_units;
            while remaining > 0 {
                ticker.tick().await;
                remaining -= 1;

                let mut state = lock(&shared);
                if state.cancelled {
                    return;
                }
                state.remaining = remaining;
                trace!(remaining, "timer tick");
                on_tick(remaining);
            }

            let mut state = lock(&shared);
            if state.cancelled {
                return;
            }
            state.finished = true;
            trace!("timer complete");
            on_complete();
        });

        Self {
            gate,
            task,
            duration: duration_units,
        }
    }

    /// Stop the countdown. Idempotent, and harmless after completion.
    ///
    /// Blocks briefly if a callback is running right now.
    pub fn cancel(&self) {
        {
            let mut state = lock(&self.gate);
            if !state.finished && !state.cancelled {
                trace!(remaining = state.remaining, "timer cancelled");
            }
            state.cancelled = true;
        }
        self.task.abort();
    }

    /// `true` once [`cancel`](Self::cancel) has been called (or the handle
    /// dropped).
    pub fn is_cancelled(&self) -> bool {
        lock(&self.gate).cancelled
    }

    /// `true` once `on_complete` has run.
    pub fn is_finished(&self) -> bool {
        lock(&self.gate).finished
    }

    /// Units left, as of the last tick.
    pub fn remaining(&self) -> u32 {
        lock(&self.gate).remaining
    }

    /// Units the countdown started with.
    pub fn duration(&self) -> u32 {
        self.duration
    }
}

impl Drop for TimedEvent {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_unit_is_one_second() {
        assert_eq!(TimerConfig::default().unit, Duration::from_secs(1));
    }

    #[test]
    fn test_validated_clamps_zero_unit() {
        let cfg = TimerConfig::with_unit(Duration::ZERO).validated();
        assert_eq!(cfg.unit, TimerConfig::MIN_UNIT);
    }

    #[test]
    fn test_validated_keeps_sane_unit() {
        let cfg = TimerConfig::with_unit(Duration::from_millis(250)).validated();
        assert_eq!(cfg.unit, Duration::from_millis(250));
    }
}
