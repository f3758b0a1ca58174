//! The shared countdown timer.
//!
//! `Countdown` is a plain state machine: it never spawns tasks or reads the
//! clock. Whoever owns it (the hub actor) drives it by calling [`Countdown::tick`]
//! once per tick interval and relays the returned state to observers.
//!
//! ```text
//!            set(d)                 start()             tick() reaches 0
//!   any ───────────────▶ Idle(d) ──────────▶ Running ───────────────────▶ Finished
//!                          ▲                  │   ▲
//!                          │         pause()  │   │ start()
//!                          │                  ▼   │
//!            stop()        │                 Paused
//!   any ───────────────▶ Idle(0)
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DomainError, DomainResult};

/// Observable timer state, as broadcast to config peers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountdownState {
    /// Milliseconds left on the timer.
    pub remaining_ms: u64,
    /// Whether the timer is currently counting down.
    pub running: bool,
}

/// Phase of the countdown state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownPhase {
    /// Holding a value set by `set()` or zeroed by `stop()`.
    Idle,
    /// Counting down on every tick.
    Running,
    /// Frozen by `pause()`; `start()` resumes from the frozen value.
    Paused,
    /// Reached zero on its own.
    Finished,
}

/// Result of advancing the countdown by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The timer was not running; nothing changed.
    Inactive,
    /// The timer advanced and is still running.
    Ticked(CountdownState),
    /// The timer reached zero on this tick.
    Finished(CountdownState),
}

/// The session countdown.
#[derive(Debug, Clone)]
pub struct Countdown {
    remaining_ms: u64,
    phase: CountdownPhase,
}

impl Countdown {
    /// Creates an idle countdown with nothing on the clock.
    pub fn new() -> Self {
        Self {
            remaining_ms: 0,
            phase: CountdownPhase::Idle,
        }
    }

    /// Returns the observable state.
    pub fn state(&self) -> CountdownState {
        CountdownState {
            remaining_ms: self.remaining_ms,
            running: self.is_running(),
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> CountdownPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == CountdownPhase::Running
    }

    /// Loads a duration and halts the timer.
    pub fn set(&mut self, duration_ms: u64) {
        debug!(duration_ms, "Countdown set");
        self.remaining_ms = duration_ms;
        self.phase = CountdownPhase::Idle;
    }

    /// Loads a duration decoded from a JSON command value.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidDuration` without touching the timer if
    /// the value is not a non-negative whole number.
    pub fn set_value(&mut self, value: &serde_json::Value) -> DomainResult<()> {
        let duration_ms = parse_duration_ms(value)?;
        self.set(duration_ms);
        Ok(())
    }

    /// Starts (or resumes) the countdown.
    ///
    /// Returns `true` if the timer transitioned to running. Starting a
    /// running timer, or one with nothing left on it, does nothing.
    pub fn start(&mut self) -> bool {
        if self.is_running() || self.remaining_ms == 0 {
            return false;
        }
        debug!(remaining_ms = self.remaining_ms, "Countdown started");
        self.phase = CountdownPhase::Running;
        true
    }

    /// Freezes a running countdown. Returns `true` if it was running.
    pub fn pause(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        debug!(remaining_ms = self.remaining_ms, "Countdown paused");
        self.phase = CountdownPhase::Paused;
        true
    }

    /// Zeroes and halts the countdown.
    pub fn stop(&mut self) {
        debug!("Countdown stopped");
        self.remaining_ms = 0;
        self.phase = CountdownPhase::Idle;
    }

    /// Advances a running countdown by `elapsed`.
    ///
    /// Reaching zero moves the timer to `Finished` and reports
    /// `TickOutcome::Finished` exactly once; later ticks are inactive.
    pub fn tick(&mut self, elapsed: Duration) -> TickOutcome {
        if !self.is_running() {
            return TickOutcome::Inactive;
        }

        let step = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.remaining_ms = self.remaining_ms.saturating_sub(step);

        if self.remaining_ms == 0 {
            debug!("Countdown finished");
            self.phase = CountdownPhase::Finished;
            TickOutcome::Finished(self.state())
        } else {
            TickOutcome::Ticked(self.state())
        }
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes a `timer-set` value into milliseconds.
///
/// Accepts JSON integers and floats without a fractional part, as long as
/// they are non-negative. Everything else is `InvalidDuration`.
pub fn parse_duration_ms(value: &serde_json::Value) -> DomainResult<u64> {
    let invalid = || DomainError::InvalidDuration {
        value: value.to_string(),
    };

    let number = value.as_number().ok_or_else(invalid)?;

    if let Some(ms) = number.as_u64() {
        return Ok(ms);
    }
    if number.is_i64() {
        // as_u64 failed, so it is negative
        return Err(invalid());
    }

    match number.as_f64() {
        Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
            Ok(f as u64)
        }
        _ => Err(invalid()),
    }
}
