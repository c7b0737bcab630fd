//! Playback timers for cast replay.
//!
//! A [`Timer`] tracks virtual playback time against a bounded duration and
//! reports progression to a host through callbacks. Two implementations:
//!
//! - [`SimpleTimer`] — accumulates its own virtual time from a
//!   [`Ticker`](cast_time::Ticker), with variable time-scaling, seeking, and
//!   delay compensation for seeks that take real time to service.
//! - [`MediaTimer`] — delegates time, duration, rate, and state to an
//!   external [`MediaElement`] (e.g. an audio track the cast is synchronized
//!   to), polling tick notifications at redraw cadence.
//!
//! All timer-surface times are `f64` milliseconds. Callback registration is
//! single-slot: registering a tick, state-change, or ready callback replaces
//! the previous one.

mod media;
mod simple;

pub use media::{MediaElement, MediaEvent, MediaTimer};
pub use simple::SimpleTimer;

use thiserror::Error;

/// Upper bound of the accepted timescale range `(0, MAX_TIMESCALE]`.
pub const MAX_TIMESCALE: f64 = 5.0;

/// Playback state of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerState {
    Running,
    Paused,
    Stopped,
}

/// Rejected timescale value. The timer's previous timescale is retained.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("timescale {value} is outside (0, 5]")]
pub struct TimescaleError {
    pub value: f64,
}

/// Host tick callback; receives the current virtual time in milliseconds.
pub type TickCallback = Box<dyn FnMut(f64)>;
/// Host state-change callback; fires only on actual transitions.
pub type StateCallback = Box<dyn FnMut(TimerState)>;
/// Host readiness callback; fires once, immediately if already ready.
pub type ReadyCallback = Box<dyn FnOnce()>;

/// Common playback-timer surface driven by a host.
pub trait Timer {
    /// Begins (or resumes) playback. No-op while running or when nothing is
    /// left to play.
    fn start(&mut self);
    /// Halts playback, keeping the current position. Idempotent.
    fn pause(&mut self);
    /// Halts playback terminally. Idempotent.
    fn stop(&mut self);

    /// Current virtual time in milliseconds, in `[0, duration]`.
    fn time(&self) -> f64;
    /// Seeks to `time_ms`. Negative targets clamp to 0; targets at or beyond
    /// the duration clamp to the duration and stop playback.
    fn seek(&mut self, time_ms: f64);

    /// Total playable duration in milliseconds; may be `f64::INFINITY`.
    fn duration(&self) -> f64;
    /// Fractional completion, `time / duration`.
    fn progress(&self) -> f64;

    fn timescale(&self) -> f64;
    /// Sets the real-to-virtual time multiplier. Values outside
    /// `(0, MAX_TIMESCALE]` (including NaN) are rejected and leave the prior
    /// value unchanged.
    fn set_timescale(&mut self, timescale: f64) -> Result<(), TimescaleError>;

    fn state(&self) -> TimerState;
    /// Whether the timer can begin playback.
    fn is_ready(&self) -> bool;

    /// Registers the tick callback, replacing any prior registration.
    fn on_tick(&mut self, callback: TickCallback);
    /// Registers the state-change callback, replacing any prior registration.
    fn on_state_change(&mut self, callback: StateCallback);
    /// Registers the ready callback; invoked immediately if already ready.
    fn on_ready(&mut self, callback: ReadyCallback);
}

// A zero-length cast has nothing left to play, so it reads as complete.
fn progress_ratio(time_ms: f64, duration_ms: f64) -> f64 {
    if duration_ms == 0.0 {
        1.0
    } else {
        time_ms / duration_ms
    }
}

fn validate_timescale(value: f64) -> Result<f64, TimescaleError> {
    // NaN fails both comparisons.
    if value > 0.0 && value <= MAX_TIMESCALE {
        Ok(value)
    } else {
        Err(TimescaleError { value })
    }
}
