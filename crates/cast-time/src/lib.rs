//! Clock sources and tick scheduling for cast playback.
//!
//! A playback timer needs a pluggable source of periodic "tick" callbacks plus
//! a notion of "now". That source is the [`Ticker`] trait, with three
//! interchangeable implementations:
//!
//! - [`ManualTicker`] — advanced explicitly by a test driver or deterministic
//!   scheduler; no real clock involved.
//! - [`IntervalTicker`] — fires at a fixed wall-clock period through a host
//!   [`IntervalScheduler`].
//! - [`FrameTicker`] — an explicit re-arm loop over one-shot host frame
//!   requests ([`FrameScheduler`]), so its rate tracks the host's redraw
//!   cadence.
//!
//! Hosts that don't bring their own timer facility can pump an [`EventLoop`],
//! a deadline-heap scheduler that implements both scheduler traits over a
//! [`HostClock`]. Unit tests drive everything through [`FakeHostClock`].
//!
//! All time values are `f64` milliseconds and monotonically non-decreasing.

mod clock;
mod event_loop;
mod frame;
mod interval;
mod manual;
mod ticker;

pub use clock::{FakeHostClock, HostClock, StdHostClock};
pub use event_loop::{EventLoop, FrameScheduler, IntervalScheduler, TaskId, DEFAULT_FRAME_INTERVAL_MS};
pub use frame::FrameTicker;
pub use interval::IntervalTicker;
pub use manual::ManualTicker;
pub use ticker::{TickFn, Ticker, DEFAULT_TICK_INTERVAL_MS};
