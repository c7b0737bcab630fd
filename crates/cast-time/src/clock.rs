use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Monotonic host clock read in `f64` milliseconds.
pub trait HostClock {
    fn now_ms(&self) -> f64;
}

/// [`HostClock`] backed by [`std::time::Instant`], anchored at construction.
#[derive(Debug, Clone)]
pub struct StdHostClock {
    origin: Instant,
}

impl StdHostClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdHostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock for StdHostClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Deterministic clock for tests: advances only when told to.
///
/// Clones share the same underlying cell, so a clock handed to an
/// [`EventLoop`](crate::EventLoop) can still be advanced by the test driver.
#[derive(Debug, Clone, Default)]
pub struct FakeHostClock {
    now_ms: Rc<Cell<f64>>,
}

impl FakeHostClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock by `delta_ms`. Negative deltas are ignored to keep
    /// the clock monotonic.
    pub fn advance_ms(&self, delta_ms: f64) {
        if delta_ms > 0.0 {
            self.now_ms.set(self.now_ms.get() + delta_ms);
        }
    }

    /// Moves the clock forward to `target_ms` if it is in the future.
    pub fn set_ms(&self, target_ms: f64) {
        if target_ms > self.now_ms.get() {
            self.now_ms.set(target_ms);
        }
    }
}

impl HostClock for FakeHostClock {
    fn now_ms(&self) -> f64 {
        self.now_ms.get()
    }
}
