/// Callback invoked by a [`Ticker`] on every tick cycle.
pub type TickFn = Box<dyn FnMut()>;

/// Default tick period used by the manual and wall-clock tickers (30 Hz).
pub const DEFAULT_TICK_INTERVAL_MS: f64 = 1000.0 / 30.0;

/// A pluggable source of periodic tick callbacks, queryable for "now".
///
/// A ticker holds at most one active registration: `start` implicitly replaces
/// any prior callback, and `stop` deregisters it. Implementations are cheap
/// handles over shared state, so the owning timer and an external driver (a
/// test, or the host pumping an event loop) can both hold one.
pub trait Ticker {
    /// Registers `callback` to be invoked on every tick cycle, replacing any
    /// prior registration.
    fn start(&mut self, callback: TickFn);

    /// Deregisters the active callback. Idempotent; safe when not started.
    fn stop(&mut self);

    /// Current time in milliseconds. Monotonically non-decreasing; the
    /// reference point is implementation-specific.
    fn now(&self) -> f64;
}
