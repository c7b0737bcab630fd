use std::cell::RefCell;
use std::rc::Rc;

use crate::ticker::{TickFn, Ticker, DEFAULT_TICK_INTERVAL_MS};

/// Manually advanced ticker for deterministic, test-controlled time.
///
/// `now()` starts at 0 and advances by a fixed interval on every [`tick`]
/// call, which also invokes the registered callback. No real clock is
/// consulted. Clones share state, so a driver can keep ticking a handle whose
/// twin is owned by a timer.
///
/// [`tick`]: ManualTicker::tick
#[derive(Clone)]
pub struct ManualTicker {
    inner: Rc<RefCell<Inner>>,
}

struct Inner {
    now_ms: f64,
    interval_ms: f64,
    callback: Option<TickFn>,
    // Bumped on every start/stop so a registration replaced from inside a
    // running callback is not resurrected when the callback returns.
    epoch: u64,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_TICK_INTERVAL_MS)
    }

    pub fn with_interval(interval_ms: f64) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                now_ms: 0.0,
                interval_ms,
                callback: None,
                epoch: 0,
            })),
        }
    }

    pub fn interval_ms(&self) -> f64 {
        self.inner.borrow().interval_ms
    }

    /// Advances `now()` by one interval and invokes the registered callback,
    /// if any. The callback may freely call back into this ticker (including
    /// `stop` or a replacing `start`).
    pub fn tick(&self) {
        let (callback, epoch) = {
            let mut inner = self.inner.borrow_mut();
            inner.now_ms += inner.interval_ms;
            (inner.callback.take(), inner.epoch)
        };
        if let Some(mut callback) = callback {
            callback();
            let mut inner = self.inner.borrow_mut();
            if inner.epoch == epoch && inner.callback.is_none() {
                inner.callback = Some(callback);
            }
        }
    }
}

impl Default for ManualTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl Ticker for ManualTicker {
    fn start(&mut self, callback: TickFn) {
        let mut inner = self.inner.borrow_mut();
        inner.epoch += 1;
        inner.callback = Some(callback);
    }

    fn stop(&mut self) {
        let mut inner = self.inner.borrow_mut();
        inner.epoch += 1;
        inner.callback = None;
    }

    fn now(&self) -> f64 {
        self.inner.borrow().now_ms
    }
}
