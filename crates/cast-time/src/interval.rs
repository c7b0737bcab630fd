use std::cell::RefCell;
use std::rc::Rc;

use crate::event_loop::{IntervalScheduler, TaskId};
use crate::ticker::{TickFn, Ticker, DEFAULT_TICK_INTERVAL_MS};

/// Wall-clock ticker: fires the registered callback at a fixed period through
/// the host's [`IntervalScheduler`].
///
/// `now()` reports the scheduler's wall-clock reading. Clones are handles to
/// the same registration.
#[derive(Clone)]
pub struct IntervalTicker<S: IntervalScheduler + Clone> {
    inner: Rc<RefCell<Inner<S>>>,
}

struct Inner<S> {
    scheduler: S,
    period_ms: f64,
    task: Option<TaskId>,
}

impl<S: IntervalScheduler + Clone> IntervalTicker<S> {
    pub fn new(scheduler: S) -> Self {
        Self::with_period(scheduler, DEFAULT_TICK_INTERVAL_MS)
    }

    pub fn with_period(scheduler: S, period_ms: f64) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                scheduler,
                period_ms,
                task: None,
            })),
        }
    }

    pub fn period_ms(&self) -> f64 {
        self.inner.borrow().period_ms
    }
}

impl<S: IntervalScheduler + Clone> Ticker for IntervalTicker<S> {
    fn start(&mut self, callback: TickFn) {
        let mut inner = self.inner.borrow_mut();
        if let Some(task) = inner.task.take() {
            inner.scheduler.clear_interval(task);
        }
        let task = inner.scheduler.set_interval(inner.period_ms, callback);
        inner.task = Some(task);
    }

    fn stop(&mut self) {
        let mut inner = self.inner.borrow_mut();
        if let Some(task) = inner.task.take() {
            inner.scheduler.clear_interval(task);
        }
    }

    fn now(&self) -> f64 {
        self.inner.borrow().scheduler.now_ms()
    }
}
