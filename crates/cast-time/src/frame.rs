use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::event_loop::{FrameScheduler, TaskId};
use crate::ticker::{TickFn, Ticker};

/// Frame-synchronized ticker: an explicit re-arm loop over one-shot host
/// frame requests, so its effective rate tracks the host's redraw cadence.
///
/// Each delivered frame invokes the registered callback and then requests the
/// next frame, unless `stop()` (or a replacing `start()`) intervened. `stop`
/// cancels the pending request and guarantees no new request is armed; a
/// frame the host has already dispatched when `stop` is called still reaches
/// this ticker once, but finds no registration and invokes nothing.
#[derive(Clone)]
pub struct FrameTicker<S: FrameScheduler + Clone + 'static> {
    inner: Rc<RefCell<Inner<S>>>,
}

struct Inner<S> {
    scheduler: S,
    pending: Option<TaskId>,
    callback: Option<TickFn>,
    // Bumped on every start/stop; a frame delivery only restores the callback
    // and re-arms if no start/stop happened while the callback ran.
    epoch: u64,
}

impl<S: FrameScheduler + Clone + 'static> FrameTicker<S> {
    pub fn new(scheduler: S) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                scheduler,
                pending: None,
                callback: None,
                epoch: 0,
            })),
        }
    }

    fn arm(inner: &Rc<RefCell<Inner<S>>>) {
        let scheduler = inner.borrow().scheduler.clone();
        let handle = Rc::clone(inner);
        let task = scheduler.request_frame(Box::new(move || Self::on_frame(&handle)));
        inner.borrow_mut().pending = Some(task);
    }

    fn on_frame(inner: &Rc<RefCell<Inner<S>>>) {
        let (callback, epoch) = {
            let mut inner = inner.borrow_mut();
            inner.pending = None;
            (inner.callback.take(), inner.epoch)
        };
        // Stopped between dispatch and delivery: nothing to invoke.
        let Some(mut callback) = callback else {
            trace!("frame delivered after stop");
            return;
        };
        callback();
        let rearm = {
            let mut inner = inner.borrow_mut();
            if inner.epoch == epoch && inner.callback.is_none() {
                inner.callback = Some(callback);
                true
            } else {
                false
            }
        };
        if rearm {
            Self::arm(inner);
        }
    }
}

impl<S: FrameScheduler + Clone + 'static> Ticker for FrameTicker<S> {
    fn start(&mut self, callback: TickFn) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.epoch += 1;
            if let Some(task) = inner.pending.take() {
                inner.scheduler.cancel_frame(task);
            }
            inner.callback = Some(callback);
        }
        Self::arm(&self.inner);
    }

    fn stop(&mut self) {
        let mut inner = self.inner.borrow_mut();
        inner.epoch += 1;
        if let Some(task) = inner.pending.take() {
            inner.scheduler.cancel_frame(task);
        }
        inner.callback = None;
    }

    fn now(&self) -> f64 {
        self.inner.borrow().scheduler.now_ms()
    }
}
