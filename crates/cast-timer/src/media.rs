use std::cell::RefCell;
use std::rc::Rc;

use cast_time::{FrameScheduler, FrameTicker, Ticker};
use tracing::debug;

use crate::{
    progress_ratio, validate_timescale, ReadyCallback, StateCallback, TickCallback, Timer,
    TimerState, TimescaleError,
};

/// Events a [`MediaElement`] reports to its subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaEvent {
    /// The element has buffered enough to begin playback.
    CanPlay,
    Play,
    Pause,
    Ended,
}

/// External playable media resource a [`MediaTimer`] binds to.
///
/// Positions and durations cross this boundary in seconds (the native unit of
/// media elements); the timer surface converts to and from milliseconds.
/// Implementations are cheap-clone handles. `subscribe` holds one callback
/// per event kind per subscriber; the element invokes it on each occurrence.
pub trait MediaElement {
    fn position_s(&self) -> f64;
    fn set_position_s(&self, seconds: f64);
    fn duration_s(&self) -> f64;
    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&self, rate: f64);
    fn paused(&self) -> bool;
    fn ended(&self) -> bool;
    fn play(&self);
    fn pause(&self);
    fn subscribe(&self, event: MediaEvent, callback: Box<dyn FnMut()>);
}

/// Timer slaved to an external [`MediaElement`].
///
/// The element's own clock is authoritative: time, duration, and rate are
/// read through (and written through) to it, and state transitions mirror its
/// play/pause/ended events. A [`FrameTicker`] polls the element position at
/// redraw cadence while playing, purely to re-emit tick notifications; there
/// is no independent accumulation.
///
/// Until the element signals [`MediaEvent::CanPlay`], the timer is not ready
/// and `start`/`pause`/`stop`/`seek` are no-ops.
pub struct MediaTimer<M, S>
where
    M: MediaElement + Clone + 'static,
    S: FrameScheduler + Clone + 'static,
{
    media: M,
    ticker: FrameTicker<S>,
    inner: Rc<RefCell<Inner>>,
}

struct Inner {
    ready: bool,
    state: TimerState,
    on_tick: Option<TickCallback>,
    on_state_change: Option<StateCallback>,
    on_ready: Option<ReadyCallback>,
}

impl<M, S> MediaTimer<M, S>
where
    M: MediaElement + Clone + 'static,
    S: FrameScheduler + Clone + 'static,
{
    pub fn new(media: M, scheduler: S) -> Self {
        let ticker = FrameTicker::new(scheduler);
        let inner = Rc::new(RefCell::new(Inner {
            ready: false,
            state: TimerState::Paused,
            on_tick: None,
            on_state_change: None,
            on_ready: None,
        }));

        {
            let inner = Rc::clone(&inner);
            media.subscribe(
                MediaEvent::CanPlay,
                Box::new(move || {
                    let ready_cb = {
                        let mut inner = inner.borrow_mut();
                        inner.ready = true;
                        inner.on_ready.take()
                    };
                    debug!("media element ready");
                    if let Some(ready_cb) = ready_cb {
                        ready_cb();
                    }
                }),
            );
        }
        {
            let inner = Rc::clone(&inner);
            let ticker = ticker.clone();
            let poll_media = media.clone();
            media.subscribe(
                MediaEvent::Play,
                Box::new(move || {
                    let handler_inner = Rc::clone(&inner);
                    let media = poll_media.clone();
                    ticker.clone().start(Box::new(move || {
                        notify_tick(&handler_inner, media.position_s() * 1000.0);
                    }));
                    set_state(&inner, TimerState::Running);
                }),
            );
        }
        {
            let inner = Rc::clone(&inner);
            let ticker = ticker.clone();
            media.subscribe(
                MediaEvent::Pause,
                Box::new(move || {
                    ticker.clone().stop();
                    // A pause event delivered after the timer was already
                    // stopped (ended, or stopped by the host) stays stopped.
                    if inner.borrow().state == TimerState::Running {
                        set_state(&inner, TimerState::Paused);
                    }
                }),
            );
        }
        {
            let inner = Rc::clone(&inner);
            let ticker = ticker.clone();
            media.subscribe(
                MediaEvent::Ended,
                Box::new(move || {
                    ticker.clone().stop();
                    set_state(&inner, TimerState::Stopped);
                }),
            );
        }

        Self {
            media,
            ticker,
            inner,
        }
    }
}

impl<M, S> Timer for MediaTimer<M, S>
where
    M: MediaElement + Clone + 'static,
    S: FrameScheduler + Clone + 'static,
{
    fn start(&mut self) {
        if !self.is_ready() {
            return;
        }
        // State follows the element's play event.
        self.media.play();
    }

    fn pause(&mut self) {
        if !self.is_ready() {
            return;
        }
        self.media.pause();
    }

    fn stop(&mut self) {
        if !self.is_ready() {
            return;
        }
        // Mark stopped first so the element's pause event does not surface an
        // intermediate paused transition.
        set_state(&self.inner, TimerState::Stopped);
        self.ticker.stop();
        self.media.pause();
    }

    fn time(&self) -> f64 {
        self.media.position_s() * 1000.0
    }

    fn seek(&mut self, time_ms: f64) {
        if !self.is_ready() {
            return;
        }
        // The element clamps to its own duration; only the lower bound is
        // normalized here. NaN lands on 0.
        self.media.set_position_s(time_ms.max(0.0) / 1000.0);
    }

    fn duration(&self) -> f64 {
        self.media.duration_s() * 1000.0
    }

    fn progress(&self) -> f64 {
        progress_ratio(self.time(), self.duration())
    }

    fn timescale(&self) -> f64 {
        self.media.playback_rate()
    }

    fn set_timescale(&mut self, timescale: f64) -> Result<(), TimescaleError> {
        let timescale = validate_timescale(timescale)?;
        self.media.set_playback_rate(timescale);
        Ok(())
    }

    fn state(&self) -> TimerState {
        self.inner.borrow().state
    }

    fn is_ready(&self) -> bool {
        self.inner.borrow().ready
    }

    fn on_tick(&mut self, callback: TickCallback) {
        self.inner.borrow_mut().on_tick = Some(callback);
    }

    fn on_state_change(&mut self, callback: StateCallback) {
        self.inner.borrow_mut().on_state_change = Some(callback);
    }

    fn on_ready(&mut self, callback: ReadyCallback) {
        if self.is_ready() {
            callback();
        } else {
            self.inner.borrow_mut().on_ready = Some(callback);
        }
    }
}

impl<M, S> Drop for MediaTimer<M, S>
where
    M: MediaElement + Clone + 'static,
    S: FrameScheduler + Clone + 'static,
{
    fn drop(&mut self) {
        self.ticker.stop();
    }
}

fn set_state(inner: &Rc<RefCell<Inner>>, new: TimerState) {
    let callback = {
        let mut inner = inner.borrow_mut();
        if inner.state == new {
            return;
        }
        debug!(from = ?inner.state, to = ?new, "media timer state change");
        inner.state = new;
        inner.on_state_change.take()
    };
    if let Some(mut callback) = callback {
        callback(new);
        let mut inner = inner.borrow_mut();
        if inner.on_state_change.is_none() {
            inner.on_state_change = Some(callback);
        }
    }
}

fn notify_tick(inner: &Rc<RefCell<Inner>>, time_ms: f64) {
    let callback = { inner.borrow_mut().on_tick.take() };
    if let Some(mut callback) = callback {
        callback(time_ms);
        let mut inner = inner.borrow_mut();
        if inner.on_tick.is_none() {
            inner.on_tick = Some(callback);
        }
    }
}
