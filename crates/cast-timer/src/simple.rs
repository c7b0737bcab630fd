use std::cell::RefCell;
use std::rc::Rc;

use cast_time::Ticker;
use tracing::debug;

use crate::{
    validate_timescale, ReadyCallback, StateCallback, TickCallback, Timer, TimerState,
    TimescaleError,
};

/// Timer that accumulates virtual playback time from a [`Ticker`].
///
/// The ticker's clock and the virtual playback time are independent: on every
/// tick, the real time elapsed since the previous tick is scaled by the
/// timescale and added to the playback position, clamped to the duration.
/// Reaching the duration stops the timer. A seek resynchronizes against the
/// ticker's clock; [`add_delay`](SimpleTimer::add_delay) lets a host discount
/// real time spent servicing a blocking seek from the next tick's delta.
///
/// The initial state is [`TimerState::Paused`] with `time == 0`. Use
/// `f64::INFINITY` for an unbounded duration.
pub struct SimpleTimer<T: Ticker + Clone + 'static> {
    ticker: T,
    inner: Rc<RefCell<Inner>>,
}

struct Inner {
    duration_ms: f64,
    timescale: f64,
    time_ms: f64,
    state: TimerState,
    // Virtual real-time debt consumed before accumulation resumes.
    delay_ms: f64,
    last_tick_ms: f64,
    on_tick: Option<TickCallback>,
    on_state_change: Option<StateCallback>,
}

enum TickOutcome {
    /// Delay debt absorbed the whole elapsed span; no notification.
    Absorbed,
    Advanced(f64),
    ReachedEnd(f64),
}

impl<T: Ticker + Clone + 'static> SimpleTimer<T> {
    /// Creates a paused timer at position 0 over `ticker`. Negative (or NaN)
    /// durations are normalized to 0.
    pub fn new(ticker: T, duration_ms: f64) -> Self {
        Self {
            ticker,
            inner: Rc::new(RefCell::new(Inner {
                duration_ms: duration_ms.max(0.0),
                timescale: 1.0,
                time_ms: 0.0,
                state: TimerState::Paused,
                delay_ms: 0.0,
                last_tick_ms: 0.0,
                on_tick: None,
                on_state_change: None,
            })),
        }
    }

    /// Adds `delay_ms` (if positive) to the delay debt. The debt is eaten
    /// from subsequent ticks' elapsed time before any playback progress is
    /// accumulated, so real time the host knowingly spent (e.g. waiting on a
    /// blocking seek) does not count as playback.
    pub fn add_delay(&mut self, delay_ms: f64) {
        if delay_ms > 0.0 {
            self.inner.borrow_mut().delay_ms += delay_ms;
        }
    }

    fn handle_tick(inner: &Rc<RefCell<Inner>>, ticker: &T) {
        let now = ticker.now();
        let outcome = {
            let mut inner = inner.borrow_mut();
            let mut elapsed = now - inner.last_tick_ms;
            inner.last_tick_ms = now;

            let absorbed = if inner.delay_ms > 0.0 {
                if elapsed > inner.delay_ms {
                    elapsed -= inner.delay_ms;
                    inner.delay_ms = 0.0;
                    false
                } else {
                    // Still paying off the debt; no accumulation this cycle.
                    inner.delay_ms -= elapsed;
                    true
                }
            } else {
                false
            };

            if absorbed {
                TickOutcome::Absorbed
            } else {
                let delta = elapsed * inner.timescale;
                if inner.time_ms + delta >= inner.duration_ms {
                    inner.time_ms = inner.duration_ms;
                    TickOutcome::ReachedEnd(inner.time_ms)
                } else {
                    inner.time_ms += delta;
                    TickOutcome::Advanced(inner.time_ms)
                }
            }
        };

        match outcome {
            TickOutcome::Absorbed => {}
            TickOutcome::Advanced(time_ms) => notify_tick(inner, time_ms),
            TickOutcome::ReachedEnd(time_ms) => {
                ticker.clone().stop();
                set_state(inner, TimerState::Stopped);
                notify_tick(inner, time_ms);
            }
        }
    }
}

impl<T: Ticker + Clone + 'static> Timer for SimpleTimer<T> {
    fn start(&mut self) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.state == TimerState::Running {
                return;
            }
            if inner.time_ms >= inner.duration_ms {
                return; // nothing left to play
            }
            inner.last_tick_ms = self.ticker.now();
        }
        let inner = Rc::clone(&self.inner);
        let ticker = self.ticker.clone();
        self.ticker
            .start(Box::new(move || Self::handle_tick(&inner, &ticker)));
        set_state(&self.inner, TimerState::Running);
    }

    fn pause(&mut self) {
        self.ticker.stop();
        set_state(&self.inner, TimerState::Paused);
    }

    fn stop(&mut self) {
        self.ticker.stop();
        set_state(&self.inner, TimerState::Stopped);
    }

    fn time(&self) -> f64 {
        self.inner.borrow().time_ms
    }

    fn seek(&mut self, time_ms: f64) {
        // NaN and negative targets both land on 0.
        let target = time_ms.max(0.0);
        let past_end = {
            let mut inner = self.inner.borrow_mut();
            if target == inner.time_ms {
                return;
            }
            let past_end = target >= inner.duration_ms;
            inner.time_ms = if past_end { inner.duration_ms } else { target };
            inner.delay_ms = 0.0;
            // New real-time reference point: the next tick measures elapsed
            // time from the seek, not from the last pre-seek sample.
            inner.last_tick_ms = self.ticker.now();
            if past_end {
                debug!(requested = target, duration_ms = inner.duration_ms, "seek clamped to duration");
            }
            past_end
        };
        if past_end {
            self.ticker.stop();
            set_state(&self.inner, TimerState::Stopped);
        }
    }

    fn duration(&self) -> f64 {
        self.inner.borrow().duration_ms
    }

    fn progress(&self) -> f64 {
        let inner = self.inner.borrow();
        crate::progress_ratio(inner.time_ms, inner.duration_ms)
    }

    fn timescale(&self) -> f64 {
        self.inner.borrow().timescale
    }

    fn set_timescale(&mut self, timescale: f64) -> Result<(), TimescaleError> {
        let timescale = validate_timescale(timescale)?;
        self.inner.borrow_mut().timescale = timescale;
        Ok(())
    }

    fn state(&self) -> TimerState {
        self.inner.borrow().state
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn on_tick(&mut self, callback: TickCallback) {
        self.inner.borrow_mut().on_tick = Some(callback);
    }

    fn on_state_change(&mut self, callback: StateCallback) {
        self.inner.borrow_mut().on_state_change = Some(callback);
    }

    fn on_ready(&mut self, callback: ReadyCallback) {
        // A simple timer has nothing to buffer; it is always ready.
        callback();
    }
}

impl<T: Ticker + Clone + 'static> Drop for SimpleTimer<T> {
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
        debug!(from = ?inner.state, to = ?new, "timer state change");
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

#[cfg(test)]
mod tests {
    use super::*;
    use cast_time::ManualTicker;
    use std::cell::Cell;

    fn timer_ms(interval_ms: f64, duration_ms: f64) -> (ManualTicker, SimpleTimer<ManualTicker>) {
        let ticker = ManualTicker::with_interval(interval_ms);
        let timer = SimpleTimer::new(ticker.clone(), duration_ms);
        (ticker, timer)
    }

    #[test]
    fn starts_paused_at_zero() {
        let (_ticker, timer) = timer_ms(10.0, 500.0);
        assert_eq!(timer.state(), TimerState::Paused);
        assert_eq!(timer.time(), 0.0);
        assert_eq!(timer.duration(), 500.0);
        assert_eq!(timer.timescale(), 1.0);
        assert!(timer.is_ready());
    }

    #[test]
    fn accumulates_scaled_elapsed_time() {
        let (ticker, mut timer) = timer_ms(10.0, 1000.0);
        timer.set_timescale(2.0).unwrap();
        timer.start();

        ticker.tick();
        ticker.tick();
        ticker.tick();
        assert_eq!(timer.time(), 60.0);
        assert_eq!(timer.state(), TimerState::Running);
    }

    #[test]
    fn ticks_while_paused_accumulate_nothing() {
        let (ticker, mut timer) = timer_ms(10.0, 1000.0);
        timer.start();
        ticker.tick();
        timer.pause();

        ticker.tick();
        ticker.tick();
        assert_eq!(timer.time(), 10.0);
        assert_eq!(timer.state(), TimerState::Paused);

        // Resuming re-anchors at the ticker's current clock, so the paused
        // gap is not replayed.
        timer.start();
        ticker.tick();
        assert_eq!(timer.time(), 20.0);
    }

    #[test]
    fn reaching_duration_clamps_and_stops() {
        let (ticker, mut timer) = timer_ms(10.0, 25.0);
        timer.start();

        ticker.tick();
        ticker.tick();
        assert_eq!(timer.state(), TimerState::Running);

        ticker.tick();
        assert_eq!(timer.time(), 25.0);
        assert_eq!(timer.state(), TimerState::Stopped);

        // The ticker was released; further ticks change nothing.
        ticker.tick();
        assert_eq!(timer.time(), 25.0);
    }

    #[test]
    fn start_after_finish_is_a_no_op() {
        let (ticker, mut timer) = timer_ms(10.0, 15.0);
        timer.start();
        ticker.tick();
        ticker.tick();
        assert_eq!(timer.state(), TimerState::Stopped);

        timer.start();
        assert_eq!(timer.state(), TimerState::Stopped);
        ticker.tick();
        assert_eq!(timer.time(), 15.0);
    }

    #[test]
    fn rejected_timescale_keeps_previous_value() {
        let (_ticker, mut timer) = timer_ms(10.0, 100.0);
        timer.set_timescale(3.0).unwrap();

        assert_eq!(
            timer.set_timescale(0.0),
            Err(TimescaleError { value: 0.0 })
        );
        assert!(timer.set_timescale(-2.0).is_err());
        assert!(timer.set_timescale(5.1).is_err());
        assert!(timer.set_timescale(f64::NAN).is_err());
        assert_eq!(timer.timescale(), 3.0);

        timer.set_timescale(5.0).unwrap();
        assert_eq!(timer.timescale(), 5.0);
    }

    #[test]
    fn seek_clamps_to_bounds() {
        let (_ticker, mut timer) = timer_ms(10.0, 100.0);

        timer.seek(-40.0);
        assert_eq!(timer.time(), 0.0);
        assert_eq!(timer.state(), TimerState::Paused);

        timer.seek(130.0);
        assert_eq!(timer.time(), 100.0);
        assert_eq!(timer.state(), TimerState::Stopped);
    }

    #[test]
    fn seek_resynchronizes_tick_reference() {
        let (ticker, mut timer) = timer_ms(10.0, 1000.0);
        timer.start();
        ticker.tick();
        assert_eq!(timer.time(), 10.0);

        // A seek re-anchors against the ticker clock; the next tick adds
        // exactly one interval from the seek point, with no catch-up jump.
        ticker.tick();
        timer.seek(500.0);
        ticker.tick();
        assert_eq!(timer.time(), 510.0);
    }

    #[test]
    fn seek_to_current_time_is_a_no_op() {
        let (ticker, mut timer) = timer_ms(10.0, 1000.0);
        timer.start();
        ticker.tick();

        // delay debt survives a same-position seek
        timer.add_delay(10.0);
        timer.seek(10.0);
        ticker.tick();
        assert_eq!(timer.time(), 10.0);
    }

    #[test]
    fn delay_debt_is_consumed_before_accumulation() {
        let (ticker, mut timer) = timer_ms(10.0, 1000.0);
        timer.start();
        timer.add_delay(25.0);

        // 10ms elapsed, 25ms debt: fully absorbed, no progress.
        ticker.tick();
        assert_eq!(timer.time(), 0.0);
        // 10ms elapsed, 15ms debt left: absorbed again.
        ticker.tick();
        assert_eq!(timer.time(), 0.0);
        // 10ms elapsed, 5ms debt left: remainder accumulates.
        ticker.tick();
        assert_eq!(timer.time(), 5.0);
        ticker.tick();
        assert_eq!(timer.time(), 15.0);
    }

    #[test]
    fn absorbed_ticks_emit_no_notification() {
        let (ticker, mut timer) = timer_ms(10.0, 1000.0);
        let ticks = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&ticks);
        timer.on_tick(Box::new(move |_| counter.set(counter.get() + 1)));

        timer.start();
        timer.add_delay(15.0);
        ticker.tick(); // absorbed
        assert_eq!(ticks.get(), 0);
        ticker.tick(); // remainder accumulates
        assert_eq!(ticks.get(), 1);
    }

    #[test]
    fn nonpositive_delays_are_ignored() {
        let (ticker, mut timer) = timer_ms(10.0, 1000.0);
        timer.start();
        timer.add_delay(0.0);
        timer.add_delay(-50.0);
        ticker.tick();
        assert_eq!(timer.time(), 10.0);
    }

    #[test]
    fn state_change_fires_once_per_transition() {
        let (ticker, mut timer) = timer_ms(10.0, 15.0);
        let changes: Rc<RefCell<Vec<TimerState>>> = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&changes);
        timer.on_state_change(Box::new(move |state| log.borrow_mut().push(state)));

        timer.pause(); // already paused: no notification
        timer.start();
        timer.start(); // already running: no notification
        timer.pause();
        timer.pause();
        timer.start();
        ticker.tick();
        ticker.tick(); // reaches duration: implicit stop
        timer.stop(); // already stopped: no notification

        assert_eq!(
            *changes.borrow(),
            vec![
                TimerState::Running,
                TimerState::Paused,
                TimerState::Running,
                TimerState::Stopped,
            ]
        );
    }

    #[test]
    fn tick_callback_reports_monotonic_bounded_time() {
        let (ticker, mut timer) = timer_ms(10.0, 35.0);
        let times: Rc<RefCell<Vec<f64>>> = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&times);
        timer.on_tick(Box::new(move |t| log.borrow_mut().push(t)));

        timer.start();
        for _ in 0..6 {
            ticker.tick();
        }
        assert_eq!(*times.borrow(), vec![10.0, 20.0, 30.0, 35.0]);
    }

    #[test]
    fn callback_registration_is_single_slot() {
        let (ticker, mut timer) = timer_ms(10.0, 1000.0);
        let first = Rc::new(Cell::new(0u32));
        let second = Rc::new(Cell::new(0u32));

        let c = Rc::clone(&first);
        timer.on_tick(Box::new(move |_| c.set(c.get() + 1)));
        let c = Rc::clone(&second);
        timer.on_tick(Box::new(move |_| c.set(c.get() + 1)));

        timer.start();
        ticker.tick();
        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
    }

    #[test]
    fn on_ready_fires_immediately() {
        let (_ticker, mut timer) = timer_ms(10.0, 100.0);
        let ready = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ready);
        timer.on_ready(Box::new(move || flag.set(true)));
        assert!(ready.get());
    }

    #[test]
    fn unbounded_duration_never_stops() {
        let (ticker, mut timer) = timer_ms(10.0, f64::INFINITY);
        timer.start();
        for _ in 0..1000 {
            ticker.tick();
        }
        assert_eq!(timer.state(), TimerState::Running);
        assert_eq!(timer.time(), 10_000.0);
        assert_eq!(timer.progress(), 0.0);
    }

    #[test]
    fn progress_tracks_completion() {
        let (ticker, mut timer) = timer_ms(10.0, 40.0);
        assert_eq!(timer.progress(), 0.0);
        timer.start();
        ticker.tick();
        assert_eq!(timer.progress(), 0.25);
        timer.seek(40.0);
        assert_eq!(timer.progress(), 1.0);
    }

    #[test]
    fn host_can_pause_from_inside_tick_callback() {
        let (ticker, timer) = timer_ms(10.0, 1000.0);
        let timer = Rc::new(RefCell::new(timer));

        let handle = Rc::clone(&timer);
        timer
            .borrow_mut()
            .on_tick(Box::new(move |t| {
                if t >= 20.0 {
                    handle.borrow_mut().pause();
                }
            }));

        timer.borrow_mut().start();
        for _ in 0..5 {
            ticker.tick();
        }
        assert_eq!(timer.borrow().time(), 20.0);
        assert_eq!(timer.borrow().state(), TimerState::Paused);
    }
}
