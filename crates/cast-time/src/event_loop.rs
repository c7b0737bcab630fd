use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::rc::Rc;

use tracing::trace;

use crate::clock::HostClock;
use crate::ticker::TickFn;

/// Default frame cadence assumed by [`EventLoop::request_frame`] (60 Hz).
pub const DEFAULT_FRAME_INTERVAL_MS: f64 = 1000.0 / 60.0;

/// Handle to a scheduled task, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

/// Host surface for fixed-period repetition (the wall-clock ticker's driver).
pub trait IntervalScheduler {
    /// Schedules `callback` to fire every `period_ms`, starting one period
    /// from now.
    fn set_interval(&self, period_ms: f64, callback: TickFn) -> TaskId;

    /// Cancels a scheduled repetition. Unknown or already-cancelled ids are
    /// ignored.
    fn clear_interval(&self, id: TaskId);

    /// Wall-clock time in milliseconds.
    fn now_ms(&self) -> f64;
}

/// Host surface for one-shot redraw-cadence callbacks (the frame ticker's
/// driver).
pub trait FrameScheduler {
    /// Requests a single callback at the next frame boundary.
    fn request_frame(&self, callback: TickFn) -> TaskId;

    /// Cancels a pending frame request if it has not yet been dispatched.
    fn cancel_frame(&self, id: TaskId);

    /// Monotonic high-resolution time in milliseconds.
    fn now_ms(&self) -> f64;
}

// Min-heap entry; `BinaryHeap` is a max-heap, so the ordering is reversed.
// `seq` breaks deadline ties in scheduling order.
struct HeapEntry {
    deadline_ms: f64,
    seq: u64,
    id: TaskId,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline_ms
            .total_cmp(&self.deadline_ms)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Task {
    // Taken out while the callback runs so re-entrant scheduling is safe.
    callback: Option<TickFn>,
    // `Some` for intervals (re-armed after each run), `None` for one-shot
    // frame requests.
    period_ms: Option<f64>,
}

struct LoopInner<C> {
    clock: C,
    frame_interval_ms: f64,
    next_id: u64,
    heap: BinaryHeap<HeapEntry>,
    tasks: HashMap<TaskId, Task>,
}

impl<C> LoopInner<C> {
    fn insert(&mut self, deadline_ms: f64, task: Task) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.insert(id, task);
        self.push_entry(id, deadline_ms);
        id
    }

    fn push_entry(&mut self, id: TaskId, deadline_ms: f64) {
        let seq = self.next_id;
        self.next_id += 1;
        self.heap.push(HeapEntry {
            deadline_ms,
            seq,
            id,
        });
    }
}

/// Deadline-heap scheduler pumped by the host.
///
/// Tasks are kept in a min-heap by deadline; cancellation removes the task
/// record and leaves the heap entry to be discarded lazily. [`poll`] runs
/// every task due at the current clock reading, re-arming periodic ones by
/// their period. The host calls `poll` from its own loop (render loop, timer
/// wakeup, test driver).
///
/// Clones are handles to the same scheduler.
///
/// [`poll`]: EventLoop::poll
#[derive(Clone)]
pub struct EventLoop<C: HostClock> {
    inner: Rc<RefCell<LoopInner<C>>>,
}

impl<C: HostClock> EventLoop<C> {
    pub fn new(clock: C) -> Self {
        Self::with_frame_interval(clock, DEFAULT_FRAME_INTERVAL_MS)
    }

    pub fn with_frame_interval(clock: C, frame_interval_ms: f64) -> Self {
        Self {
            inner: Rc::new(RefCell::new(LoopInner {
                clock,
                frame_interval_ms,
                next_id: 0,
                heap: BinaryHeap::new(),
                tasks: HashMap::new(),
            })),
        }
    }

    /// Runs every task whose deadline has been reached, in deadline order.
    /// Returns the number of callbacks invoked.
    ///
    /// Tasks scheduled or cancelled by a running callback take effect
    /// immediately: a newly scheduled task already due runs in this same
    /// pass, and a cancelled one does not run again.
    pub fn poll(&self) -> usize {
        let now = self.now();
        let mut ran = 0;
        loop {
            let mut due: Option<(TaskId, f64, TickFn)> = None;
            {
                let mut inner = self.inner.borrow_mut();
                while let Some(entry) = inner.heap.peek() {
                    if entry.deadline_ms > now {
                        break;
                    }
                    let entry = inner.heap.pop().unwrap();
                    if let Some(task) = inner.tasks.get_mut(&entry.id) {
                        if let Some(callback) = task.callback.take() {
                            due = Some((entry.id, entry.deadline_ms, callback));
                            break;
                        }
                    }
                    // Stale entry for a cancelled task; drop it.
                }
            }
            let Some((id, deadline_ms, mut callback)) = due else {
                break;
            };
            callback();
            ran += 1;

            let mut inner = self.inner.borrow_mut();
            if let Some(task) = inner.tasks.get_mut(&id) {
                task.callback = Some(callback);
                match task.period_ms {
                    Some(period_ms) => {
                        let next = deadline_ms + period_ms;
                        inner.push_entry(id, next);
                    }
                    None => {
                        // One-shot frame request: done after a single run.
                        inner.tasks.remove(&id);
                    }
                }
            }
            // A task cancelled from inside its own callback is gone already.
        }
        trace!(ran, "event loop poll");
        ran
    }

    /// Number of live (scheduled, not yet cancelled or completed) tasks.
    pub fn pending(&self) -> usize {
        self.inner.borrow().tasks.len()
    }

    fn now(&self) -> f64 {
        self.inner.borrow().clock.now_ms()
    }
}

impl<C: HostClock> IntervalScheduler for EventLoop<C> {
    fn set_interval(&self, period_ms: f64, callback: TickFn) -> TaskId {
        let mut inner = self.inner.borrow_mut();
        let deadline = inner.clock.now_ms() + period_ms;
        inner.insert(
            deadline,
            Task {
                callback: Some(callback),
                period_ms: Some(period_ms),
            },
        )
    }

    fn clear_interval(&self, id: TaskId) {
        self.inner.borrow_mut().tasks.remove(&id);
    }

    fn now_ms(&self) -> f64 {
        self.now()
    }
}

impl<C: HostClock> FrameScheduler for EventLoop<C> {
    fn request_frame(&self, callback: TickFn) -> TaskId {
        let mut inner = self.inner.borrow_mut();
        let deadline = inner.clock.now_ms() + inner.frame_interval_ms;
        inner.insert(
            deadline,
            Task {
                callback: Some(callback),
                period_ms: None,
            },
        )
    }

    fn cancel_frame(&self, id: TaskId) {
        self.inner.borrow_mut().tasks.remove(&id);
    }

    fn now_ms(&self) -> f64 {
        self.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeHostClock;
    use std::cell::Cell;

    #[test]
    fn interval_fires_once_per_elapsed_period() {
        let clock = FakeHostClock::new();
        let el = EventLoop::new(clock.clone());
        let fired = Rc::new(Cell::new(0u32));

        let counter = Rc::clone(&fired);
        el.set_interval(100.0, Box::new(move || counter.set(counter.get() + 1)));

        clock.advance_ms(99.0);
        assert_eq!(el.poll(), 0);

        clock.advance_ms(1.0);
        assert_eq!(el.poll(), 1);

        // A late poll catches up on every missed period.
        clock.advance_ms(300.0);
        assert_eq!(el.poll(), 3);
        assert_eq!(fired.get(), 4);
    }

    #[test]
    fn clear_interval_stops_future_runs() {
        let clock = FakeHostClock::new();
        let el = EventLoop::new(clock.clone());
        let fired = Rc::new(Cell::new(0u32));

        let counter = Rc::clone(&fired);
        let id = el.set_interval(10.0, Box::new(move || counter.set(counter.get() + 1)));

        clock.advance_ms(10.0);
        el.poll();
        el.clear_interval(id);
        clock.advance_ms(50.0);
        el.poll();

        assert_eq!(fired.get(), 1);
        assert_eq!(el.pending(), 0);

        // Cancelling again is a no-op.
        el.clear_interval(id);
    }

    #[test]
    fn frame_request_is_one_shot() {
        let clock = FakeHostClock::new();
        let el = EventLoop::new(clock.clone());
        let fired = Rc::new(Cell::new(0u32));

        let counter = Rc::clone(&fired);
        el.request_frame(Box::new(move || counter.set(counter.get() + 1)));

        clock.advance_ms(DEFAULT_FRAME_INTERVAL_MS * 10.0);
        el.poll();
        el.poll();
        assert_eq!(fired.get(), 1);
        assert_eq!(el.pending(), 0);
    }

    #[test]
    fn cancelled_frame_never_fires() {
        let clock = FakeHostClock::new();
        let el = EventLoop::new(clock.clone());
        let fired = Rc::new(Cell::new(0u32));

        let counter = Rc::clone(&fired);
        let id = el.request_frame(Box::new(move || counter.set(counter.get() + 1)));
        el.cancel_frame(id);

        clock.advance_ms(1000.0);
        el.poll();
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn callback_can_rearm_itself() {
        let clock = FakeHostClock::new();
        let el = EventLoop::with_frame_interval(clock.clone(), 10.0);
        let fired = Rc::new(Cell::new(0u32));

        // Single-level re-arm: the next request lands one frame later, so a
        // poll at t=10 runs only one callback.
        let counter = Rc::clone(&fired);
        let handle = el.clone();
        el.request_frame(Box::new(move || {
            counter.set(counter.get() + 1);
            let c = Rc::clone(&counter);
            handle.request_frame(Box::new(move || c.set(c.get() + 1)));
        }));

        clock.advance_ms(10.0);
        el.poll();
        assert_eq!(fired.get(), 1);

        clock.advance_ms(10.0);
        el.poll();
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn interval_cancelled_from_inside_callback_stops() {
        let clock = FakeHostClock::new();
        let el = EventLoop::new(clock.clone());
        let fired = Rc::new(Cell::new(0u32));

        let id_cell: Rc<Cell<Option<TaskId>>> = Rc::new(Cell::new(None));
        let counter = Rc::clone(&fired);
        let handle = el.clone();
        let id_inner = Rc::clone(&id_cell);
        let id = el.set_interval(
            10.0,
            Box::new(move || {
                counter.set(counter.get() + 1);
                handle.clear_interval(id_inner.get().unwrap());
            }),
        );
        id_cell.set(Some(id));

        clock.advance_ms(100.0);
        el.poll();
        assert_eq!(fired.get(), 1);
        assert_eq!(el.pending(), 0);
    }
}
