// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! [`EventLoop`]: the single-threaded cooperative scheduler that multiplexes
//! timers, delayed callbacks and connection-manager I/O (spec §4.2).
//!
//! Modeled on open62541's `UA_EventLoop`: one owning thread, non-blocking
//! callbacks, and a two-phase stop so transports get a chance to drain.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, VecDeque},
    time::{Duration, Instant},
};

use log::{debug, error, trace, warn};
use opcua_types::status_code::StatusCode;

/// Lifecycle of the loop itself and of each registered [`EventSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLoopState {
    Fresh,
    Started,
    Stopping,
    Stopped,
}

/// Whether a timer fires once or repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    Once,
    Periodic,
}

/// An event source that produces I/O readiness for the loop to poll, e.g.
/// a [`crate::comms::connection`] TCP listener. Implementors track their
/// own state and must reach `Stopped` some iteration after `stop` is called.
pub trait EventSource {
    fn state(&self) -> EventLoopState;

    /// Called when the source transitions `Fresh` -> `Started`.
    fn start(&mut self) -> Result<(), StatusCode>;

    /// Requests the source begin stopping; it may take several `poll`s to
    /// actually reach `Stopped`.
    fn stop(&mut self);

    /// Gives the source up to `timeout` to perform I/O and invoke its
    /// registered callbacks.
    fn poll(&mut self, timeout: Duration);
}

type TimerCallback = Box<dyn FnMut() + Send>;
type DelayedCallback = Box<dyn FnOnce() + Send>;

struct Timer {
    id: u64,
    deadline: Instant,
    interval: Duration,
    mode: TimerMode,
    callback: TimerCallback,
}

// BinaryHeap is a max-heap; invert ordering so the earliest deadline sorts first.
impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        other.deadline.cmp(&self.deadline).then(other.id.cmp(&self.id))
    }
}
impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Eq for Timer {}
impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

struct Delayed {
    id: u64,
    callback: Option<DelayedCallback>,
}

/// Opaque handle to a timer registered with [`EventLoop::add_timer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Opaque handle to a callback registered with [`EventLoop::add_delayed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DelayedId(u64);

/// The scheduler itself. Not `Send`/`Sync` — it is owned and driven by a
/// single thread, per the cooperative scheduling model.
pub struct EventLoop {
    state: EventLoopState,
    sources: Vec<Box<dyn EventSource>>,
    timers: BinaryHeap<Timer>,
    cancelled_timers: std::collections::HashSet<u64>,
    delayed: VecDeque<Delayed>,
    cancelled_delayed: std::collections::HashSet<u64>,
    next_id: u64,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    pub fn new() -> Self {
        EventLoop {
            state: EventLoopState::Fresh,
            sources: Vec::new(),
            timers: BinaryHeap::new(),
            cancelled_timers: std::collections::HashSet::new(),
            delayed: VecDeque::new(),
            cancelled_delayed: std::collections::HashSet::new(),
            next_id: 0,
        }
    }

    pub fn state(&self) -> EventLoopState {
        self.state
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Adds `source`, starting it immediately if the loop is already
    /// running. Fails with `BadInvalidState` unless `source` is `Fresh`.
    pub fn register_event_source(&mut self, mut source: Box<dyn EventSource>) -> Result<(), StatusCode> {
        if source.state() != EventLoopState::Fresh {
            return Err(StatusCode::BadInvalidState);
        }
        if self.state == EventLoopState::Started {
            source.start()?;
        }
        self.sources.push(source);
        Ok(())
    }

    /// Removes a source that has reached `Stopped`. The caller identifies
    /// it by predicate since sources carry no public identity of their own.
    pub fn deregister_event_source(
        &mut self,
        mut matches: impl FnMut(&dyn EventSource) -> bool,
    ) -> Result<(), StatusCode> {
        let Some(index) = self.sources.iter().position(|s| matches(s.as_ref())) else {
            return Err(StatusCode::BadInvalidState);
        };
        if self.sources[index].state() != EventLoopState::Stopped {
            return Err(StatusCode::BadInvalidState);
        }
        self.sources.remove(index);
        Ok(())
    }

    /// Starts the loop and every registered source.
    pub fn start(&mut self) -> Result<(), StatusCode> {
        if self.state != EventLoopState::Fresh && self.state != EventLoopState::Stopped {
            return Err(StatusCode::BadInvalidState);
        }
        for source in &mut self.sources {
            source.start()?;
        }
        self.state = EventLoopState::Started;
        debug!("event loop started");
        Ok(())
    }

    /// Begins an asynchronous stop: requests every source stop, and moves
    /// the loop to `Stopping`. Call [`Self::check_stopped`] each iteration
    /// until it reports `Good`.
    pub fn stop(&mut self) {
        if self.state != EventLoopState::Started {
            return;
        }
        self.state = EventLoopState::Stopping;
        for source in &mut self.sources {
            source.stop();
        }
    }

    /// Returns `GoodCallAgain` while any source is still draining,
    /// otherwise transitions the loop to `Stopped` and returns `Good`.
    pub fn check_stopped(&mut self) -> StatusCode {
        if self.state != EventLoopState::Stopping {
            return if self.state == EventLoopState::Stopped {
                StatusCode::Good
            } else {
                StatusCode::BadInvalidState
            };
        }
        if self.sources.iter().all(|s| s.state() == EventLoopState::Stopped) {
            self.state = EventLoopState::Stopped;
            debug!("event loop stopped");
            StatusCode::Good
        } else {
            StatusCode::GoodCallAgain
        }
    }

    /// Schedules `callback` to run after `interval`, once or repeatedly.
    /// A periodic timer that falls more than one period behind skips the
    /// missed fires rather than catching up, to avoid a timer storm.
    pub fn add_timer(
        &mut self,
        interval: Duration,
        mode: TimerMode,
        callback: impl FnMut() + Send + 'static,
    ) -> TimerId {
        let id = self.next_id();
        self.timers.push(Timer {
            id,
            deadline: Instant::now() + interval,
            interval,
            mode,
            callback: Box::new(callback),
        });
        TimerId(id)
    }

    /// Cancels a timer. A no-op if it already fired (for `Once`) or if the
    /// id is unknown; cancelling while the callback is mid-invocation has
    /// no effect on that invocation, only on future ones.
    pub fn cancel_timer(&mut self, id: TimerId) {
        self.cancelled_timers.insert(id.0);
    }

    /// Schedules `callback` to run once, after the current iteration
    /// completes and before the next I/O poll. Used to defer destruction
    /// so objects aren't freed while still on the call stack.
    pub fn add_delayed(&mut self, callback: impl FnOnce() + Send + 'static) -> DelayedId {
        let id = self.next_id();
        self.delayed.push_back(Delayed {
            id,
            callback: Some(Box::new(callback)),
        });
        DelayedId(id)
    }

    pub fn cancel_delayed(&mut self, id: DelayedId) {
        self.cancelled_delayed.insert(id.0);
    }

    /// Runs one pass: due timers in non-decreasing deadline order, then
    /// delayed callbacks in FIFO order, then I/O for ready sources, each
    /// given up to the remainder of `timeout_ms` (split evenly since this
    /// loop polls sources sequentially rather than via a real reactor).
    pub fn run(&mut self, timeout_ms: u64) {
        self.run_due_timers();
        self.run_delayed();

        if self.sources.is_empty() {
            return;
        }
        let per_source = Duration::from_millis(timeout_ms) / self.sources.len() as u32;
        for source in &mut self.sources {
            source.poll(per_source);
        }
    }

    fn run_due_timers(&mut self) {
        let now = Instant::now();
        let mut to_requeue = Vec::new();
        while let Some(timer) = self.timers.peek() {
            if timer.deadline > now {
                break;
            }
            let mut timer = self.timers.pop().expect("peeked Some above");
            if self.cancelled_timers.remove(&timer.id) {
                continue;
            }
            trace!("firing timer {}", timer.id);
            (timer.callback)();

            if timer.mode == TimerMode::Periodic {
                let mut deadline = timer.deadline + timer.interval;
                // Skip any fires we've already fallen behind on instead of
                // catching up, which would just compound the lateness.
                if deadline <= now {
                    warn!("timer {} fell behind, skipping missed fires", timer.id);
                    deadline = now + timer.interval;
                }
                timer.deadline = deadline;
                to_requeue.push(timer);
            }
        }
        self.timers.extend(to_requeue);
    }

    fn run_delayed(&mut self) {
        while let Some(mut delayed) = self.delayed.pop_front() {
            if self.cancelled_delayed.remove(&delayed.id) {
                continue;
            }
            if let Some(callback) = delayed.callback.take() {
                callback();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering as AtomicOrdering},
        Arc,
    };

    use super::*;

    struct StubSource {
        state: EventLoopState,
        stops_after_polls: u32,
        polls: u32,
    }

    impl EventSource for StubSource {
        fn state(&self) -> EventLoopState {
            self.state
        }
        fn start(&mut self) -> Result<(), StatusCode> {
            self.state = EventLoopState::Started;
            Ok(())
        }
        fn stop(&mut self) {
            self.state = EventLoopState::Stopping;
        }
        fn poll(&mut self, _timeout: Duration) {
            if self.state == EventLoopState::Stopping {
                self.polls += 1;
                if self.polls >= self.stops_after_polls {
                    self.state = EventLoopState::Stopped;
                }
            }
        }
    }

    #[test]
    fn register_requires_fresh_source() {
        let mut event_loop = EventLoop::new();
        let started = Box::new(StubSource {
            state: EventLoopState::Started,
            stops_after_polls: 0,
            polls: 0,
        });
        assert_eq!(
            event_loop.register_event_source(started).unwrap_err(),
            StatusCode::BadInvalidState
        );
    }

    #[test]
    fn two_phase_stop_waits_for_every_source() {
        let mut event_loop = EventLoop::new();
        event_loop
            .register_event_source(Box::new(StubSource {
                state: EventLoopState::Fresh,
                stops_after_polls: 2,
                polls: 0,
            }))
            .unwrap();
        event_loop.start().unwrap();
        event_loop.stop();

        assert_eq!(event_loop.check_stopped(), StatusCode::GoodCallAgain);
        event_loop.run(0);
        assert_eq!(event_loop.check_stopped(), StatusCode::GoodCallAgain);
        event_loop.run(0);
        assert_eq!(event_loop.check_stopped(), StatusCode::Good);
        assert_eq!(event_loop.state(), EventLoopState::Stopped);
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut event_loop = EventLoop::new();
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = fired.clone();
        let id = event_loop.add_timer(Duration::from_millis(0), TimerMode::Once, move || {
            fired_clone.fetch_add(1, AtomicOrdering::SeqCst);
        });
        event_loop.cancel_timer(id);
        event_loop.run(0);
        assert_eq!(fired.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn delayed_callback_runs_once_in_fifo_order() {
        let mut event_loop = EventLoop::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            event_loop.add_delayed(move || order.lock().unwrap().push(i));
        }
        event_loop.run(0);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }
}
