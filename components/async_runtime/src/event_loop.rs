//! Event loop implementation.
//!
//! This module provides the loop primitive a worker (or the host) steps
//! through. Each iteration (turn) of the loop:
//! 1. Runs timers whose deadline has passed
//! 2. Runs posted tasks (completions queued for the next turn)
//! 3. Polls async handles, blocking as long as the run mode allows
//! 4. Runs immediates queued before this phase started
//! 5. In `once` mode, runs timers that became due while polling
//!
//! Callbacks are never run directly: each is handed to the
//! [`CallbackScope`] it was scheduled under.

use crate::handle::{AsyncHandle, RemoteTask};
use crate::scope::{Callback, CallbackScope};
use crate::LoopError;
use boa_engine::{Context, JsResult};
use core_types::RunMode;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Identifier of a timer, immediate or async handle within one loop.
pub type TimerId = u64;

/// Longest single wait while only async handles keep the loop alive.
const HANDLE_POLL_SLICE: Duration = Duration::from_millis(25);

/// A repeatable timer body.
type TimerBody = Rc<dyn Fn(&mut Context) -> JsResult<()>>;

/// Hook run after every dispatched callback.
type TurnHook = Rc<dyn Fn(&mut Context)>;

struct Timer {
    scope_id: u64,
    scope: Weak<dyn CallbackScope>,
    body: TimerBody,
    repeat: Option<Duration>,
    referenced: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TimerSlot {
    Scheduled(Instant),
    Firing,
}

struct Entry {
    id: u64,
    scope_id: u64,
    scope: Weak<dyn CallbackScope>,
    callback: Callback,
}

struct HandleEntry {
    scope_id: u64,
    scope: Weak<dyn CallbackScope>,
    /// Strong count tracks live clones; the value counts undelivered messages.
    token: Arc<AtomicUsize>,
}

impl HandleEntry {
    fn has_clones(&self) -> bool {
        Arc::strong_count(&self.token) > 1
    }

    fn in_flight(&self) -> usize {
        self.token.load(Ordering::Acquire)
    }
}

#[derive(Default)]
struct LoopState {
    timers: BTreeMap<(Instant, TimerId), Timer>,
    timer_slots: HashMap<TimerId, TimerSlot>,
    immediates: VecDeque<Entry>,
    pending: VecDeque<Entry>,
    handles: HashMap<u64, HandleEntry>,
}

impl LoopState {
    fn has_referenced_timers(&self) -> bool {
        self.timers.values().any(|t| t.referenced)
    }

    fn has_live_handles(&self) -> bool {
        self.handles
            .values()
            .any(|h| h.has_clones() || h.in_flight() > 0)
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.timers.keys().next().map(|(deadline, _)| *deadline)
    }
}

enum PollTimeout {
    Zero,
    For(Duration),
    UntilMessage,
}

/// An event loop primitive.
///
/// The loop is single-threaded and lives behind `Rc`; every method takes
/// `&self` so callbacks running inside [`run`](EventLoop::run) can schedule,
/// clear or stop without conflicting borrows.
///
/// # Examples
///
/// ```
/// use async_runtime::{Callback, CallbackScope, EventLoop};
/// use boa_engine::Context;
/// use core_types::RunMode;
/// use std::rc::Rc;
/// use std::time::Duration;
///
/// struct Direct;
/// impl CallbackScope for Direct {
///     fn scope_id(&self) -> u64 { 7 }
///     fn invoke(&self, callback: Callback, context: &mut Context) {
///         let _ = callback(context);
///     }
/// }
///
/// let mut context = Context::default();
/// let scope: Rc<dyn CallbackScope> = Rc::new(Direct);
/// let event_loop = EventLoop::new("example");
/// event_loop.set_timeout(&scope, Duration::from_millis(1), Rc::new(|_| Ok(())));
/// assert!(!event_loop.run(RunMode::Default, &mut context).unwrap());
/// ```
pub struct EventLoop {
    label: &'static str,
    state: RefCell<LoopState>,
    next_id: Cell<u64>,
    running: Cell<bool>,
    stop_requested: Cell<bool>,
    closed: Cell<bool>,
    sender: Sender<(u64, RemoteTask)>,
    receiver: Receiver<(u64, RemoteTask)>,
    turn_boundary: RefCell<Option<TurnHook>>,
}

impl EventLoop {
    /// Creates a new EventLoop with no pending work.
    ///
    /// `label` only shows up in diagnostics.
    pub fn new(label: &'static str) -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            label,
            state: RefCell::new(LoopState::default()),
            next_id: Cell::new(1),
            running: Cell::new(false),
            stop_requested: Cell::new(false),
            closed: Cell::new(false),
            sender,
            receiver,
            turn_boundary: RefCell::new(None),
        }
    }

    /// Diagnostic label given at construction.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Installs a hook that runs after every dispatched callback.
    ///
    /// The host uses this to flush its microtask queue at each turn boundary.
    pub fn set_turn_boundary(&self, hook: impl Fn(&mut Context) + 'static) {
        *self.turn_boundary.borrow_mut() = Some(Rc::new(hook));
    }

    fn next_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    // Scheduling

    /// Schedules `body` to run once after `delay`.
    pub fn set_timeout(
        &self,
        scope: &Rc<dyn CallbackScope>,
        delay: Duration,
        body: TimerBody,
    ) -> TimerId {
        self.insert_timer(scope, delay, None, body)
    }

    /// Schedules `body` to run every `period`, first after `period`.
    pub fn set_interval(
        &self,
        scope: &Rc<dyn CallbackScope>,
        period: Duration,
        body: TimerBody,
    ) -> TimerId {
        self.insert_timer(scope, period, Some(period), body)
    }

    fn insert_timer(
        &self,
        scope: &Rc<dyn CallbackScope>,
        delay: Duration,
        repeat: Option<Duration>,
        body: TimerBody,
    ) -> TimerId {
        let id = self.next_id();
        let deadline = Instant::now() + delay;
        let timer = Timer {
            scope_id: scope.scope_id(),
            scope: Rc::downgrade(scope),
            body,
            repeat,
            referenced: true,
        };
        let mut state = self.state.borrow_mut();
        state.timers.insert((deadline, id), timer);
        state.timer_slots.insert(id, TimerSlot::Scheduled(deadline));
        id
    }

    /// Cancels a timer. Clearing an interval from inside its own callback
    /// prevents it from being re-armed.
    pub fn clear_timer(&self, id: TimerId) -> bool {
        let mut state = self.state.borrow_mut();
        match state.timer_slots.remove(&id) {
            Some(TimerSlot::Scheduled(deadline)) => state.timers.remove(&(deadline, id)).is_some(),
            Some(TimerSlot::Firing) => true,
            None => false,
        }
    }

    /// Sets whether a timer keeps the loop alive.
    pub fn set_timer_ref(&self, id: TimerId, referenced: bool) -> bool {
        let mut state = self.state.borrow_mut();
        let Some(TimerSlot::Scheduled(deadline)) = state.timer_slots.get(&id).copied() else {
            return false;
        };
        match state.timers.get_mut(&(deadline, id)) {
            Some(timer) => {
                timer.referenced = referenced;
                true
            }
            None => false,
        }
    }

    /// Queues `callback` for the check phase of the current or next turn.
    pub fn set_immediate(&self, scope: &Rc<dyn CallbackScope>, callback: Callback) -> TimerId {
        let id = self.next_id();
        self.state.borrow_mut().immediates.push_back(Entry {
            id,
            scope_id: scope.scope_id(),
            scope: Rc::downgrade(scope),
            callback,
        });
        id
    }

    /// Cancels an immediate that has not run yet.
    pub fn clear_immediate(&self, id: TimerId) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.immediates.len();
        state.immediates.retain(|e| e.id != id);
        state.immediates.len() != before
    }

    /// Queues a completion to run in the pending phase of the next turn.
    pub fn post(&self, scope: &Rc<dyn CallbackScope>, callback: Callback) {
        let id = self.next_id();
        self.state.borrow_mut().pending.push_back(Entry {
            id,
            scope_id: scope.scope_id(),
            scope: Rc::downgrade(scope),
            callback,
        });
    }

    /// Creates a `Send` handle whose messages run inside `scope`.
    pub fn async_handle(&self, scope: &Rc<dyn CallbackScope>) -> AsyncHandle {
        let id = self.next_id();
        let token = Arc::new(AtomicUsize::new(0));
        self.state.borrow_mut().handles.insert(
            id,
            HandleEntry {
                scope_id: scope.scope_id(),
                scope: Rc::downgrade(scope),
                token: token.clone(),
            },
        );
        AsyncHandle::new(id, self.sender.clone(), token)
    }

    // Liveness and control

    /// Returns true if referenced timers, immediates, posted tasks or live
    /// async handles remain.
    pub fn is_alive(&self) -> bool {
        if self.closed.get() {
            return false;
        }
        let state = self.state.borrow();
        state.has_referenced_timers()
            || !state.immediates.is_empty()
            || !state.pending.is_empty()
            || state.has_live_handles()
            || !self.receiver.is_empty()
    }

    /// Returns true while a `run` call is in flight.
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Returns true once [`close`](EventLoop::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Makes the in-flight `run` return once the current callback completes.
    ///
    /// Outside of `run` this has no lasting effect; the request is cleared
    /// when `run` returns.
    pub fn stop(&self) {
        if self.running.get() {
            self.stop_requested.set(true);
        }
    }

    /// Discards every pending callback scheduled under `scope_id`.
    ///
    /// Returns the number of callbacks dropped.
    pub fn purge(&self, scope_id: u64) -> usize {
        let mut state = self.state.borrow_mut();
        let mut dropped = 0;

        let doomed: Vec<(Instant, TimerId)> = state
            .timers
            .iter()
            .filter(|(_, t)| t.scope_id == scope_id)
            .map(|(key, _)| *key)
            .collect();
        for key in doomed {
            state.timers.remove(&key);
            state.timer_slots.remove(&key.1);
            dropped += 1;
        }

        let before = state.immediates.len() + state.pending.len();
        state.immediates.retain(|e| e.scope_id != scope_id);
        state.pending.retain(|e| e.scope_id != scope_id);
        dropped += before - (state.immediates.len() + state.pending.len());

        let handles_before = state.handles.len();
        state.handles.retain(|_, h| h.scope_id != scope_id);
        dropped += handles_before - state.handles.len();

        if dropped > 0 {
            tracing::debug!(event_loop = self.label, scope_id, dropped, "purged scope");
        }
        dropped
    }

    /// Discards all work and refuses further runs.
    pub fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        self.stop();
        let mut state = self.state.borrow_mut();
        state.timers.clear();
        state.timer_slots.clear();
        state.immediates.clear();
        state.pending.clear();
        state.handles.clear();
        while self.receiver.try_recv().is_ok() {}
        tracing::debug!(event_loop = self.label, "closed");
    }

    // Running

    /// Steps the loop in `mode`.
    ///
    /// Returns whether the loop is still alive afterwards. A loop that is not
    /// alive when `run` is entered returns immediately.
    ///
    /// # Errors
    ///
    /// [`LoopError::Reentrant`] if called from inside a callback of an
    /// in-flight `run` of this loop, [`LoopError::Closed`] after `close`.
    pub fn run(&self, mode: RunMode, context: &mut Context) -> Result<bool, LoopError> {
        if self.closed.get() {
            return Err(LoopError::Closed);
        }
        let _guard = RunGuard::acquire(self)?;
        tracing::trace!(event_loop = self.label, %mode, "run");

        while self.is_alive() {
            self.run_due_timers(context);
            if self.should_break() {
                break;
            }
            self.run_pending(context);
            if self.should_break() {
                break;
            }
            let timeout = self.poll_timeout(mode);
            self.poll(timeout, context);
            if self.should_break() {
                break;
            }
            self.run_immediates(context);
            if self.should_break() {
                break;
            }
            if mode == RunMode::Once {
                self.run_due_timers(context);
            }
            if mode.is_single_pass() || self.should_break() {
                break;
            }
        }

        Ok(self.is_alive())
    }

    fn should_break(&self) -> bool {
        self.stop_requested.get() || self.closed.get()
    }

    fn run_due_timers(&self, context: &mut Context) {
        let now = Instant::now();
        loop {
            if self.should_break() {
                return;
            }
            let due = {
                let mut state = self.state.borrow_mut();
                let key = match state.timers.keys().next() {
                    Some(&(deadline, id)) if deadline <= now => (deadline, id),
                    _ => return,
                };
                let timer = state.timers.remove(&key);
                if timer.as_ref().is_some_and(|t| t.repeat.is_some()) {
                    state.timer_slots.insert(key.1, TimerSlot::Firing);
                } else {
                    state.timer_slots.remove(&key.1);
                }
                timer.map(|t| (key.1, t))
            };
            let Some((id, timer)) = due else { return };

            let body = timer.body.clone();
            self.dispatch(&timer.scope, Box::new(move |ctx| body(ctx)), context);

            if let Some(period) = timer.repeat {
                let mut state = self.state.borrow_mut();
                if state.timer_slots.get(&id) == Some(&TimerSlot::Firing) && !self.closed.get() {
                    let deadline = Instant::now() + period;
                    state.timer_slots.insert(id, TimerSlot::Scheduled(deadline));
                    state.timers.insert((deadline, id), timer);
                }
            }
        }
    }

    fn run_pending(&self, context: &mut Context) {
        let count = self.state.borrow().pending.len();
        for _ in 0..count {
            if self.should_break() {
                return;
            }
            let next = self.state.borrow_mut().pending.pop_front();
            let Some(entry) = next else { return };
            self.dispatch(&entry.scope, entry.callback, context);
        }
    }

    fn run_immediates(&self, context: &mut Context) {
        let count = self.state.borrow().immediates.len();
        for _ in 0..count {
            if self.should_break() {
                return;
            }
            let next = self.state.borrow_mut().immediates.pop_front();
            let Some(entry) = next else { return };
            self.dispatch(&entry.scope, entry.callback, context);
        }
    }

    fn poll_timeout(&self, mode: RunMode) -> PollTimeout {
        let state = self.state.borrow();
        if !mode.may_block()
            || self.should_break()
            || !state.immediates.is_empty()
            || !state.pending.is_empty()
        {
            return PollTimeout::Zero;
        }
        if let Some(deadline) = state.next_deadline() {
            return PollTimeout::For(deadline.saturating_duration_since(Instant::now()));
        }
        if state.has_live_handles() {
            return PollTimeout::UntilMessage;
        }
        PollTimeout::Zero
    }

    fn poll(&self, timeout: PollTimeout, context: &mut Context) {
        let first = match timeout {
            PollTimeout::Zero => self.receiver.try_recv().ok(),
            PollTimeout::For(duration) => self.receiver.recv_timeout(duration).ok(),
            PollTimeout::UntilMessage => loop {
                match self.receiver.recv_timeout(HANDLE_POLL_SLICE) {
                    Ok(message) => break Some(message),
                    Err(RecvTimeoutError::Timeout) => {
                        if self.should_break() || !self.state.borrow().has_live_handles() {
                            break None;
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => break None,
                }
            },
        };

        let Some(first) = first else { return };
        self.dispatch_remote(first, context);
        while !self.should_break() {
            match self.receiver.try_recv() {
                Ok(message) => self.dispatch_remote(message, context),
                Err(_) => break,
            }
        }
    }

    fn dispatch_remote(&self, (handle_id, task): (u64, RemoteTask), context: &mut Context) {
        let scope = self.state.borrow().handles.get(&handle_id).map(|h| {
            h.token.fetch_sub(1, Ordering::AcqRel);
            h.scope.clone()
        });
        match scope {
            Some(scope) => self.dispatch(&scope, Box::new(move |ctx| task(ctx)), context),
            None => tracing::debug!(event_loop = self.label, handle_id, "dropped message for purged handle"),
        }
        // A handle entry goes once its last clone is gone and nothing it
        // sent is still queued.
        self.state
            .borrow_mut()
            .handles
            .retain(|_, h| h.has_clones() || h.in_flight() > 0);
    }

    fn dispatch(&self, scope: &Weak<dyn CallbackScope>, callback: Callback, context: &mut Context) {
        let Some(scope) = scope.upgrade() else {
            return;
        };
        if scope.is_terminating() {
            return;
        }
        scope.invoke(callback, context);

        let hook = self.turn_boundary.borrow().clone();
        if let Some(hook) = hook {
            hook(context);
        }
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("EventLoop")
            .field("label", &self.label)
            .field("timers", &state.timers.len())
            .field("immediates", &state.immediates.len())
            .field("pending", &state.pending.len())
            .field("handles", &state.handles.len())
            .field("running", &self.running.get())
            .field("closed", &self.closed.get())
            .finish()
    }
}

/// Marks a loop as running for the lifetime of the guard.
struct RunGuard<'a> {
    event_loop: &'a EventLoop,
}

impl<'a> RunGuard<'a> {
    fn acquire(event_loop: &'a EventLoop) -> Result<Self, LoopError> {
        if event_loop.running.replace(true) {
            return Err(LoopError::Reentrant);
        }
        Ok(Self { event_loop })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.event_loop.running.set(false);
        self.event_loop.stop_requested.set(false);
    }
}
