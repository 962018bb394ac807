//! Microtask queue.
//!
//! A FIFO of engine jobs. Draining runs jobs until the queue is empty,
//! including jobs queued while draining.

use boa_engine::job::NativeJob;
use boa_engine::{Context, JsError};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;

/// A queue for microtasks.
///
/// Interior mutability lets the queue be shared through `Rc` between the
/// engine's job router and whoever flushes it.
#[derive(Default)]
pub struct MicrotaskQueue {
    jobs: RefCell<VecDeque<NativeJob>>,
    draining: Cell<bool>,
}

impl MicrotaskQueue {
    /// Creates a new empty MicrotaskQueue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a job to the end of the queue.
    pub fn enqueue(&self, job: NativeJob) {
        self.jobs.borrow_mut().push_back(job);
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.jobs.borrow().is_empty()
    }

    /// Returns the number of queued jobs.
    pub fn len(&self) -> usize {
        self.jobs.borrow().len()
    }

    /// Returns true while a drain is in progress.
    pub fn is_draining(&self) -> bool {
        self.draining.get()
    }

    /// Discards every queued job, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut jobs = self.jobs.borrow_mut();
        let dropped = jobs.len();
        jobs.clear();
        dropped
    }

    /// Runs queued jobs until the queue is empty.
    ///
    /// A failing job is handed to `on_error` and draining continues. Calling
    /// `drain` from inside a job of the same queue returns immediately; the
    /// outer drain picks up whatever the job queued.
    ///
    /// Returns the number of jobs run.
    pub fn drain(
        &self,
        context: &mut Context,
        on_error: &mut dyn FnMut(JsError, &mut Context),
    ) -> usize {
        if self.draining.replace(true) {
            return 0;
        }
        let _guard = DrainGuard(&self.draining);

        let mut ran = 0;
        loop {
            let next = self.jobs.borrow_mut().pop_front();
            let Some(job) = next else { break };
            ran += 1;
            if let Err(err) = job.call(context) {
                on_error(err, context);
            }
        }
        ran
    }
}

impl fmt::Debug for MicrotaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicrotaskQueue")
            .field("len", &self.len())
            .field("draining", &self.draining.get())
            .finish()
    }
}

struct DrainGuard<'a>(&'a Cell<bool>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
