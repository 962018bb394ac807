//! Loop ownership.
//!
//! A worker either owns its event loop or borrows the host's. Stepping and
//! liveness queries are only allowed on an owned loop; stopping a worker on
//! a borrowed loop means dropping the worker's callbacks from it.

use crate::error::{WorkerError, WorkerResult};
use async_runtime::{EventLoop, LoopError};
use boa_engine::Context;
use core_types::RunMode;
use std::rc::Rc;

/// A worker's event loop, tagged with who owns it.
#[derive(Debug, Clone)]
pub enum LoopController {
    /// The worker's own loop
    Owned(Rc<EventLoop>),
    /// The host's loop
    Shared(Rc<EventLoop>),
}

impl LoopController {
    pub(crate) fn new(own: bool, host_loop: &Rc<EventLoop>) -> Self {
        if own {
            LoopController::Owned(Rc::new(EventLoop::new("worker")))
        } else {
            LoopController::Shared(host_loop.clone())
        }
    }

    /// Returns true for an owned loop.
    pub fn is_owned(&self) -> bool {
        matches!(self, LoopController::Owned(_))
    }

    /// The loop callbacks are scheduled on, owned or not.
    pub fn event_loop(&self) -> &Rc<EventLoop> {
        match self {
            LoopController::Owned(event_loop) | LoopController::Shared(event_loop) => event_loop,
        }
    }

    /// Fails with a usage error naming `operation` unless the loop is owned.
    pub fn ensure_owned(&self, operation: &'static str) -> WorkerResult<&Rc<EventLoop>> {
        match self {
            LoopController::Owned(event_loop) => Ok(event_loop),
            LoopController::Shared(_) => Err(WorkerError::SharedEventLoop(operation)),
        }
    }

    /// Steps the owned loop; returns whether it is still alive.
    pub fn run(&self, mode: RunMode, context: &mut Context) -> WorkerResult<bool> {
        let event_loop = self.ensure_owned("runLoop()")?;
        event_loop.run(mode, context).map_err(|err| match err {
            LoopError::Reentrant => WorkerError::NestedLoopRun,
            LoopError::Closed | LoopError::Disconnected => WorkerError::Stopped,
        })
    }

    /// Liveness of the loop. Meaningful for owned loops only.
    pub fn is_alive(&self) -> bool {
        self.event_loop().is_alive()
    }

    /// Halts an owned loop soon, or drops `scope_id`'s work from a shared one.
    pub fn signal_stop(&self, scope_id: u64) {
        match self {
            LoopController::Owned(event_loop) => event_loop.stop(),
            LoopController::Shared(event_loop) => {
                event_loop.purge(scope_id);
            }
        }
    }

    /// Closes an owned loop; a shared loop only loses `scope_id`'s work.
    pub fn release(&self, scope_id: u64) {
        match self {
            LoopController::Owned(event_loop) => event_loop.close(),
            LoopController::Shared(event_loop) => {
                event_loop.purge(scope_id);
            }
        }
    }
}
