//! Microtask queue ownership.

use crate::host::{HostShared, JobRouter};
use async_runtime::MicrotaskQueue;
use boa_engine::realm::Realm;
use boa_engine::{Context, JsError};
use std::rc::Rc;

/// A worker's microtask queue, tagged with who owns it.
///
/// An owned queue is flushed at the end of every callback scope and loop
/// callback of the worker. A shared queue is the host's and only drains at
/// the host's turn boundaries.
#[derive(Debug, Clone)]
pub enum MicrotaskController {
    /// The worker's own queue, registered with the job router
    Owned(Rc<MicrotaskQueue>),
    /// The host's queue
    Shared(Rc<MicrotaskQueue>),
}

impl MicrotaskController {
    pub(crate) fn new(own: bool, host: &HostShared, realm: &Realm) -> Self {
        if own {
            let queue = Rc::new(MicrotaskQueue::new());
            host.router().route(realm.clone(), queue.clone());
            MicrotaskController::Owned(queue)
        } else {
            MicrotaskController::Shared(host.microtasks().clone())
        }
    }

    /// Returns true for an owned queue.
    pub fn is_owned(&self) -> bool {
        matches!(self, MicrotaskController::Owned(_))
    }

    /// The queue that receives the worker's microtasks.
    pub fn queue(&self) -> &Rc<MicrotaskQueue> {
        match self {
            MicrotaskController::Owned(queue) | MicrotaskController::Shared(queue) => queue,
        }
    }

    /// Drains an owned queue. A shared queue is left for the host.
    pub fn flush(
        &self,
        context: &mut Context,
        on_error: &mut dyn FnMut(JsError, &mut Context),
    ) -> usize {
        match self {
            MicrotaskController::Owned(queue) => queue.drain(context, on_error),
            MicrotaskController::Shared(_) => 0,
        }
    }

    /// Drops pending jobs of an owned queue.
    pub fn discard(&self) {
        if let MicrotaskController::Owned(queue) = self {
            queue.clear();
        }
    }

    pub(crate) fn release(&self, router: &JobRouter, realm: &Realm) {
        if let MicrotaskController::Owned(queue) = self {
            router.unroute(realm);
            queue.clear();
        }
    }
}
