//! Cross-thread handles into an event loop.

use crate::LoopError;
use boa_engine::{Context, JsResult};
use crossbeam::channel::Sender;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Work posted from another thread. It runs on the loop thread, inside the
/// scope the handle was created for.
pub type RemoteTask = Box<dyn FnOnce(&mut Context) -> JsResult<()> + Send>;

/// A `Send` handle for posting work into an [`EventLoop`](crate::EventLoop).
///
/// While any clone of a handle exists, the loop it belongs to stays alive and
/// a blocking `run` waits for messages on it.
///
/// # Examples
///
/// ```no_run
/// # use async_runtime::AsyncHandle;
/// # fn post(handle: AsyncHandle) {
/// std::thread::spawn(move || {
///     handle.send(|_context| Ok(())).unwrap();
/// });
/// # }
/// ```
#[derive(Clone)]
pub struct AsyncHandle {
    id: u64,
    sender: Sender<(u64, RemoteTask)>,
    token: Arc<AtomicUsize>,
}

impl AsyncHandle {
    pub(crate) fn new(id: u64, sender: Sender<(u64, RemoteTask)>, token: Arc<AtomicUsize>) -> Self {
        Self { id, sender, token }
    }

    /// Identifier of the handle within its loop.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Posts `task` to the loop, waking it if it is blocked in poll.
    ///
    /// Messages already sent are delivered even if every clone of the handle
    /// is dropped before the loop gets to them.
    ///
    /// Fails with [`LoopError::Disconnected`] once the loop has been dropped.
    pub fn send<F>(&self, task: F) -> Result<(), LoopError>
    where
        F: FnOnce(&mut Context) -> JsResult<()> + Send + 'static,
    {
        // Counted before it enters the channel so the loop never sees the
        // message without its count.
        self.token.fetch_add(1, Ordering::AcqRel);
        self.sender.send((self.id, Box::new(task))).map_err(|_| {
            self.token.fetch_sub(1, Ordering::AcqRel);
            LoopError::Disconnected
        })
    }
}

impl std::fmt::Debug for AsyncHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncHandle")
            .field("id", &self.id)
            .field("clones", &Arc::strong_count(&self.token))
            .field("in_flight", &self.token.load(Ordering::Acquire))
            .finish()
    }
}
