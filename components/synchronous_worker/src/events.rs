//! Worker events and listener bookkeeping.

use boa_engine::{Context, JsValue};
use std::cell::RefCell;
use std::fmt;

/// Events a worker reports to its embedder.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// The embedded environment terminated with an exit code
    Exit(i32),
    /// An uncaught exception nobody else handled; followed by `Exit(1)`
    Error(JsValue),
}

impl WorkerEvent {
    /// Event name as used by the JavaScript binding.
    pub fn name(&self) -> &'static str {
        match self {
            WorkerEvent::Exit(_) => "exit",
            WorkerEvent::Error(_) => "error",
        }
    }
}

type Listener = Box<dyn FnMut(&WorkerEvent, &mut Context)>;

/// Ordered list of event listeners.
///
/// Listeners may register further listeners while an event is being
/// delivered; those only see later events.
#[derive(Default)]
pub(crate) struct Listeners {
    slots: RefCell<Vec<Listener>>,
}

impl Listeners {
    pub(crate) fn add(&self, listener: Listener) {
        self.slots.borrow_mut().push(listener);
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub(crate) fn emit(&self, event: &WorkerEvent, context: &mut Context) {
        let mut active = std::mem::take(&mut *self.slots.borrow_mut());
        for listener in active.iter_mut() {
            listener(event, context);
        }
        let mut slots = self.slots.borrow_mut();
        active.append(&mut slots);
        *slots = active;
    }

    pub(crate) fn clear(&self) {
        self.slots.borrow_mut().clear();
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listeners({})", self.len())
    }
}
