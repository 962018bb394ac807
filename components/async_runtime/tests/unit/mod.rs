//! Unit test harness for async_runtime


use async_runtime::{Callback, CallbackScope};
use boa_engine::Context;
use std::cell::{Cell, RefCell};

/// Scope that runs callbacks directly and records their errors.
#[derive(Default)]
pub struct RecordingScope {
    pub id: u64,
    pub invocations: Cell<u32>,
    pub errors: RefCell<Vec<String>>,
}

impl RecordingScope {
    pub fn with_id(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

impl CallbackScope for RecordingScope {
    fn scope_id(&self) -> u64 {
        self.id
    }

    fn invoke(&self, callback: Callback, context: &mut Context) {
        self.invocations.set(self.invocations.get() + 1);
        if let Err(err) = callback(context) {
            self.errors.borrow_mut().push(err.to_string());
        }
    }
}
