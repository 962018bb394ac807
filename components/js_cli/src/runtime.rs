//! Runtime orchestration for the CLI
//!
//! A [`Runtime`] owns the host and, in worker mode, one worker. Scripts run
//! inside the worker; afterwards the worker's loop (when it owns one) and
//! the host loop are driven in the configured mode.

use crate::error::{CliError, CliResult};
use boa_engine::JsValue;
use core_types::{RunMode, WorkerOptions};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use synchronous_worker::{HostRuntime, SynchronousWorker};

/// Host plus optional worker, as configured from the command line
pub struct Runtime {
    host: HostRuntime,
    worker: Option<SynchronousWorker>,
    mode: RunMode,
    exit_code: Rc<Cell<Option<i32>>>,
    last_error: Rc<RefCell<Option<String>>>,
}

impl Runtime {
    /// Creates a host and a worker configured with `options`.
    ///
    /// # Example
    /// ```
    /// use core_types::WorkerOptions;
    /// use js_cli::Runtime;
    ///
    /// let mut runtime = Runtime::new(WorkerOptions::isolated()).unwrap();
    /// let value = runtime.execute_string("1 + 1").unwrap();
    /// assert_eq!(value.as_number(), Some(2.0));
    /// ```
    pub fn new(options: WorkerOptions) -> CliResult<Self> {
        let mut host = HostRuntime::new()?;
        let worker = SynchronousWorker::new(&mut host, options)?;

        let exit_code = Rc::new(Cell::new(None));
        let code_slot = exit_code.clone();
        worker.on_exit(move |code, _| {
            tracing::info!(code, "worker exited");
            code_slot.set(Some(code));
        });

        let last_error = Rc::new(RefCell::new(None));
        let error_slot = last_error.clone();
        worker.on_error(move |error, context| {
            let message = error
                .to_string(context)
                .map(|s| s.to_std_string_escaped())
                .unwrap_or_else(|_| error.display().to_string());
            eprintln!("Uncaught {message}");
            *error_slot.borrow_mut() = Some(message);
        });

        Ok(Self {
            host,
            worker: Some(worker),
            mode: RunMode::Default,
            exit_code,
            last_error,
        })
    }

    /// Creates a host without a worker; scripts run in the host realm and
    /// can construct workers through `SynchronousWorker`.
    pub fn host_only() -> CliResult<Self> {
        let mut host = HostRuntime::new()?;
        host.install_worker_api()?;
        Ok(Self {
            host,
            worker: None,
            mode: RunMode::Default,
            exit_code: Rc::new(Cell::new(None)),
            last_error: Rc::new(RefCell::new(None)),
        })
    }

    /// Sets the mode used when driving loops after a script.
    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// The mode loops are driven in.
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// The worker, unless running in host mode.
    pub fn worker(&self) -> Option<&SynchronousWorker> {
        self.worker.as_ref()
    }

    /// The host runtime.
    pub fn host(&mut self) -> &mut HostRuntime {
        &mut self.host
    }

    /// Exit code reported by the worker, if it exited.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code.get()
    }

    /// Message of the uncaught error that ended the worker, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    /// Executes a JavaScript file and drives the loops.
    ///
    /// # Errors
    /// Returns `CliError` if the file cannot be read or the script throws
    pub fn execute_file(&mut self, path: &str) -> CliResult<JsValue> {
        let source = std::fs::read_to_string(path)?;
        tracing::debug!(path, bytes = source.len(), "executing file");
        self.execute_string(&source)
    }

    /// Executes a JavaScript source string and drives the loops.
    pub fn execute_string(&mut self, source: &str) -> CliResult<JsValue> {
        let value = self.evaluate(source)?;
        self.drive(self.mode)?;
        Ok(value)
    }

    /// Evaluates `source` without stepping any loop.
    ///
    /// In worker mode this runs inside a callback scope of the worker; in
    /// host mode it runs in the host realm.
    pub fn evaluate(&mut self, source: &str) -> CliResult<JsValue> {
        match &self.worker {
            Some(worker) => {
                let value = worker.eval(source, self.host.context_mut())?;
                self.host.run_microtasks();
                Ok(value)
            }
            None => Ok(self.host.eval(source)?),
        }
    }

    /// Steps the worker's own loop (if any), then the host loop, in `mode`.
    pub fn drive(&mut self, mode: RunMode) -> CliResult<()> {
        if let Some(worker) = &self.worker {
            if worker.options().own_loop && !worker.state().is_stopped() {
                worker.run_loop(mode, self.host.context_mut())?;
            }
        }
        self.host.run_event_loop_with(mode)?;
        Ok(())
    }

    /// Whether the worker's own loop has pending work.
    pub fn loop_alive(&self) -> CliResult<bool> {
        let worker = self.worker.as_ref().ok_or(CliError::HostMode)?;
        Ok(worker.loop_alive()?)
    }

    /// Stops the worker and runs the host loop until it is released.
    pub fn shutdown(&mut self) -> CliResult<()> {
        if let Some(worker) = &self.worker {
            worker.stop(self.host.context_mut());
        }
        self.host.run_event_loop()?;
        Ok(())
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("worker", &self.worker)
            .field("mode", &self.mode)
            .field("exit_code", &self.exit_code.get())
            .finish()
    }
}
