//! Worker lifecycle.
//!
//! A [`SynchronousWorker`] composes an [`ExecutionContext`], a
//! [`LoopController`] and a [`MicrotaskController`] into one object that
//! moves through `created -> running -> stopped`. Termination of the embedded
//! environment and uncaught exceptions come out of it as [`WorkerEvent`]s.

use crate::context::{ExecutionContext, LoadContext};
use crate::error::{WorkerError, WorkerResult};
use crate::events::{Listeners, WorkerEvent};
use crate::host::{HostRuntime, HostShared};
use crate::loop_controller::LoopController;
use crate::microtasks::MicrotaskController;
use crate::modules::ModuleFactory;
use crate::native::{call_method, define_function};
use crate::scope::{in_realm, in_worker_scope};
use async_runtime::{AsyncHandle, CallbackScope, TimerBindings};
use boa_engine::object::builtins::JsPromise;
use boa_engine::realm::Realm;
use boa_engine::{js_string, Context, JsArgs, JsError, JsNativeError, JsObject, JsResult, JsValue};
use boa_gc::{Finalize, Trace};
use core_types::{RunMode, WorkerOptions, WorkerState};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// One-time setup callback run while the worker loads.
pub type Initializer = Box<dyn FnOnce(&LoadContext<'_>, &mut Context) -> JsResult<()>>;

pub(crate) struct WorkerInner {
    pub(crate) this: Weak<WorkerInner>,
    pub(crate) id: u64,
    pub(crate) options: WorkerOptions,
    pub(crate) host: Rc<HostShared>,
    pub(crate) realm: Realm,
    pub(crate) loop_controller: LoopController,
    pub(crate) microtasks: MicrotaskController,
    pub(crate) execution: RefCell<Option<ExecutionContext>>,
    pub(crate) state: Cell<WorkerState>,
    pub(crate) can_be_terminated: Cell<bool>,
    pub(crate) in_callback_scope: Cell<bool>,
    pub(crate) exited: Cell<bool>,
    pub(crate) errored: Cell<bool>,
    pub(crate) released: Cell<bool>,
    pub(crate) stopped_promise: RefCell<Option<JsPromise>>,
    pub(crate) promise_inspector: RefCell<Option<JsObject>>,
    pub(crate) listeners: Listeners,
}

#[derive(Clone, Trace, Finalize)]
struct WorkerCaptures {
    #[unsafe_ignore_trace]
    worker: Weak<WorkerInner>,
}

impl WorkerInner {
    /// Allocates the realm and binds loop and queue per `options`.
    fn start(host: &Rc<HostShared>, options: WorkerOptions, context: &mut Context) -> WorkerResult<Rc<Self>> {
        let realm = context.create_realm().map_err(WorkerError::Startup)?;
        let id = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);
        let loop_controller = LoopController::new(options.own_loop, host.event_loop());
        let microtasks = MicrotaskController::new(options.own_microtask_queue, host, &realm);

        tracing::debug!(
            worker = id,
            own_loop = options.own_loop,
            own_microtask_queue = options.own_microtask_queue,
            "worker started"
        );

        Ok(Rc::new_cyclic(|this| Self {
            this: this.clone(),
            id,
            options,
            host: host.clone(),
            realm,
            loop_controller,
            microtasks,
            execution: RefCell::new(None),
            state: Cell::new(WorkerState::Created),
            can_be_terminated: Cell::new(false),
            in_callback_scope: Cell::new(false),
            exited: Cell::new(false),
            errored: Cell::new(false),
            released: Cell::new(false),
            stopped_promise: RefCell::new(None),
            promise_inspector: RefCell::new(None),
            listeners: Listeners::default(),
        }))
    }

    /// Builds the execution context, intercepts the termination path and
    /// installs the uncaught exception relay.
    fn load(
        &self,
        modules: Vec<(String, ModuleFactory)>,
        initializer: Option<Initializer>,
        context: &mut Context,
    ) -> JsResult<()> {
        if self.state.get() != WorkerState::Created {
            return Err(WorkerError::NotInitialized.into());
        }

        let scope: Weak<dyn CallbackScope> = self.this.clone();
        let timers = Rc::new(TimerBindings {
            event_loop: self.loop_controller.event_loop().clone(),
            microtasks: self.microtasks.queue().clone(),
            scope,
        });
        let execution = ExecutionContext::load(&self.realm, timers, modules, context)?;

        in_worker_scope(self, context, |context| -> JsResult<()> {
            let captures = WorkerCaptures {
                worker: self.this.clone(),
            };
            let process = execution.process();
            define_function(process, "reallyExit", 1, really_exit, captures.clone(), context)?;

            let relay = crate::native::function("relayUncaughtException", 1, relay_uncaught, captures, context);
            call_method(
                process,
                "on",
                &[js_string!("uncaughtException").into(), relay.into()],
                context,
            )?;

            if let Some(initializer) = initializer {
                initializer(&execution.load_context(), context)?;
            }
            Ok(())
        })?;

        *self.execution.borrow_mut() = Some(execution);
        if self.state.get() == WorkerState::Created {
            self.state.set(WorkerState::Running);
        }
        Ok(())
    }

    pub(crate) fn is_terminating(&self) -> bool {
        self.state.get().is_stopped() || self.released.get()
    }

    pub(crate) fn process(&self) -> WorkerResult<JsObject> {
        self.execution
            .borrow()
            .as_ref()
            .map(|execution| execution.process().clone())
            .ok_or(WorkerError::NotInitialized)
    }

    pub(crate) fn global(&self) -> WorkerResult<JsObject> {
        self.execution
            .borrow()
            .as_ref()
            .map(|execution| execution.global().clone())
            .ok_or(WorkerError::NotInitialized)
    }

    /// Drains the worker's own microtask queue; a no-op when shared.
    pub(crate) fn flush_microtasks(&self, context: &mut Context) {
        self.microtasks
            .flush(context, &mut |err, context| self.handle_error(err, context));
    }

    /// Handles an exception that escaped a callback running in this worker.
    pub(crate) fn handle_error(&self, err: JsError, context: &mut Context) {
        if self.exited.get() || self.is_terminating() {
            // Unwinding after exit, or late work of a stopped worker.
            tracing::trace!(worker = self.id, error = %err, "discarding error after stop");
            return;
        }
        self.report_uncaught(err, context);
    }

    /// Relays an uncaught exception through `process.emit('uncaughtException')`.
    fn report_uncaught(&self, err: JsError, context: &mut Context) {
        let value = err.to_opaque(context);
        tracing::debug!(worker = self.id, error = %err, "relaying uncaught exception");

        let process = match self.process() {
            Ok(process) => process,
            Err(_) => {
                tracing::warn!(worker = self.id, error = %err, "uncaught exception in unloaded worker");
                return;
            }
        };
        let handled = call_method(
            &process,
            "emit",
            &[js_string!("uncaughtException").into(), value.clone()],
            context,
        );
        match handled {
            Ok(handled) if handled.to_boolean() => {}
            Ok(_) => {
                // Every listener, including the relay, was removed.
                self.emit_error(value, context);
                self.on_exit(1, context);
            }
            Err(_) if self.exited.get() => {}
            Err(listener_err) => {
                tracing::error!(worker = self.id, error = %listener_err, "uncaughtException listener threw");
                let thrown = listener_err.to_opaque(context);
                self.emit_error(thrown, context);
                self.on_exit(1, context);
            }
        }
    }

    fn emit_error(&self, error: JsValue, context: &mut Context) {
        if self.errored.replace(true) {
            return;
        }
        tracing::warn!(worker = self.id, "worker error event");
        let event = WorkerEvent::Error(error);
        in_realm(context, self.host.realm(), |context| {
            self.listeners.emit(&event, context)
        });
    }

    /// Termination path: stop, report `exit`, then make sure the loop halts.
    pub(crate) fn on_exit(&self, code: i32, context: &mut Context) {
        if self.exited.replace(true) {
            return;
        }
        tracing::info!(worker = self.id, code, "worker exited");
        self.stop(context);
        let event = WorkerEvent::Exit(code);
        in_realm(context, self.host.realm(), |context| {
            self.listeners.emit(&event, context)
        });
        self.signal_stop();
    }

    /// Marks the worker stopped and asks its loop to halt.
    pub(crate) fn signal_stop(&self) {
        if !self.state.get().is_stopped() {
            self.state.set(WorkerState::Stopped);
            tracing::debug!(worker = self.id, "stop signalled");
        }
        self.loop_controller.signal_stop(self.id);
        self.microtasks.discard();
    }

    /// Signals stop now and releases on the host's next turn.
    ///
    /// Every call returns the same promise, created in the host realm.
    pub(crate) fn stop(&self, context: &mut Context) -> JsPromise {
        if let Some(promise) = self.stopped_promise.borrow().as_ref() {
            return promise.clone();
        }
        let (promise, resolvers) = in_realm(context, self.host.realm(), JsPromise::new_pending);
        *self.stopped_promise.borrow_mut() = Some(promise.clone());

        self.signal_stop();

        let worker = self.this.clone();
        let host_scope: Rc<dyn CallbackScope> = self.host.clone();
        self.host.event_loop().set_immediate(
            &host_scope,
            Box::new(move |context| {
                if let Some(worker) = worker.upgrade() {
                    worker.release();
                }
                resolvers.resolve.call(&JsValue::undefined(), &[], context)?;
                Ok(())
            }),
        );
        promise
    }

    /// Frees the loop, the queue route and the execution context. Runs once.
    pub(crate) fn release(&self) {
        if self.released.replace(true) {
            return;
        }
        self.signal_stop();
        self.loop_controller.release(self.id);
        self.microtasks.release(self.host.router(), &self.realm);
        self.execution.borrow_mut().take();
        self.promise_inspector.borrow_mut().take();
        self.listeners.clear();
        tracing::debug!(worker = self.id, "worker released");
    }
}

impl Drop for WorkerInner {
    fn drop(&mut self) {
        self.release();
    }
}

/// `process.reallyExit(code)` inside the worker.
fn really_exit(
    _: &JsValue,
    args: &[JsValue],
    captures: &WorkerCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let code = args.get_or_undefined(0).to_i32(context)?;
    let Some(worker) = captures.worker.upgrade() else {
        return Ok(JsValue::undefined());
    };
    worker.on_exit(code, context);
    if worker.can_be_terminated.get() {
        // An ordinary error: promise executors, reaction jobs and async
        // functions must be able to turn it into a rejection. Whatever it
        // reaches after the exit is discarded because `exited` is set.
        return Err(exit_signal(code));
    }
    Ok(JsValue::undefined())
}

/// Error used to unwind worker code out of `process.exit`.
fn exit_signal(code: i32) -> JsError {
    JsNativeError::error()
        .with_message(format!("Worker exited with code {code}"))
        .into()
}

/// The system `uncaughtException` listener.
///
/// Only acts while it is the sole listener; embedder listeners take over
/// otherwise.
fn relay_uncaught(
    _: &JsValue,
    args: &[JsValue],
    captures: &WorkerCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let Some(worker) = captures.worker.upgrade() else {
        return Ok(JsValue::undefined());
    };
    let process = worker.process()?;
    let count = call_method(
        &process,
        "listenerCount",
        &[js_string!("uncaughtException").into()],
        context,
    )?;
    if count.as_number() == Some(1.0) {
        worker.emit_error(args.get_or_undefined(0).clone(), context);
        call_method(&process, "exit", &[JsValue::from(1)], context)?;
    }
    Ok(JsValue::undefined())
}

/// A second JavaScript execution environment driven synchronously by the
/// host.
///
/// Cloning yields another handle to the same worker. The worker is released
/// when [`stop`](SynchronousWorker::stop) completes or when the last handle
/// is dropped.
///
/// # Examples
///
/// ```
/// use core_types::{RunMode, WorkerOptions};
/// use synchronous_worker::{HostRuntime, SynchronousWorker};
///
/// let mut host = HostRuntime::new().unwrap();
/// let worker = SynchronousWorker::new(&mut host, WorkerOptions::isolated()).unwrap();
/// let context = host.context_mut();
///
/// worker
///     .eval("setImmediate(() => { globalThis.done = true; })", context)
///     .unwrap();
/// worker.run_loop(RunMode::Default, context).unwrap();
/// assert!(!worker.loop_alive().unwrap());
/// ```
#[derive(Clone)]
pub struct SynchronousWorker {
    pub(crate) inner: Rc<WorkerInner>,
}

impl SynchronousWorker {
    /// Creates and loads a worker with default modules and no initializer.
    pub fn new(host: &mut HostRuntime, options: WorkerOptions) -> WorkerResult<Self> {
        Self::builder().options(options).build(host)
    }

    /// Returns a builder for custom modules and load-time setup.
    pub fn builder() -> WorkerBuilder {
        WorkerBuilder::default()
    }

    pub(crate) fn create(
        host: &Rc<HostShared>,
        options: WorkerOptions,
        modules: Vec<(String, ModuleFactory)>,
        initializer: Option<Initializer>,
        context: &mut Context,
    ) -> WorkerResult<Self> {
        let inner = WorkerInner::start(host, options, context)?;
        if let Err(err) = inner.load(modules, initializer, context) {
            tracing::warn!(worker = inner.id, error = %err, "worker failed to load");
            inner.release();
            return Err(WorkerError::Startup(err));
        }
        tracing::info!(worker = inner.id, "worker running");
        Ok(Self { inner })
    }

    /// Process-unique worker id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Options the worker was created with.
    pub fn options(&self) -> WorkerOptions {
        self.inner.options
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        self.inner.state.get()
    }

    /// Returns true once the deferred teardown has run.
    pub fn is_released(&self) -> bool {
        self.inner.released.get()
    }

    /// Steps the worker's own loop in `mode`.
    ///
    /// # Errors
    ///
    /// Usage errors for a shared loop, a stopped worker, or a call from
    /// inside a callback of an in-flight `run_loop` of this worker.
    pub fn run_loop(&self, mode: RunMode, context: &mut Context) -> WorkerResult<()> {
        self.inner.loop_controller.ensure_owned("runLoop()")?;
        if self.inner.is_terminating() {
            return Err(WorkerError::Stopped);
        }
        in_worker_scope(&self.inner, context, |context| {
            self.inner.loop_controller.run(mode, context)
        })?;
        Ok(())
    }

    /// Whether the worker's own loop has outstanding work.
    ///
    /// Always false once stopped.
    pub fn loop_alive(&self) -> WorkerResult<bool> {
        self.inner.loop_controller.ensure_owned("loopAlive")?;
        if self.inner.is_terminating() {
            return Ok(false);
        }
        Ok(self.inner.loop_controller.is_alive())
    }

    /// Stops the worker.
    ///
    /// The loop is told to halt right away; resources are released on the
    /// host loop's next turn, after which the returned promise resolves.
    /// Repeated calls return the same promise.
    pub fn stop(&self, context: &mut Context) -> JsPromise {
        self.inner.stop(context)
    }

    /// The embedded `process` object.
    pub fn process(&self) -> WorkerResult<JsObject> {
        self.inner.process()
    }

    /// The embedded global object.
    pub fn global_this(&self) -> WorkerResult<JsObject> {
        self.inner.global()
    }

    /// A `require` function scoped to the embedded environment.
    pub fn create_require(&self, filename: &str, context: &mut Context) -> WorkerResult<JsObject> {
        let modules = self
            .inner
            .execution
            .borrow()
            .as_ref()
            .map(|execution| execution.modules().clone())
            .ok_or(WorkerError::NotInitialized)?;
        Ok(modules.require_function(Some(filename.to_string()), context))
    }

    /// A `Send` handle whose messages run inside this worker on its loop.
    pub fn async_handle(&self) -> WorkerResult<AsyncHandle> {
        if self.inner.is_terminating() {
            return Err(WorkerError::Stopped);
        }
        let scope: Rc<dyn CallbackScope> = self.inner.clone();
        Ok(self.inner.loop_controller.event_loop().async_handle(&scope))
    }

    /// Registers a listener for every worker event.
    pub fn on(&self, listener: impl FnMut(&WorkerEvent, &mut Context) + 'static) {
        self.inner.listeners.add(Box::new(listener));
    }

    /// Registers a listener for the `exit` event.
    pub fn on_exit(&self, mut listener: impl FnMut(i32, &mut Context) + 'static) {
        self.on(move |event, context| {
            if let WorkerEvent::Exit(code) = event {
                listener(*code, context);
            }
        });
    }

    /// Registers a listener for the `error` event.
    pub fn on_error(&self, mut listener: impl FnMut(&JsValue, &mut Context) + 'static) {
        self.on(move |event, context| {
            if let WorkerEvent::Error(error) = event {
                listener(error, context);
            }
        });
    }
}

impl std::fmt::Debug for SynchronousWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynchronousWorker")
            .field("id", &self.inner.id)
            .field("options", &self.inner.options)
            .field("state", &self.inner.state.get())
            .field("released", &self.inner.released.get())
            .finish()
    }
}

/// Builder for [`SynchronousWorker`].
#[derive(Default)]
pub struct WorkerBuilder {
    options: WorkerOptions,
    modules: Vec<(String, ModuleFactory)>,
    initializer: Option<Initializer>,
}

impl WorkerBuilder {
    /// Set loop and queue ownership
    pub fn options(mut self, options: WorkerOptions) -> Self {
        self.options = options;
        self
    }

    /// Set whether the worker owns its event loop
    pub fn own_loop(mut self, own: bool) -> Self {
        self.options.own_loop = own;
        self
    }

    /// Set whether the worker owns its microtask queue
    pub fn own_microtask_queue(mut self, own: bool) -> Self {
        self.options.own_microtask_queue = own;
        self
    }

    /// Makes `name` loadable through the worker's `require`.
    pub fn module(
        mut self,
        name: impl Into<String>,
        factory: impl Fn(&mut Context) -> JsResult<JsValue> + 'static,
    ) -> Self {
        self.modules.push((name.into(), Rc::new(factory)));
        self
    }

    /// Runs `initializer` once during load, inside the worker.
    pub fn initializer(
        mut self,
        initializer: impl FnOnce(&LoadContext<'_>, &mut Context) -> JsResult<()> + 'static,
    ) -> Self {
        self.initializer = Some(Box::new(initializer));
        self
    }

    /// Creates the worker on `host`.
    pub fn build(self, host: &mut HostRuntime) -> WorkerResult<SynchronousWorker> {
        let (shared, context) = host.parts();
        let shared = shared.clone();
        self.build_with(&shared, context)
    }

    /// Creates the worker from host state and a context borrowed separately.
    pub fn build_with(self, host: &Rc<HostShared>, context: &mut Context) -> WorkerResult<SynchronousWorker> {
        SynchronousWorker::create(host, self.options, self.modules, self.initializer, context)
    }
}
