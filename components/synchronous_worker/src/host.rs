//! The host side of the embedding.
//!
//! A [`HostRuntime`] owns the engine context, the host realm, the host event
//! loop and the host microtask queue. Workers borrow these when configured
//! to share them.

use crate::error::WorkerResult;
use crate::scope::in_realm;
use async_runtime::{install_timers, Callback, CallbackScope, EventLoop, MicrotaskQueue, TimerBindings};
use boa_engine::job::{FutureJob, JobQueue, NativeJob};
use boa_engine::property::Attribute;
use boa_engine::realm::Realm;
use boa_engine::{js_string, Context, JsError, JsNativeError, JsResult, JsValue, Source};
use boa_runtime::Console;
use core_types::RunMode;
use std::cell::RefCell;
use std::rc::Rc;

/// Scope id reserved for host callbacks.
pub const HOST_SCOPE_ID: u64 = 0;

/// Routes promise jobs to the microtask queue of the realm they belong to.
///
/// Realms without a registered queue (the host realm, and workers sharing
/// the host queue) fall through to the host queue.
pub struct JobRouter {
    fallback: Rc<MicrotaskQueue>,
    routes: RefCell<Vec<(Realm, Rc<MicrotaskQueue>)>>,
}

impl JobRouter {
    fn new(fallback: Rc<MicrotaskQueue>) -> Self {
        Self {
            fallback,
            routes: RefCell::new(Vec::new()),
        }
    }

    /// Sends jobs of `realm` to `queue` from now on.
    pub fn route(&self, realm: Realm, queue: Rc<MicrotaskQueue>) {
        self.routes.borrow_mut().push((realm, queue));
    }

    /// Removes the route of `realm`; its jobs go to the host queue again.
    pub fn unroute(&self, realm: &Realm) {
        self.routes.borrow_mut().retain(|(r, _)| r != realm);
    }

    /// Number of realms with their own queue.
    pub fn route_count(&self) -> usize {
        self.routes.borrow().len()
    }

    fn queue_for(&self, realm: Option<&Realm>) -> Rc<MicrotaskQueue> {
        realm
            .and_then(|realm| {
                self.routes
                    .borrow()
                    .iter()
                    .find(|(r, _)| r == realm)
                    .map(|(_, queue)| queue.clone())
            })
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl JobQueue for JobRouter {
    fn enqueue_promise_job(&self, job: NativeJob, _context: &mut Context) {
        self.queue_for(job.realm()).enqueue(job);
    }

    fn enqueue_future_job(&self, future: FutureJob, context: &mut Context) {
        let job = futures::executor::block_on(future);
        self.enqueue_promise_job(job, context);
    }

    fn run_jobs(&self, context: &mut Context) {
        self.fallback.drain(context, &mut |err, _| {
            tracing::error!(error = %err, "uncaught exception in host job");
        });
    }
}

/// Host state shared with workers.
pub struct HostShared {
    realm: Realm,
    event_loop: Rc<EventLoop>,
    microtasks: Rc<MicrotaskQueue>,
    router: Rc<JobRouter>,
    uncaught: RefCell<Vec<JsError>>,
}

impl HostShared {
    /// The host realm.
    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    /// The host event loop.
    pub fn event_loop(&self) -> &Rc<EventLoop> {
        &self.event_loop
    }

    /// The host microtask queue.
    pub fn microtasks(&self) -> &Rc<MicrotaskQueue> {
        &self.microtasks
    }

    /// The job router installed in the engine.
    pub fn router(&self) -> &JobRouter {
        &self.router
    }

    /// Host turn boundary: drains the host microtask queue.
    pub fn run_microtasks(&self, context: &mut Context) -> usize {
        self.microtasks
            .drain(context, &mut |err, _| self.report_uncaught(err))
    }

    fn report_uncaught(&self, err: JsError) {
        tracing::error!(error = %err, "uncaught exception in host callback");
        self.uncaught.borrow_mut().push(err);
    }
}

impl CallbackScope for HostShared {
    fn scope_id(&self) -> u64 {
        HOST_SCOPE_ID
    }

    fn invoke(&self, callback: Callback, context: &mut Context) {
        if let Err(err) = in_realm(context, &self.realm, callback) {
            self.report_uncaught(err);
        }
    }
}

/// The embedding host: one engine context with its host realm, loop and
/// microtask queue.
///
/// # Examples
///
/// ```
/// use synchronous_worker::HostRuntime;
///
/// let mut host = HostRuntime::new().unwrap();
/// let value = host.eval("1 + 2").unwrap();
/// assert_eq!(value.as_number(), Some(3.0));
/// ```
pub struct HostRuntime {
    context: Context,
    shared: Rc<HostShared>,
}

impl HostRuntime {
    /// Builds the engine context and installs `console`, the timer functions
    /// and `queueMicrotask` into the host realm.
    pub fn new() -> WorkerResult<Self> {
        let microtasks = Rc::new(MicrotaskQueue::new());
        let router = Rc::new(JobRouter::new(microtasks.clone()));
        let mut context = boa_engine::context::ContextBuilder::new()
            .job_queue(router.clone())
            .build()?;

        let shared = Rc::new(HostShared {
            realm: context.realm().clone(),
            event_loop: Rc::new(EventLoop::new("host")),
            microtasks,
            router,
            uncaught: RefCell::new(Vec::new()),
        });

        let boundary = Rc::downgrade(&shared);
        shared.event_loop.set_turn_boundary(move |context| {
            if let Some(shared) = boundary.upgrade() {
                shared.run_microtasks(context);
            }
        });

        let scope: Rc<dyn CallbackScope> = shared.clone();
        let bindings = Rc::new(TimerBindings {
            event_loop: shared.event_loop.clone(),
            microtasks: shared.microtasks.clone(),
            scope: Rc::downgrade(&scope),
        });
        install_timers(bindings, &mut context)?;
        install_console(&mut context)?;

        tracing::debug!("host runtime ready");
        Ok(Self { context, shared })
    }

    /// The engine context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Mutable access to the engine context, for driving workers.
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Host state shared with workers.
    pub fn shared(&self) -> &Rc<HostShared> {
        &self.shared
    }

    /// Splits the runtime into its shared state and the engine context.
    pub fn parts(&mut self) -> (&Rc<HostShared>, &mut Context) {
        (&self.shared, &mut self.context)
    }

    /// Evaluates `source` in the host realm, then runs a host turn boundary.
    pub fn eval(&mut self, source: &str) -> JsResult<JsValue> {
        let result = in_realm(&mut self.context, &self.shared.realm, |context| {
            context.eval(Source::from_bytes(source))
        });
        self.run_microtasks();
        result
    }

    /// Drains the host microtask queue.
    pub fn run_microtasks(&mut self) -> usize {
        self.shared.run_microtasks(&mut self.context)
    }

    /// Runs the host loop until nothing keeps it alive.
    ///
    /// Returns the first uncaught exception raised by a host callback.
    pub fn run_event_loop(&mut self) -> JsResult<()> {
        self.run_event_loop_with(RunMode::Default).map(|_| ())
    }

    /// Steps the host loop in `mode`; returns whether it is still alive.
    pub fn run_event_loop_with(&mut self, mode: RunMode) -> JsResult<bool> {
        self.run_microtasks();
        let alive = self
            .shared
            .event_loop
            .run(mode, &mut self.context)
            .map_err(|err| JsNativeError::error().with_message(err.to_string()))?;
        match self.take_uncaught().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(alive),
        }
    }

    /// Takes the uncaught host exceptions collected so far.
    pub fn take_uncaught(&self) -> Vec<JsError> {
        std::mem::take(&mut *self.shared.uncaught.borrow_mut())
    }

    /// Exposes the `SynchronousWorker` constructor to host JavaScript.
    pub fn install_worker_api(&mut self) -> JsResult<()> {
        let shared = self.shared.clone();
        in_realm(&mut self.context, &shared.realm, |context| {
            crate::bindings::install(&shared, context)
        })
    }
}

impl std::fmt::Debug for HostRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostRuntime")
            .field("event_loop", &self.shared.event_loop)
            .field("microtasks", &self.shared.microtasks)
            .finish()
    }
}

/// Installs `console` into the current realm.
pub(crate) fn install_console(context: &mut Context) -> JsResult<()> {
    let console = Console::init(context);
    context.register_global_property(
        js_string!("console"),
        console,
        Attribute::WRITABLE | Attribute::CONFIGURABLE,
    )
}
