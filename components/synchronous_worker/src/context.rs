//! The embedded execution context.
//!
//! Holds the worker realm's global object, its `process` object and its
//! module registry. Built once during load and dropped when the worker is
//! released.

use crate::host::install_console;
use crate::modules::{ModuleFactory, ModuleRegistry};
use crate::process::create_process;
use crate::scope::in_realm;
use async_runtime::{install_timers, TimerBindings};
use boa_engine::realm::Realm;
use boa_engine::{js_string, Context, JsObject, JsResult};
use std::rc::Rc;

/// What a load-time initializer gets to see.
#[derive(Debug, Clone, Copy)]
pub struct LoadContext<'a> {
    /// The embedded `process` object
    pub process: &'a JsObject,
    /// The embedded native `require`
    pub require: &'a JsObject,
    /// The embedded global object
    pub global: &'a JsObject,
}

/// The embedded environment of one worker.
pub struct ExecutionContext {
    realm: Realm,
    global: JsObject,
    process: JsObject,
    require: JsObject,
    modules: Rc<ModuleRegistry>,
}

impl ExecutionContext {
    /// Populates `realm` with `console`, timers bound to `timers`, `global`,
    /// `process` and a native `require`.
    pub(crate) fn load(
        realm: &Realm,
        timers: Rc<TimerBindings>,
        modules: Vec<(String, ModuleFactory)>,
        context: &mut Context,
    ) -> JsResult<Self> {
        in_realm(context, realm, |context| {
            install_console(context)?;
            install_timers(timers, context)?;

            let global = context.global_object();
            global.set(js_string!("global"), global.clone(), true, context)?;

            let process = create_process(context)?;
            global.set(js_string!("process"), process.clone(), true, context)?;

            let modules = Rc::new(ModuleRegistry::new(
                realm.clone(),
                global.clone(),
                process.clone(),
                modules,
            ));
            let require = modules.require_function(None, context);

            Ok(Self {
                realm: realm.clone(),
                global,
                process,
                require,
                modules,
            })
        })
    }

    /// The worker realm.
    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    /// The embedded global object.
    pub fn global(&self) -> &JsObject {
        &self.global
    }

    /// The embedded `process` object.
    pub fn process(&self) -> &JsObject {
        &self.process
    }

    /// The embedded native `require`.
    pub fn require(&self) -> &JsObject {
        &self.require
    }

    pub(crate) fn modules(&self) -> &Rc<ModuleRegistry> {
        &self.modules
    }

    pub(crate) fn load_context(&self) -> LoadContext<'_> {
        LoadContext {
            process: &self.process,
            require: &self.require,
            global: &self.global,
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("modules", &self.modules)
            .finish_non_exhaustive()
    }
}
