//! Native `require` for the embedded environment.
//!
//! Resolves built-in module ids and embedder-supplied factories. Files on
//! disk are never loaded.

use crate::native::{define_function, eval_script, function, plain_object};
use crate::scope::in_realm;
use boa_engine::object::builtins::JsArray;
use boa_engine::realm::Realm;
use boa_engine::{
    js_string, Context, JsArgs, JsError, JsNativeError, JsObject, JsResult, JsString, JsValue,
};
use boa_gc::{Finalize, Trace};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// Builds the exports of an embedder-supplied module.
pub type ModuleFactory = Rc<dyn Fn(&mut Context) -> JsResult<JsValue>>;

/// Ids served without a factory.
pub const BUILTIN_MODULES: [&str; 4] = ["module", "process", "timers", "vm"];

const TIMER_EXPORTS: [&str; 6] = [
    "setTimeout",
    "setInterval",
    "setImmediate",
    "clearTimeout",
    "clearInterval",
    "clearImmediate",
];

/// Per-worker module table and export cache.
pub struct ModuleRegistry {
    realm: Realm,
    global: JsObject,
    process: JsObject,
    factories: Vec<(String, ModuleFactory)>,
    cache: RefCell<HashMap<String, JsValue>>,
}

#[derive(Clone, Trace, Finalize)]
struct RequireCaptures {
    #[unsafe_ignore_trace]
    registry: Weak<ModuleRegistry>,
    #[unsafe_ignore_trace]
    filename: Option<String>,
}

fn strip_scheme(id: &str) -> &str {
    id.strip_prefix("node:").unwrap_or(id)
}

fn module_not_found(id: &str, context: &mut Context) -> JsError {
    let error = JsNativeError::error()
        .with_message(format!("Cannot find module '{id}'"))
        .to_opaque(context);
    if let Err(err) = error.set(js_string!("code"), js_string!("MODULE_NOT_FOUND"), false, context) {
        return err;
    }
    JsError::from_opaque(error.into())
}

impl ModuleRegistry {
    pub(crate) fn new(
        realm: Realm,
        global: JsObject,
        process: JsObject,
        factories: Vec<(String, ModuleFactory)>,
    ) -> Self {
        Self {
            realm,
            global,
            process,
            factories,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Whether `id` names a built-in or registered module.
    pub fn is_known(&self, id: &str) -> bool {
        let id = strip_scheme(id);
        BUILTIN_MODULES.contains(&id) || self.factories.iter().any(|(name, _)| name == id)
    }

    /// Number of modules loaded so far.
    pub fn cached_count(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Loads `id`, reusing cached exports.
    pub fn require(self: &Rc<Self>, id: &str, context: &mut Context) -> JsResult<JsValue> {
        let key = strip_scheme(id).to_string();
        if let Some(exports) = self.cache.borrow().get(&key) {
            return Ok(exports.clone());
        }

        let exports = in_realm(context, &self.realm, |context| self.load(&key, id, context))?;
        tracing::trace!(module = %key, "module loaded");
        self.cache.borrow_mut().insert(key, exports.clone());
        Ok(exports)
    }

    fn load(self: &Rc<Self>, key: &str, id: &str, context: &mut Context) -> JsResult<JsValue> {
        // Registered factories shadow built-ins of the same name.
        if let Some((_, factory)) = self.factories.iter().find(|(name, _)| name == key) {
            let factory = factory.clone();
            return factory(context);
        }
        match key {
            "process" => Ok(self.process.clone().into()),
            "timers" => self.timers_module(context),
            "vm" => self.vm_module(context),
            "module" => self.module_module(context),
            _ => Err(module_not_found(id, context)),
        }
    }

    fn timers_module(&self, context: &mut Context) -> JsResult<JsValue> {
        let exports = plain_object(context);
        for name in TIMER_EXPORTS {
            let value = self.global.get(JsString::from(name), context)?;
            exports.set(JsString::from(name), value, true, context)?;
        }
        Ok(exports.into())
    }

    fn vm_module(self: &Rc<Self>, context: &mut Context) -> JsResult<JsValue> {
        let exports = plain_object(context);
        let captures = RequireCaptures {
            registry: Rc::downgrade(self),
            filename: None,
        };
        define_function(&exports, "runInThisContext", 1, run_in_this_context, captures, context)?;
        Ok(exports.into())
    }

    fn module_module(self: &Rc<Self>, context: &mut Context) -> JsResult<JsValue> {
        let exports = plain_object(context);
        let captures = RequireCaptures {
            registry: Rc::downgrade(self),
            filename: None,
        };
        define_function(&exports, "createRequire", 1, create_require, captures, context)?;
        let builtins = JsArray::from_iter(
            BUILTIN_MODULES.iter().map(|name| JsValue::from(JsString::from(*name))),
            context,
        );
        exports.set(js_string!("builtinModules"), builtins, true, context)?;
        Ok(exports.into())
    }

    /// Creates a `require` function for this registry in the worker realm.
    ///
    /// The function holds the registry weakly and throws once the worker
    /// has been released.
    pub fn require_function(self: &Rc<Self>, filename: Option<String>, context: &mut Context) -> JsObject {
        in_realm(context, &self.realm, |context| {
            let captures = RequireCaptures {
                registry: Rc::downgrade(self),
                filename,
            };
            let require: JsObject = function("require", 1, require, captures.clone(), context).into();
            // Installation on a fresh function object cannot fail.
            let _ = define_function(&require, "resolve", 1, resolve, captures, context);
            require
        })
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field(
                "factories",
                &self.factories.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
            )
            .field("cached", &self.cached_count())
            .finish()
    }
}

impl RequireCaptures {
    fn registry(&self) -> JsResult<Rc<ModuleRegistry>> {
        self.registry.upgrade().ok_or_else(|| {
            JsNativeError::error()
                .with_message("Worker has been stopped")
                .into()
        })
    }
}

fn id_arg(args: &[JsValue]) -> JsResult<String> {
    args.get_or_undefined(0)
        .as_string()
        .map(JsString::to_std_string_escaped)
        .ok_or_else(|| {
            JsNativeError::typ()
                .with_message("The \"id\" argument must be of type string")
                .into()
        })
}

fn require(
    _: &JsValue,
    args: &[JsValue],
    captures: &RequireCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let id = id_arg(args)?;
    let registry = captures.registry()?;
    if let Some(filename) = &captures.filename {
        tracing::trace!(module = %id, from = %filename, "require");
    }
    registry.require(&id, context)
}

fn resolve(
    _: &JsValue,
    args: &[JsValue],
    captures: &RequireCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let id = id_arg(args)?;
    let registry = captures.registry()?;
    if registry.is_known(&id) {
        Ok(JsString::from(id.as_str()).into())
    } else {
        Err(module_not_found(&id, context))
    }
}

fn create_require(
    _: &JsValue,
    args: &[JsValue],
    captures: &RequireCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let filename = args
        .get_or_undefined(0)
        .as_string()
        .map(JsString::to_std_string_escaped)
        .ok_or_else(|| {
            JsError::from(
                JsNativeError::typ().with_message("The \"filename\" argument must be of type string"),
            )
        })?;
    let registry = captures.registry()?;
    Ok(registry.require_function(Some(filename), context).into())
}

fn run_in_this_context(
    _: &JsValue,
    args: &[JsValue],
    captures: &RequireCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let code = args.get_or_undefined(0).to_string(context)?.to_std_string_escaped();
    let registry = captures.registry()?;
    in_realm(context, &registry.realm, |context| eval_script(&code, context))
}
