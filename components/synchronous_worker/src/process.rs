//! The embedded `process` object.
//!
//! Built from a small script so that its event emitter behaves like
//! ordinary JavaScript. `reallyExit` is a placeholder until the worker binds
//! its termination path during load.

use crate::native::eval_script;
use boa_engine::{Context, JsNativeError, JsObject, JsResult, JsValue};
use serde_json::json;

const PROCESS_SOURCE: &str = r#"(function (info) {
  'use strict';
  const events = new Map();
  let exiting = false;

  function entries(name) {
    let list = events.get(name);
    if (list === undefined) {
      list = [];
      events.set(name, list);
    }
    return list;
  }

  function checkListener(listener) {
    if (typeof listener !== 'function') {
      throw new TypeError('The "listener" argument must be of type function');
    }
  }

  const process = {
    pid: info.pid,
    platform: info.platform,
    argv: info.argv,
    env: info.env,
    exitCode: undefined,
    cwd() {
      return info.cwd;
    },
    on(name, listener) {
      checkListener(listener);
      entries(name).push({ listener, once: false });
      return process;
    },
    once(name, listener) {
      checkListener(listener);
      entries(name).push({ listener, once: true });
      return process;
    },
    off(name, listener) {
      const list = events.get(name);
      if (list !== undefined) {
        const index = list.findIndex((entry) => entry.listener === listener);
        if (index !== -1) list.splice(index, 1);
      }
      return process;
    },
    removeAllListeners(name) {
      if (name === undefined) events.clear();
      else events.delete(name);
      return process;
    },
    listeners(name) {
      return (events.get(name) || []).map((entry) => entry.listener);
    },
    listenerCount(name) {
      const list = events.get(name);
      return list === undefined ? 0 : list.length;
    },
    emit(name, ...args) {
      const list = events.get(name);
      if (list === undefined || list.length === 0) return false;
      for (const entry of list.slice()) {
        if (entry.once) process.off(name, entry.listener);
        entry.listener.apply(process, args);
      }
      return true;
    },
    nextTick(callback, ...args) {
      if (typeof callback !== 'function') {
        throw new TypeError('The "callback" argument must be of type function');
      }
      queueMicrotask(() => callback(...args));
    },
    exit(code) {
      if (code !== undefined) process.exitCode = code;
      const status = process.exitCode === undefined ? 0 : process.exitCode | 0;
      if (!exiting) {
        exiting = true;
        process.emit('exit', status);
      }
      process.reallyExit(status);
    },
    reallyExit() {
      throw new Error('process.reallyExit is not available');
    },
  };
  process.addListener = process.on;
  process.removeListener = process.off;
  return process;
})"#;

/// Name reported as `process.platform`.
pub fn platform() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}

fn process_info() -> serde_json::Value {
    let cwd = std::env::current_dir()
        .map(|dir| dir.display().to_string())
        .unwrap_or_default();
    let env: serde_json::Map<String, serde_json::Value> = std::env::vars()
        .map(|(key, value)| (key, serde_json::Value::String(value)))
        .collect();
    json!({
        "pid": std::process::id(),
        "platform": platform(),
        "cwd": cwd,
        "argv": std::env::args().collect::<Vec<_>>(),
        "env": env,
    })
}

/// Creates a `process` object in the current realm.
pub(crate) fn create_process(context: &mut Context) -> JsResult<JsObject> {
    let factory = eval_script(PROCESS_SOURCE, context)?;
    let factory = factory.as_callable().cloned().ok_or_else(|| {
        JsNativeError::typ().with_message("process bootstrap did not evaluate to a function")
    })?;
    let info = JsValue::from_json(&process_info(), context)?;
    let process = factory.call(&JsValue::undefined(), &[info], context)?;
    process.as_object().cloned().ok_or_else(|| {
        JsNativeError::typ()
            .with_message("process bootstrap did not return an object")
            .into()
    })
}
