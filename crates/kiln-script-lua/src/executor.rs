//! Lua script executor.

use std::sync::Arc;

use mlua::{Lua, LuaOptions, LuaSerdeExt, StdLib, Table};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::binding::{DispatchHandle, ScriptBinding, ScriptOutcome};
use crate::error::ScriptError;

/// Global holding the dispatch handle.
pub const DISPATCH_GLOBAL: &str = "dctx";
/// Global holding the parameter table.
pub const CONTEXT_GLOBAL: &str = "context";
/// Global a script may set to return a map.
pub const RESULT_GLOBAL: &str = "result";
/// Global holding the sentinel JSON `null` maps to.
pub const NULL_GLOBAL: &str = "null";

/// Interpreter settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LuaConfig {
  /// Memory ceiling per Lua state in bytes. `None` leaves it unlimited.
  pub memory_limit: Option<usize>,
}

/// Runs scripts, one fresh Lua state per call.
#[derive(Debug, Clone, Default)]
pub struct LuaExecutor {
  config: LuaConfig,
}

impl LuaExecutor {
  pub fn new(config: LuaConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> LuaConfig {
    self.config
  }

  /// Evaluate `source` with `dctx` and `context` bound.
  ///
  /// JSON `null`, at any depth, is bound as the `null` sentinel rather than
  /// `nil`, so entries the script leaves alone come back unchanged. Integers
  /// above `i64::MAX` have no Lua integer form and come back as floats.
  ///
  /// `chunk_name` labels the chunk in Lua error messages; pass the script
  /// location.
  pub fn execute(&self, source: &str, chunk_name: &str, binding: ScriptBinding) -> Result<ScriptOutcome, ScriptError> {
    let lua = self.create_state()?;
    let globals = lua.globals();

    globals.set(NULL_GLOBAL, lua.null())?;
    globals.set(DISPATCH_GLOBAL, dispatch_table(&lua, binding.dispatch)?)?;
    globals.set(CONTEXT_GLOBAL, lua.to_value(&Value::Object(binding.parameters))?)?;

    debug!(chunk = chunk_name, "evaluating script");
    lua
      .load(source)
      .set_name(chunk_name)
      .exec()
      .map_err(|source| ScriptError::Evaluation {
        chunk: chunk_name.to_string(),
        source,
      })?;

    let parameters = read_context(&lua, &globals, chunk_name)?;
    let result = read_result(&lua, &globals, chunk_name)?;

    Ok(ScriptOutcome { parameters, result })
  }

  fn create_state(&self) -> Result<Lua, ScriptError> {
    let libs = StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8 | StdLib::COROUTINE;
    let lua = Lua::new_with(libs, LuaOptions::default())?;

    if let Some(limit) = self.config.memory_limit {
      lua.set_memory_limit(limit)?;
    }

    Ok(lua)
  }
}

fn read_context(lua: &Lua, globals: &Table, chunk: &str) -> Result<Map<String, Value>, ScriptError> {
  let context: mlua::Value = globals.get(CONTEXT_GLOBAL)?;
  if !context.is_table() {
    return Err(ScriptError::ContextReplaced {
      chunk: chunk.to_string(),
      found: context.type_name().to_string(),
    });
  }

  match lua.from_value::<Value>(context) {
    Ok(Value::Object(map)) => Ok(map),
    Ok(_) => Err(ScriptError::ContextReplaced {
      chunk: chunk.to_string(),
      found: "sequence".to_string(),
    }),
    Err(source) => Err(ScriptError::Conversion {
      chunk: chunk.to_string(),
      source,
    }),
  }
}

fn read_result(lua: &Lua, globals: &Table, chunk: &str) -> Result<Option<Value>, ScriptError> {
  let result: mlua::Value = globals.get(RESULT_GLOBAL)?;
  if result.is_nil() {
    return Ok(None);
  }

  match lua.from_value::<Value>(result) {
    Ok(value) => Ok(Some(value)),
    Err(e) => {
      warn!(chunk, error = %e, "script result has no JSON form, ignoring");
      Ok(None)
    }
  }
}

/// Build the `dctx` table exposed to scripts.
fn dispatch_table(lua: &Lua, handle: Arc<dyn DispatchHandle>) -> mlua::Result<Table> {
  let table = lua.create_table()?;
  table.set("name", handle.name().to_string())?;

  // dctx.run_sync(service, params) -> table
  let run_sync = lua.create_function(move |lua, (service, params): (String, Option<mlua::Value>)| {
    let parameters = match params {
      None | Some(mlua::Value::Nil) => Map::new(),
      Some(value) => match lua.from_value::<Value>(value)? {
        Value::Object(map) => map,
        _ => {
          return Err(mlua::Error::RuntimeError(
            "run_sync parameters must be a table".to_string(),
          ));
        }
      },
    };

    debug!(service = %service, "script dispatching service");
    let outputs = handle.run_sync(&service, parameters).map_err(mlua::Error::external)?;
    lua.to_value(&Value::Object(outputs))
  })?;
  table.set("run_sync", run_sync)?;

  // dctx.log(level, message)
  let log = lua.create_function(|_, (level, message): (String, String)| {
    match level.to_lowercase().as_str() {
      "debug" => debug!(target: "kiln::script", "{}", message),
      "warn" | "warning" => warn!(target: "kiln::script", "{}", message),
      "error" => error!(target: "kiln::script", "{}", message),
      _ => info!(target: "kiln::script", "{}", message),
    }
    Ok(())
  })?;
  table.set("log", log)?;

  Ok(table)
}
