//! What goes into a script run and what comes out of it.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

/// Error type returned by a dispatch handle.
pub type DispatchError = Box<dyn std::error::Error + Send + Sync>;

/// Capability handed to scripts as `dctx`.
///
/// Calls arrive on the thread running the script and block it until the
/// nested service returns.
pub trait DispatchHandle: Send + Sync {
  /// Name of the local dispatcher the script runs under.
  fn name(&self) -> &str;

  /// Run another service synchronously and return its outputs.
  fn run_sync(&self, service: &str, parameters: Map<String, Value>) -> Result<Map<String, Value>, DispatchError>;
}

/// Inputs bound into the interpreter.
pub struct ScriptBinding {
  pub dispatch: Arc<dyn DispatchHandle>,
  pub parameters: Map<String, Value>,
}

/// What a script left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOutcome {
  /// The `context` table after evaluation.
  pub parameters: Map<String, Value>,
  /// The `result` global, if the script set one.
  pub result: Option<Value>,
}

impl ScriptOutcome {
  /// Merge a map-shaped `result` into the parameters, `result` winning on
  /// collisions. Any other `result` value is ignored.
  pub fn merged(self) -> Map<String, Value> {
    let mut parameters = self.parameters;
    match self.result {
      Some(Value::Object(result)) => parameters.extend(result),
      Some(other) => {
        warn!(result = %other, "script result is not a map, ignoring");
      }
      None => {}
    }
    parameters
  }
}
