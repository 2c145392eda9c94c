//! Output contract evaluation.
//!
//! An engine returns the merged parameter map of a run. The contract keeps the
//! service's declared OUT / INOUT parameters plus the framework's reserved
//! response keys, coerces string values to the declared type, and drops
//! everything else.
//!
//! # Coercion
//! Values that already have the declared type pass through. Strings are parsed
//! into the declared type the same way a templated input would be:
//! - `"42"` (integer) → `42`
//! - `"19.99"` (number) → `19.99`
//! - `"TRUE"` (boolean) → `true`
//! - `"[1, 2]"` (array) → `[1, 2]`
//!
//! Numbers and booleans declared as strings are rendered to text. Anything else
//! is a [`ContractError::WrongType`].

use kiln_config::{ParamDef, ParamType};
use serde_json::{Map, Value};

use crate::error::ContractError;

/// Framework-reserved output keys, always passed through when present.
pub const RESERVED_OUTPUTS: &[&str] = &[
  "response_message",
  "error_message",
  "error_message_list",
  "success_message",
  "success_message_list",
];

/// The declared outputs of a service.
#[derive(Debug, Clone)]
pub struct OutputContract {
  service: String,
  outputs: Vec<ParamDef>,
}

impl OutputContract {
  /// Build a contract from a service's parameter list, keeping OUT / INOUT.
  pub fn new(service: impl Into<String>, params: &[ParamDef]) -> Self {
    Self {
      service: service.into(),
      outputs: params.iter().filter(|p| p.mode.is_out()).cloned().collect(),
    }
  }

  /// Declared output parameters.
  pub fn outputs(&self) -> &[ParamDef] {
    &self.outputs
  }

  /// Filter a merged parameter map down to the declared outputs.
  ///
  /// Extra keys are dropped and missing optional outputs are skipped. Fails
  /// only when a required output is absent or null, or cannot be coerced.
  pub fn filter_outputs(&self, merged: &Map<String, Value>) -> Result<Map<String, Value>, ContractError> {
    let mut result = Map::new();

    for param in &self.outputs {
      match merged.get(&param.name) {
        None | Some(Value::Null) if !param.optional => {
          return Err(ContractError::MissingRequired {
            service: self.service.clone(),
            param: param.name.clone(),
          });
        }
        None => {}
        Some(Value::Null) => {
          result.insert(param.name.clone(), Value::Null);
        }
        Some(value) => {
          let typed = coerce_value(&self.service, param, value)?;
          result.insert(param.name.clone(), typed);
        }
      }
    }

    for key in RESERVED_OUTPUTS {
      if let Some(value) = merged.get(*key) {
        result.insert((*key).to_string(), value.clone());
      }
    }

    Ok(result)
  }
}

/// Coerce a single value to a parameter's declared type.
pub fn coerce_value(service: &str, param: &ParamDef, value: &Value) -> Result<Value, ContractError> {
  let wrong_type = || ContractError::WrongType {
    service: service.to_string(),
    param: param.name.clone(),
    expected: param.param_type,
    actual: describe(value),
  };

  match (param.param_type, value) {
    (ParamType::Any, v) => Ok(v.clone()),

    (ParamType::String, Value::String(_)) => Ok(value.clone()),
    (ParamType::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
    (ParamType::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),

    (ParamType::Integer, Value::Number(n)) => {
      if n.is_i64() || n.is_u64() {
        return Ok(value.clone());
      }
      // Lua division always yields a float, accept whole floats.
      match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Value::from(f as i64)),
        _ => Err(wrong_type()),
      }
    }
    (ParamType::Integer, Value::String(s)) => s
      .trim()
      .parse::<i64>()
      .map(Value::from)
      .map_err(|_| wrong_type()),

    (ParamType::Number, Value::Number(_)) => Ok(value.clone()),
    (ParamType::Number, Value::String(s)) => s
      .trim()
      .parse::<f64>()
      .ok()
      .and_then(serde_json::Number::from_f64)
      .map(Value::Number)
      .ok_or_else(wrong_type),

    (ParamType::Boolean, Value::Bool(_)) => Ok(value.clone()),
    (ParamType::Boolean, Value::String(s)) => match s.to_lowercase().as_str() {
      "true" => Ok(Value::Bool(true)),
      "false" => Ok(Value::Bool(false)),
      _ => Err(wrong_type()),
    },

    (ParamType::Array, Value::Array(_)) => Ok(value.clone()),
    (ParamType::Object, Value::Object(_)) => Ok(value.clone()),
    (ParamType::Array, Value::String(s)) => match serde_json::from_str(s) {
      Ok(parsed @ Value::Array(_)) => Ok(parsed),
      _ => Err(wrong_type()),
    },
    (ParamType::Object, Value::String(s)) => match serde_json::from_str(s) {
      Ok(parsed @ Value::Object(_)) => Ok(parsed),
      _ => Err(wrong_type()),
    },

    _ => Err(wrong_type()),
  }
}

fn describe(value: &Value) -> String {
  match value {
    Value::Null => "null".to_string(),
    Value::Bool(b) => format!("boolean {}", b),
    Value::Number(n) => format!("number {}", n),
    Value::String(s) => format!("string '{}'", s),
    Value::Array(_) => "array".to_string(),
    Value::Object(_) => "object".to_string(),
  }
}
