use serde::{Deserialize, Serialize};

use crate::enums::{ParamMode, ParamType};

/// A service definition as written in the services file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDef {
  /// Service name, unique within a dispatcher.
  pub name: String,

  /// Engine that runs the service, e.g. "lua".
  #[serde(default = "default_engine")]
  pub engine: String,

  /// Script location or location alias.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub location: Option<String>,

  /// Entry point name. A service without one is not invocable; script
  /// engines evaluate the whole chunk whatever it names.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub invoke: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,

  #[serde(default)]
  pub parameters: Vec<ParamDef>,
}

/// A declared service parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
  pub name: String,
  pub mode: ParamMode,
  #[serde(default, rename = "type")]
  pub param_type: ParamType,
  #[serde(default)]
  pub optional: bool,
}

fn default_engine() -> String {
  "lua".to_string()
}
