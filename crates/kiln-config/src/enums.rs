use serde::{Deserialize, Serialize};

/// Direction of a service parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamMode {
  In,
  Out,
  #[serde(alias = "inout")]
  InOut,
}

impl ParamMode {
  /// Whether the parameter is accepted as input.
  pub fn is_in(self) -> bool {
    matches!(self, ParamMode::In | ParamMode::InOut)
  }

  /// Whether the parameter is returned as output.
  pub fn is_out(self) -> bool {
    matches!(self, ParamMode::Out | ParamMode::InOut)
  }
}

/// Declared type of a service parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
  #[default]
  Any,
  String,
  Integer,
  Number,
  Boolean,
  Array,
  Object,
}
