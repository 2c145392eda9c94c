//! Service model errors.

use kiln_config::ParamType;

/// Errors raised while resolving a service definition.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
  #[error("service name must not be empty")]
  EmptyName,

  #[error("service '{service}' declares parameter '{param}' more than once")]
  DuplicateParam { service: String, param: String },

  #[error("service '{service}' declares reserved parameter '{param}'")]
  ReservedParam { service: String, param: String },
}

/// A parameter map does not satisfy a service's declared parameters.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
  /// A required parameter is absent or null.
  #[error("service '{service}' is missing required parameter '{param}'")]
  MissingRequired { service: String, param: String },

  /// A parameter could not be coerced to its declared type.
  #[error("parameter '{param}' of service '{service}' expected {expected:?}, got {actual}")]
  WrongType {
    service: String,
    param: String,
    expected: ParamType,
    actual: String,
  },
}
