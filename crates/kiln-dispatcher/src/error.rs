//! Dispatch errors.

use kiln_resource::{FetchError, LocateError};
use kiln_script_lua::ScriptError;
use kiln_service::{ContractError, ModelError};

/// The single error type a service call can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
  /// No service registered under the name.
  #[error("service '{service}' not found")]
  ServiceNotFound { service: String },

  /// The service names an engine nobody registered.
  #[error("service '{service}' uses unknown engine '{engine}'")]
  UnknownEngine { service: String, engine: String },

  /// The service has nothing for the engine to run.
  #[error("cannot locate service '{service}' to invoke")]
  NotInvocable { service: String },

  /// The service definition is invalid.
  #[error("invalid service definition")]
  Model(#[from] ModelError),

  /// Inputs do not satisfy the declared IN parameters.
  #[error("invalid input for service '{service}'")]
  InvalidInput {
    service: String,
    #[source]
    source: ContractError,
  },

  /// The script location did not resolve.
  #[error("cannot read script for service '{service}', resource '{location}' not found")]
  ResourceNotFound {
    service: String,
    location: String,
    #[source]
    source: LocateError,
  },

  /// The script could not be read, or was empty.
  #[error("cannot load script '{location}' for service '{service}'")]
  ScriptLoad {
    service: String,
    location: String,
    #[source]
    source: ScriptLoadError,
  },

  /// The script failed while running.
  #[error("script for service '{service}' threw an exception")]
  ScriptEvaluation {
    service: String,
    #[source]
    source: ScriptError,
  },

  /// Outputs do not satisfy the declared output contract.
  #[error("output of service '{service}' violates its contract")]
  SchemaViolation {
    service: String,
    #[source]
    source: ContractError,
  },

  /// The blocking task running the script was lost.
  #[error("script task for service '{service}' did not complete: {message}")]
  Join { service: String, message: String },

  /// The engine could not be set up.
  #[error("engine setup failed: {message}")]
  Setup { message: String },
}

/// Why a script's source could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ScriptLoadError {
  #[error("cannot read script from resource")]
  Fetch(#[from] FetchError),

  #[error("null or empty script ({len} chars, need at least {min})")]
  TooShort { len: usize, min: usize },
}

/// Invalid engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("invalid value '{value}' for {var}: {message}")]
  InvalidValue {
    var: String,
    value: String,
    message: String,
  },
}
