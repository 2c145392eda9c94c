//! Service dispatch for kiln.
//!
//! A [`ServiceDispatcher`] holds service definitions and the engines that run
//! them. The built-in [`ScriptEngine`] runs Lua services:
//!
//! 1. The location (or its alias) is resolved against the caller's
//!    [`DispatchContext`] roots.
//! 2. The source is fetched once per `{context}_{location}` key and kept in a
//!    shared source cache.
//! 3. Each call evaluates it in a fresh interpreter with `dctx` and `context`
//!    bound, merges a map-valued `result` over the parameters, and filters
//!    the merged map through the service's output contract.
//!
//! Scripts may call `dctx.run_sync(service, params)` to run other services
//! through the same dispatcher.

mod config;
mod context;
mod dispatcher;
mod engine;
mod error;
mod script;

pub use config::EngineConfig;
pub use context::DispatchContext;
pub use dispatcher::{DEFAULT_CONTEXT, DEFAULT_ENGINE, ServiceDispatcher, ServiceHandle};
pub use engine::GenericEngine;
pub use error::{ConfigError, ScriptLoadError, ServiceError};
pub use script::{SCRIPT_CACHE_NAME, ScriptEngine};
