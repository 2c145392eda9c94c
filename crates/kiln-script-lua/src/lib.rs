//! Lua execution for kiln services.
//!
//! Every call to [`LuaExecutor::execute`] builds a fresh Lua state, binds its
//! globals and evaluates the script:
//!
//! - `dctx`: the dispatch handle (`dctx.name`, `dctx.run_sync(service, params)`,
//!   `dctx.log(level, message)`)
//! - `context`: the parameter table, readable and writable
//! - `null`: the value JSON `null` is bound as; compare with `context.x == null`
//!
//! A script returns data by writing to `context`, by assigning a `result`
//! table, or both. [`ScriptOutcome::merged`] folds `result` into the
//! parameters.
//!
//! ```lua
//! context.total = context.amount * 2
//! result = { currency = "EUR" }
//! ```

mod binding;
mod error;
mod executor;

pub use binding::{DispatchError, DispatchHandle, ScriptBinding, ScriptOutcome};
pub use error::ScriptError;
pub use executor::{CONTEXT_GLOBAL, DISPATCH_GLOBAL, LuaConfig, LuaExecutor, NULL_GLOBAL, RESULT_GLOBAL};
