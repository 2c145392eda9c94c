//! Script execution errors.

/// Errors raised while running a script. Nothing partial is returned with them.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
  /// The Lua state could not be created or the globals could not be bound.
  #[error("lua setup failed: {0}")]
  Setup(#[from] mlua::Error),

  /// The script failed to compile or raised at runtime.
  #[error("script '{chunk}' threw an exception: {source}")]
  Evaluation {
    chunk: String,
    #[source]
    source: mlua::Error,
  },

  /// The script assigned something other than a table to `context`.
  #[error("script '{chunk}' replaced context with a {found}")]
  ContextReplaced { chunk: String, found: String },

  /// `context` held values with no JSON form (functions, userdata).
  #[error("script '{chunk}' left unconvertible values in context: {source}")]
  Conversion {
    chunk: String,
    #[source]
    source: mlua::Error,
  },
}
