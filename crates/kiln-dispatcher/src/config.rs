//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use kiln_cache::CacheConfig;
use kiln_script_lua::LuaConfig;

use crate::error::ConfigError;

/// Settings shared by the dispatcher and its script engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
  /// Source cache bounds. Unbounded with no TTL by default.
  pub cache: CacheConfig,
  /// Timeout for HTTP script fetches.
  pub fetch_timeout: Duration,
  /// Interpreter settings.
  pub lua: LuaConfig,
  /// Roots searched for relative locations when no named context applies.
  pub resource_roots: Vec<PathBuf>,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      cache: CacheConfig::default(),
      fetch_timeout: Duration::from_secs(30),
      lua: LuaConfig::default(),
      resource_roots: Vec::new(),
    }
  }
}

impl EngineConfig {
  /// Load configuration from environment variables with defaults.
  ///
  /// | Env Var                    | Default |
  /// |----------------------------|---------|
  /// | `KILN_CACHE_CAPACITY`      | `0` (unbounded) |
  /// | `KILN_CACHE_TTL_SECS`      | `0` (never expires) |
  /// | `KILN_FETCH_TIMEOUT_SECS`  | `30`    |
  /// | `KILN_SCRIPT_MEMORY_LIMIT` | `0` (unlimited) |
  /// | `KILN_RESOURCE_ROOTS`      | empty, `:`-separated |
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_lookup(|var| std::env::var(var).ok())
  }

  /// Load configuration through an arbitrary variable lookup.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
    let capacity = parse_var(&lookup, "KILN_CACHE_CAPACITY", 0usize)?;
    let ttl_secs = parse_var(&lookup, "KILN_CACHE_TTL_SECS", 0u64)?;
    let fetch_timeout_secs = parse_var(&lookup, "KILN_FETCH_TIMEOUT_SECS", 30u64)?;
    let memory_limit = parse_var(&lookup, "KILN_SCRIPT_MEMORY_LIMIT", 0usize)?;

    let resource_roots = lookup("KILN_RESOURCE_ROOTS")
      .map(|roots| {
        roots
          .split(':')
          .map(str::trim)
          .filter(|r| !r.is_empty())
          .map(PathBuf::from)
          .collect()
      })
      .unwrap_or_default();

    Ok(Self {
      cache: CacheConfig {
        capacity,
        ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
      },
      fetch_timeout: Duration::from_secs(fetch_timeout_secs),
      lua: LuaConfig {
        memory_limit: (memory_limit > 0).then_some(memory_limit),
      },
      resource_roots,
    })
  }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, var: &str, default: T) -> Result<T, ConfigError>
where
  T: std::str::FromStr,
  T::Err: std::fmt::Display,
{
  match lookup(var) {
    None => Ok(default),
    Some(value) if value.trim().is_empty() => Ok(default),
    Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
      var: var.to_string(),
      value: value.clone(),
      message: e.to_string(),
    }),
  }
}
