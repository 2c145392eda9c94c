//! Script engine.
//!
//! Resolves a service's location, loads the source through the shared
//! [`SourceCache`], evaluates it in a fresh Lua state on a blocking thread,
//! and filters the merged parameters through the output contract.

use std::sync::Arc;

use async_trait::async_trait;
use kiln_cache::{CacheError, SourceCache};
use kiln_resource::{FetchError, LocateError, ResourceFetcher, ResourceScope, UrlFetcher, locate};
use kiln_script_lua::{LuaExecutor, ScriptBinding};
use kiln_service::{ModelService, ParamMode};
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tracing::{debug, info, instrument};

use crate::config::EngineConfig;
use crate::context::DispatchContext;
use crate::engine::GenericEngine;
use crate::error::{ScriptLoadError, ServiceError};

/// Name of the cache holding script sources.
pub const SCRIPT_CACHE_NAME: &str = "lua-scripts";

/// Why a cache miss failed to produce source text.
#[derive(Debug, thiserror::Error)]
enum LoadFailure {
  #[error(transparent)]
  NotFound(LocateError),
  #[error(transparent)]
  Fetch(FetchError),
}

/// Engine for services implemented as Lua scripts.
pub struct ScriptEngine {
  cache: SourceCache,
  fetcher: Arc<dyn ResourceFetcher>,
  executor: LuaExecutor,
}

impl ScriptEngine {
  /// Create an engine fetching scripts over file and HTTP URLs.
  pub fn new(config: &EngineConfig) -> Result<Self, ServiceError> {
    let fetcher = UrlFetcher::new(config.fetch_timeout).map_err(|e| ServiceError::Setup {
      message: format!("failed to build resource fetcher: {}", e),
    })?;
    Ok(Self::with_fetcher(config, Arc::new(fetcher)))
  }

  /// Create an engine with a custom fetcher.
  pub fn with_fetcher(config: &EngineConfig, fetcher: Arc<dyn ResourceFetcher>) -> Self {
    Self {
      cache: SourceCache::new(SCRIPT_CACHE_NAME, config.cache),
      fetcher,
      executor: LuaExecutor::new(config.lua),
    }
  }

  /// The script source cache.
  pub fn cache(&self) -> &SourceCache {
    &self.cache
  }

  /// Cache key for a location seen through a local context.
  pub fn cache_key(local_name: &str, location: &str) -> String {
    format!("{}_{}", local_name, location)
  }

  async fn load_source(&self, service: &str, location: &str, scope: &ResourceScope, key: &str) -> Result<Arc<str>, ServiceError> {
    let fetcher = self.fetcher.clone();
    let loader = || async move {
      let url = locate(location, scope).await.map_err(LoadFailure::NotFound)?;
      debug!(location, url = %url, "fetching script");
      fetcher.fetch(&url).await.map_err(LoadFailure::Fetch)
    };

    self.cache.get_or_load(key, loader).await.map_err(|e| match e {
      CacheError::Load {
        source: LoadFailure::NotFound(source),
        ..
      } => ServiceError::ResourceNotFound {
        service: service.to_string(),
        location: location.to_string(),
        source,
      },
      CacheError::Load {
        source: LoadFailure::Fetch(source),
        ..
      } => ServiceError::ScriptLoad {
        service: service.to_string(),
        location: location.to_string(),
        source: ScriptLoadError::Fetch(source),
      },
      CacheError::TooShort { len, min, .. } => ServiceError::ScriptLoad {
        service: service.to_string(),
        location: location.to_string(),
        source: ScriptLoadError::TooShort { len, min },
      },
    })
  }
}

#[async_trait]
impl GenericEngine for ScriptEngine {
  #[instrument(
    name = "script_engine_run",
    skip(self, dctx, service, context),
    fields(
      local_name = %dctx.name(),
      service = %service.name,
    )
  )]
  async fn run_sync(
    &self,
    dctx: &DispatchContext,
    service: &ModelService,
    context: Map<String, Value>,
  ) -> Result<Map<String, Value>, ServiceError> {
    let location = match (service.location.as_deref(), service.invoke.as_deref()) {
      (Some(location), Some(_)) => location,
      _ => {
        return Err(ServiceError::NotInvocable {
          service: service.name.clone(),
        });
      }
    };
    let location = dctx.dispatcher().resolve_location(location);
    let key = Self::cache_key(dctx.name(), &location);

    let source = self
      .load_source(&service.name, &location, dctx.scope(), &key)
      .await?;

    let executor = self.executor.clone();
    let binding = ScriptBinding {
      dispatch: Arc::new(dctx.clone().into_handle(Handle::current())),
      parameters: context,
    };
    let chunk = location.clone();

    let outcome = tokio::task::spawn_blocking(move || executor.execute(&source, &chunk, binding))
      .await
      .map_err(|e| ServiceError::Join {
        service: service.name.clone(),
        message: e.to_string(),
      })?
      .map_err(|source| ServiceError::ScriptEvaluation {
        service: service.name.clone(),
        source,
      })?;

    let outputs = service
      .make_valid(&outcome.merged(), ParamMode::Out)
      .map_err(|source| ServiceError::SchemaViolation {
        service: service.name.clone(),
        source,
      })?;

    info!(location = %location, outputs = outputs.len(), "script_completed");
    Ok(outputs)
  }
}
