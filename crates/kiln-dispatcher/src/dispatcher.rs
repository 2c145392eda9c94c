//! Service dispatcher.
//!
//! The [`ServiceDispatcher`] owns service definitions, engines, named local
//! contexts and location aliases. A call looks up the service, validates its
//! IN parameters, and hands it to the engine named by the definition.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use kiln_config::{ServiceDef, ServicesDef};
use kiln_resource::ResourceScope;
use kiln_service::{ModelService, ParamMode};
use serde_json::{Map, Value};
use tracing::{error, info, instrument};

use crate::config::EngineConfig;
use crate::context::DispatchContext;
use crate::engine::GenericEngine;
use crate::error::ServiceError;
use crate::script::ScriptEngine;

/// Engine used when a service does not name one.
pub const DEFAULT_ENGINE: &str = "lua";

/// Local context used when a caller names none, or an unknown one.
pub const DEFAULT_CONTEXT: &str = "default";

/// Handle for a service call spawned with [`ServiceDispatcher::run_async`].
pub type ServiceHandle = tokio::task::JoinHandle<Result<Map<String, Value>, ServiceError>>;

#[derive(Default)]
struct Registry {
  services: HashMap<String, Arc<ModelService>>,
  engines: HashMap<String, Arc<dyn GenericEngine>>,
  contexts: HashMap<String, ResourceScope>,
  locations: HashMap<String, String>,
}

struct Inner {
  default_scope: ResourceScope,
  registry: RwLock<Registry>,
}

/// Dispatches service calls to engines. Cheap to clone.
#[derive(Clone)]
pub struct ServiceDispatcher {
  inner: Arc<Inner>,
}

impl ServiceDispatcher {
  /// Create a dispatcher with the Lua script engine registered.
  pub fn new(config: &EngineConfig) -> Result<Self, ServiceError> {
    let dispatcher = Self::without_engines(&config.resource_roots);
    dispatcher.register_engine(DEFAULT_ENGINE, Arc::new(ScriptEngine::new(config)?));
    Ok(dispatcher)
  }

  /// Create a dispatcher with no engines.
  pub fn without_engines(default_roots: &[PathBuf]) -> Self {
    Self {
      inner: Arc::new(Inner {
        default_scope: ResourceScope::new(default_roots.iter().cloned()),
        registry: RwLock::new(Registry::default()),
      }),
    }
  }

  /// Create a dispatcher from a services file.
  pub fn from_services(def: ServicesDef, config: &EngineConfig) -> Result<Self, ServiceError> {
    let dispatcher = Self::new(config)?;
    dispatcher.load(def)?;
    Ok(dispatcher)
  }

  /// Register everything a services file declares.
  pub fn load(&self, def: ServicesDef) -> Result<(), ServiceError> {
    for (alias, location) in def.locations {
      self.register_location(alias, location);
    }
    for context in def.contexts {
      self.register_context(context.name, context.roots);
    }
    for service in def.services {
      self.register_service(service)?;
    }
    Ok(())
  }

  /// Register a service, replacing any of the same name.
  pub fn register_service(&self, def: ServiceDef) -> Result<(), ServiceError> {
    let service = ModelService::from_def(def)?;
    self
      .write()
      .services
      .insert(service.name.clone(), Arc::new(service));
    Ok(())
  }

  pub fn register_engine(&self, name: impl Into<String>, engine: Arc<dyn GenericEngine>) {
    self.write().engines.insert(name.into(), engine);
  }

  /// Register a named local context. Its roots are searched before the
  /// default roots.
  pub fn register_context(&self, name: impl Into<String>, roots: impl IntoIterator<Item = impl Into<PathBuf>>) {
    let scope = ResourceScope::new(roots).chain(&self.inner.default_scope);
    self.write().contexts.insert(name.into(), scope);
  }

  /// Map a location alias to a real location.
  pub fn register_location(&self, alias: impl Into<String>, location: impl Into<String>) {
    self.write().locations.insert(alias.into(), location.into());
  }

  pub fn service(&self, name: &str) -> Option<Arc<ModelService>> {
    self.read().services.get(name).cloned()
  }

  /// Registered service names, sorted.
  pub fn service_names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.read().services.keys().cloned().collect();
    names.sort();
    names
  }

  /// Resolve a location through the alias table. Unknown names pass through.
  pub fn resolve_location(&self, location: &str) -> String {
    self
      .read()
      .locations
      .get(location)
      .cloned()
      .unwrap_or_else(|| location.to_string())
  }

  /// Get a registered local context by name.
  pub fn get_local_context(&self, name: &str) -> Option<DispatchContext> {
    let scope = self.read().contexts.get(name).cloned()?;
    Some(DispatchContext::new(name, scope, self.clone()))
  }

  /// Get a local context, falling back to the default scope under the given
  /// name when none is registered.
  pub fn local_context(&self, name: &str) -> DispatchContext {
    self
      .get_local_context(name)
      .unwrap_or_else(|| DispatchContext::new(name, self.inner.default_scope.clone(), self.clone()))
  }

  /// Run a service and return its outputs.
  #[instrument(
    name = "dispatcher_run_sync",
    skip(self, context),
    fields(
      local_name = %local_name,
      service = %service_name,
    )
  )]
  pub async fn run_sync(
    &self,
    local_name: &str,
    service_name: &str,
    context: Map<String, Value>,
  ) -> Result<Map<String, Value>, ServiceError> {
    let invocation_id = uuid::Uuid::new_v4().to_string();

    info!(
      invocation_id = %invocation_id,
      service = %service_name,
      "service_started"
    );

    let result = self.invoke(local_name, service_name, context).await;

    match &result {
      Ok(outputs) => {
        info!(
          invocation_id = %invocation_id,
          outputs = outputs.len(),
          "service_completed"
        );
      }
      Err(e) => {
        error!(invocation_id = %invocation_id, error = %e, "service_failed");
      }
    }

    result
  }

  /// Run a service and drop its outputs.
  pub async fn run_sync_ignore(
    &self,
    local_name: &str,
    service_name: &str,
    context: Map<String, Value>,
  ) -> Result<(), ServiceError> {
    self
      .run_sync(local_name, service_name, context)
      .await
      .map(|_| ())
  }

  /// Run a service on a spawned task.
  pub fn run_async(&self, local_name: &str, service_name: &str, context: Map<String, Value>) -> ServiceHandle {
    let dispatcher = self.clone();
    let local_name = local_name.to_string();
    let service_name = service_name.to_string();
    tokio::spawn(async move {
      dispatcher
        .run_sync(&local_name, &service_name, context)
        .await
    })
  }

  async fn invoke(
    &self,
    local_name: &str,
    service_name: &str,
    context: Map<String, Value>,
  ) -> Result<Map<String, Value>, ServiceError> {
    let service = self
      .service(service_name)
      .ok_or_else(|| ServiceError::ServiceNotFound {
        service: service_name.to_string(),
      })?;

    let engine = self
      .read()
      .engines
      .get(&service.engine)
      .cloned()
      .ok_or_else(|| ServiceError::UnknownEngine {
        service: service.name.clone(),
        engine: service.engine.clone(),
      })?;

    service
      .validate_inputs(&context)
      .map_err(|source| ServiceError::InvalidInput {
        service: service.name.clone(),
        source,
      })?;
    let inputs = service
      .make_valid(&context, ParamMode::In)
      .map_err(|source| ServiceError::InvalidInput {
        service: service.name.clone(),
        source,
      })?;

    let dctx = self.local_context(local_name);
    engine.run_sync(&dctx, &service, inputs).await
  }

  fn read(&self) -> RwLockReadGuard<'_, Registry> {
    self
      .inner
      .registry
      .read()
      .unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, Registry> {
    self
      .inner
      .registry
      .write()
      .unwrap_or_else(PoisonError::into_inner)
  }
}

impl std::fmt::Debug for ServiceDispatcher {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let registry = self.read();
    let mut engines: Vec<&String> = registry.engines.keys().collect();
    engines.sort();
    f.debug_struct("ServiceDispatcher")
      .field("services", &registry.services.len())
      .field("engines", &engines)
      .field("contexts", &registry.contexts.len())
      .finish()
  }
}
