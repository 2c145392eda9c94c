//! Local dispatch contexts.

use kiln_resource::ResourceScope;
use kiln_script_lua::{DispatchError, DispatchHandle};
use serde_json::{Map, Value};
use tokio::runtime::Handle;

use crate::dispatcher::ServiceDispatcher;
use crate::error::ServiceError;

/// A named view of the dispatcher with its own resource scope.
///
/// Script cache keys are prefixed with the context name, so the same
/// location seen through two contexts is loaded separately.
#[derive(Debug, Clone)]
pub struct DispatchContext {
  name: String,
  scope: ResourceScope,
  dispatcher: ServiceDispatcher,
}

impl DispatchContext {
  pub(crate) fn new(name: impl Into<String>, scope: ResourceScope, dispatcher: ServiceDispatcher) -> Self {
    Self {
      name: name.into(),
      scope,
      dispatcher,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Roots searched for relative script locations.
  pub fn scope(&self) -> &ResourceScope {
    &self.scope
  }

  pub fn dispatcher(&self) -> &ServiceDispatcher {
    &self.dispatcher
  }

  /// Run a service under this context.
  pub async fn run_sync(&self, service: &str, context: Map<String, Value>) -> Result<Map<String, Value>, ServiceError> {
    self.dispatcher.run_sync(&self.name, service, context).await
  }

  /// Wrap this context as the `dctx` handle for a script running on a
  /// blocking thread of `runtime`.
  pub(crate) fn into_handle(self, runtime: Handle) -> BlockingDispatch {
    BlockingDispatch { dctx: self, runtime }
  }
}

/// Bridges synchronous script calls back onto the async dispatcher.
pub(crate) struct BlockingDispatch {
  dctx: DispatchContext,
  runtime: Handle,
}

impl DispatchHandle for BlockingDispatch {
  fn name(&self) -> &str {
    self.dctx.name()
  }

  fn run_sync(&self, service: &str, parameters: Map<String, Value>) -> Result<Map<String, Value>, DispatchError> {
    self
      .runtime
      .block_on(self.dctx.run_sync(service, parameters))
      .map_err(Into::into)
  }
}
