//! Engine trait.

use async_trait::async_trait;
use kiln_service::ModelService;
use serde_json::{Map, Value};

use crate::context::DispatchContext;
use crate::error::ServiceError;

/// Runs a service of one engine kind.
///
/// The dispatcher has already checked and coerced the IN parameters before
/// an engine sees them. Engines return outputs filtered through the service's
/// output contract.
#[async_trait]
pub trait GenericEngine: Send + Sync {
  /// Run the service and return its outputs.
  async fn run_sync(
    &self,
    dctx: &DispatchContext,
    service: &ModelService,
    context: Map<String, Value>,
  ) -> Result<Map<String, Value>, ServiceError>;

  /// Run the service and drop its outputs.
  async fn run_sync_ignore(
    &self,
    dctx: &DispatchContext,
    service: &ModelService,
    context: Map<String, Value>,
  ) -> Result<(), ServiceError> {
    self.run_sync(dctx, service, context).await.map(|_| ())
  }
}
