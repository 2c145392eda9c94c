//! Integration tests for ServiceDispatcher and ScriptEngine.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use kiln_dispatcher::{EngineConfig, ScriptEngine, ScriptLoadError, ServiceDispatcher, ServiceError};
use kiln_resource::{FetchError, ResourceFetcher, UrlFetcher, Url};
use kiln_service::ContractError;
use serde_json::{Map, Value, json};
use tempfile::TempDir;

/// Fetcher that counts how often it is asked for a resource.
struct CountingFetcher {
  inner: UrlFetcher,
  fetches: AtomicUsize,
}

impl CountingFetcher {
  fn new() -> Self {
    Self {
      inner: UrlFetcher::new(Duration::from_secs(5)).unwrap(),
      fetches: AtomicUsize::new(0),
    }
  }

  fn count(&self) -> usize {
    self.fetches.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl ResourceFetcher for CountingFetcher {
  async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
    self.fetches.fetch_add(1, Ordering::SeqCst);
    self.inner.fetch(url).await
  }
}

struct Harness {
  dir: TempDir,
  dispatcher: ServiceDispatcher,
  engine: Arc<ScriptEngine>,
  fetcher: Arc<CountingFetcher>,
}

fn write_scripts(dir: &Path, scripts: &[(&str, &str)]) {
  for (name, body) in scripts {
    std::fs::write(dir.join(name), body).unwrap();
  }
}

fn harness(scripts: &[(&str, &str)], services: Value) -> Harness {
  let dir = tempfile::tempdir().unwrap();
  write_scripts(dir.path(), scripts);

  let config = EngineConfig {
    resource_roots: vec![dir.path().to_path_buf()],
    ..Default::default()
  };
  let fetcher = Arc::new(CountingFetcher::new());
  let engine = Arc::new(ScriptEngine::with_fetcher(&config, fetcher.clone()));

  let dispatcher = ServiceDispatcher::without_engines(&config.resource_roots);
  dispatcher.register_engine("lua", engine.clone());
  dispatcher
    .load(serde_json::from_value(services).unwrap())
    .unwrap();

  Harness {
    dir,
    dispatcher,
    engine,
    fetcher,
  }
}

fn params(value: Value) -> Map<String, Value> {
  value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn test_outputs_filtered_by_contract() {
  let h = harness(
    &[("filter.lua", "context.scratch = 5\nresult = { a = 1 }")],
    json!({
      "services": [{
        "name": "filter",
        "location": "filter.lua",
        "invoke": "main",
        "parameters": [{ "name": "a", "mode": "out", "type": "integer" }]
      }]
    }),
  );

  let outputs = h.dispatcher.run_sync("default", "filter", Map::new()).await.unwrap();
  assert_eq!(Value::Object(outputs), json!({ "a": 1 }));
}

#[tokio::test]
async fn test_inout_and_reserved_outputs_pass_through() {
  let h = harness(
    &[("notes.lua", "result = { error_message = 'late', ignored = true }")],
    json!({
      "services": [{
        "name": "notes",
        "location": "notes.lua",
        "invoke": "main",
        "parameters": [{ "name": "note", "mode": "inout", "type": "string" }]
      }]
    }),
  );

  let outputs = h
    .dispatcher
    .run_sync("default", "notes", params(json!({ "note": 7, "extra": 1 })))
    .await
    .unwrap();
  assert_eq!(
    Value::Object(outputs),
    json!({ "note": "7", "error_message": "late" })
  );
}

#[tokio::test]
async fn test_evaluation_error_keeps_source_cached() {
  let h = harness(
    &[("boom.lua", "error('boom')")],
    json!({ "services": [{ "name": "boom", "location": "boom.lua", "invoke": "main" }] }),
  );

  let first = h.dispatcher.run_sync("default", "boom", Map::new()).await;
  assert_matches!(first, Err(ServiceError::ScriptEvaluation { .. }));
  assert!(h.engine.cache().contains(&ScriptEngine::cache_key("default", "boom.lua")));

  let second = h.dispatcher.run_sync("default", "boom", Map::new()).await;
  assert_matches!(second, Err(ServiceError::ScriptEvaluation { .. }));
  assert_eq!(h.fetcher.count(), 1);
}

#[tokio::test]
async fn test_missing_resource_is_not_cached() {
  let h = harness(
    &[],
    json!({ "services": [{ "name": "ghost", "location": "nope.lua", "invoke": "main" }] }),
  );

  let result = h.dispatcher.run_sync("default", "ghost", Map::new()).await;
  assert_matches!(result, Err(ServiceError::ResourceNotFound { location, .. }) if location == "nope.lua");
  assert!(h.engine.cache().is_empty());
  assert_eq!(h.fetcher.count(), 0);
}

#[tokio::test]
async fn test_empty_script_is_not_cached() {
  let h = harness(
    &[("empty.lua", "")],
    json!({ "services": [{ "name": "empty", "location": "empty.lua", "invoke": "main" }] }),
  );

  for _ in 0..2 {
    let result = h.dispatcher.run_sync("default", "empty", Map::new()).await;
    assert_matches!(
      result,
      Err(ServiceError::ScriptLoad {
        source: ScriptLoadError::TooShort { len: 0, .. },
        ..
      })
    );
  }
  assert!(h.engine.cache().is_empty());
  assert_eq!(h.fetcher.count(), 2);
}

#[tokio::test]
async fn test_invocations_are_isolated() {
  let h = harness(
    &[(
      "count.lua",
      "leaked = (leaked or 0) + 1\ncontext.count = (context.count or 0) + 1\ncontext.leaked = leaked",
    )],
    json!({
      "services": [{
        "name": "count",
        "location": "count.lua",
        "invoke": "main",
        "parameters": [
          { "name": "count", "mode": "out", "type": "integer" },
          { "name": "leaked", "mode": "out", "type": "integer" }
        ]
      }]
    }),
  );

  for _ in 0..2 {
    let outputs = h.dispatcher.run_sync("default", "count", Map::new()).await.unwrap();
    assert_eq!(Value::Object(outputs), json!({ "count": 1, "leaked": 1 }));
  }
  assert_eq!(h.fetcher.count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_fetch_once() {
  let h = harness(
    &[("double.lua", "result = { doubled = context.n * 2 }")],
    json!({
      "services": [{
        "name": "double",
        "location": "double.lua",
        "invoke": "main",
        "parameters": [
          { "name": "n", "mode": "in", "type": "integer" },
          { "name": "doubled", "mode": "out", "type": "integer" }
        ]
      }]
    }),
  );

  let handles: Vec<_> = (0..16)
    .map(|n| h.dispatcher.run_async("default", "double", params(json!({ "n": n }))))
    .collect();

  for (n, outputs) in futures::future::join_all(handles).await.into_iter().enumerate() {
    let outputs = outputs.unwrap().unwrap();
    assert_eq!(outputs["doubled"], json!(n * 2));
  }
  assert_eq!(h.fetcher.count(), 1);
  assert_eq!(h.engine.cache().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_nested_dispatch() {
  let h = harness(
    &[
      ("inner.lua", "result = { y = context.x * 10 }"),
      (
        "outer.lua",
        "local r = dctx.run_sync('inner', { x = context.x + 1 })\nresult = { total = r.y, via = dctx.name }",
      ),
    ],
    json!({
      "services": [
        {
          "name": "inner",
          "location": "inner.lua",
          "invoke": "main",
          "parameters": [
            { "name": "x", "mode": "in", "type": "integer" },
            { "name": "y", "mode": "out", "type": "integer" }
          ]
        },
        {
          "name": "outer",
          "location": "outer.lua",
          "invoke": "main",
          "parameters": [
            { "name": "x", "mode": "in", "type": "integer" },
            { "name": "total", "mode": "out", "type": "integer" },
            { "name": "via", "mode": "out", "type": "string" }
          ]
        }
      ]
    }),
  );

  let outputs = h
    .dispatcher
    .run_sync("default", "outer", params(json!({ "x": 1 })))
    .await
    .unwrap();
  assert_eq!(Value::Object(outputs), json!({ "total": 20, "via": "default" }));
  assert_eq!(h.fetcher.count(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_nested_failure_surfaces_as_evaluation_error() {
  let h = harness(
    &[("caller.lua", "dctx.run_sync('missing', {})")],
    json!({ "services": [{ "name": "caller", "location": "caller.lua", "invoke": "main" }] }),
  );

  let result = h.dispatcher.run_sync("default", "caller", Map::new()).await;
  match result {
    Err(ServiceError::ScriptEvaluation { source, .. }) => {
      assert!(source.to_string().contains("service 'missing' not found"));
    }
    other => panic!("expected evaluation error, got {:?}", other),
  }
}

#[tokio::test]
async fn test_location_alias() {
  let h = harness(
    &[("price.lua", "result = { price = 9.5 }")],
    json!({
      "locations": { "pricing": "price.lua" },
      "services": [{
        "name": "price",
        "location": "pricing",
        "invoke": "main",
        "parameters": [{ "name": "price", "mode": "out", "type": "number" }]
      }]
    }),
  );

  let outputs = h.dispatcher.run_sync("default", "price", Map::new()).await.unwrap();
  assert_eq!(Value::Object(outputs), json!({ "price": 9.5 }));
  assert!(h.engine.cache().contains(&ScriptEngine::cache_key("default", "price.lua")));
}

#[tokio::test]
async fn test_local_contexts_load_separately() {
  let h = harness(
    &[],
    json!({
      "services": [{
        "name": "greet",
        "location": "greet.lua",
        "invoke": "main",
        "parameters": [{ "name": "who", "mode": "out", "type": "string" }]
      }]
    }),
  );

  for tenant in ["a", "b"] {
    let root = h.dir.path().join(tenant);
    std::fs::create_dir(&root).unwrap();
    let body = format!("result = {{ who = '{}' }}", tenant);
    write_scripts(&root, &[("greet.lua", body.as_str())]);
    h.dispatcher.register_context(tenant, [root]);
  }

  for tenant in ["a", "b"] {
    let outputs = h
      .dispatcher
      .get_local_context(tenant)
      .unwrap()
      .run_sync("greet", Map::new())
      .await
      .unwrap();
    assert_eq!(outputs["who"], tenant);
    assert!(h.engine.cache().contains(&ScriptEngine::cache_key(tenant, "greet.lua")));
  }
  assert_eq!(h.fetcher.count(), 2);
}

#[tokio::test]
async fn test_missing_required_input() {
  let h = harness(
    &[("total.lua", "result = { total = context.amount }")],
    json!({
      "services": [{
        "name": "total",
        "location": "total.lua",
        "invoke": "main",
        "parameters": [
          { "name": "amount", "mode": "in", "type": "number" },
          { "name": "total", "mode": "out", "type": "number" }
        ]
      }]
    }),
  );

  let result = h.dispatcher.run_sync("default", "total", Map::new()).await;
  assert_matches!(
    result,
    Err(ServiceError::InvalidInput {
      source: ContractError::MissingRequired { .. },
      ..
    })
  );
  assert_eq!(h.fetcher.count(), 0);
}

#[tokio::test]
async fn test_schema_violation() {
  let h = harness(
    &[("lazy.lua", "context.unrelated = 1")],
    json!({
      "services": [{
        "name": "lazy",
        "location": "lazy.lua",
        "invoke": "main",
        "parameters": [{ "name": "total", "mode": "out", "type": "number" }]
      }]
    }),
  );

  let result = h.dispatcher.run_sync("default", "lazy", Map::new()).await;
  assert_matches!(
    result,
    Err(ServiceError::SchemaViolation {
      source: ContractError::MissingRequired { param, .. },
      ..
    }) if param == "total"
  );
}

#[tokio::test]
async fn test_lookup_failures() {
  let h = harness(
    &[("py.lua", "result = {}")],
    json!({
      "services": [
        { "name": "python", "engine": "python", "location": "py.lua", "invoke": "main" },
        { "name": "nowhere" },
        { "name": "no_entry", "location": "py.lua" }
      ]
    }),
  );

  assert_matches!(
    h.dispatcher.run_sync("default", "absent", Map::new()).await,
    Err(ServiceError::ServiceNotFound { service }) if service == "absent"
  );
  assert_matches!(
    h.dispatcher.run_sync("default", "python", Map::new()).await,
    Err(ServiceError::UnknownEngine { engine, .. }) if engine == "python"
  );
  assert_matches!(
    h.dispatcher.run_sync("default", "nowhere", Map::new()).await,
    Err(ServiceError::NotInvocable { .. })
  );
  assert_matches!(
    h.dispatcher.run_sync("default", "no_entry", Map::new()).await,
    Err(ServiceError::NotInvocable { service }) if service == "no_entry"
  );
  assert_eq!(h.fetcher.count(), 0);
}

#[tokio::test]
async fn test_run_sync_ignore_and_run_async() {
  let h = harness(
    &[("echo.lua", "result = { echoed = context.msg }")],
    json!({
      "services": [{
        "name": "echo",
        "location": "echo.lua",
        "invoke": "main",
        "parameters": [
          { "name": "msg", "mode": "in", "type": "string" },
          { "name": "echoed", "mode": "out", "type": "string" }
        ]
      }]
    }),
  );

  h.dispatcher
    .run_sync_ignore("default", "echo", params(json!({ "msg": "hi" })))
    .await
    .unwrap();

  let outputs = h
    .dispatcher
    .run_async("default", "echo", params(json!({ "msg": "later" })))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(Value::Object(outputs), json!({ "echoed": "later" }));

  let failed = h.dispatcher.run_sync_ignore("default", "echo", Map::new()).await;
  assert_matches!(failed, Err(ServiceError::InvalidInput { .. }));
}
