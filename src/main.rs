use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kiln_config::ServicesDef;
use kiln_dispatcher::{DEFAULT_CONTEXT, EngineConfig, ServiceDispatcher};

/// Kiln - run cached script services
#[derive(Parser)]
#[command(name = "kiln")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.kiln)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a service with a JSON payload read from stdin
  Run {
    /// Path to the services file (JSON)
    services_file: PathBuf,

    /// The service to run
    #[arg(long)]
    service: String,

    /// Local context to run under
    #[arg(long, default_value = DEFAULT_CONTEXT)]
    local: String,
  },

  /// List the services in a services file
  Services {
    /// Path to the services file (JSON)
    services_file: PathBuf,
  },
}

fn main() -> Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kiln=info,kiln_dispatcher=info,warn".into()),
    )
    .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".kiln"),
  };

  match cli.command {
    Some(Commands::Run {
      services_file,
      service,
      local,
    }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_service(services_file, service, local, data_dir))?;
    }
    Some(Commands::Services { services_file }) => {
      list_services(services_file)?;
    }
    None => {
      println!("kiln - use --help to see available commands");
    }
  }

  Ok(())
}

async fn run_service(services_file: PathBuf, service: String, local: String, data_dir: PathBuf) -> Result<()> {
  let services = read_services(&services_file).await?;
  info!(
    services_file = %services_file.display(),
    services = services.services.len(),
    "services_loaded"
  );

  // Scripts resolve next to the services file first, then under the data dir
  let mut config = EngineConfig::from_env().context("invalid engine configuration")?;
  if let Some(parent) = services_file.parent().filter(|p| !p.as_os_str().is_empty()) {
    config.resource_roots.insert(0, parent.to_path_buf());
  }
  config.resource_roots.push(data_dir.join("scripts"));

  let dispatcher =
    ServiceDispatcher::from_services(services, &config).context("failed to create service dispatcher")?;

  let payload = read_payload_from_stdin()?;
  info!(payload = %serde_json::Value::Object(payload.clone()), "payload_read");

  let outputs = dispatcher
    .run_sync(&local, &service, payload)
    .await
    .with_context(|| format!("service '{}' failed", service))?;

  println!("{}", serde_json::to_string_pretty(&outputs)?);

  Ok(())
}

fn list_services(services_file: PathBuf) -> Result<()> {
  let content = std::fs::read_to_string(&services_file)
    .with_context(|| format!("failed to read services file: {}", services_file.display()))?;
  let services = ServicesDef::from_json(&content)
    .with_context(|| format!("failed to parse services file: {}", services_file.display()))?;

  for service in &services.services {
    let location = service.location.as_deref().unwrap_or("-");
    match &service.description {
      Some(description) => println!("{}\t{}\t{}\t{}", service.name, service.engine, location, description),
      None => println!("{}\t{}\t{}", service.name, service.engine, location),
    }
  }

  Ok(())
}

async fn read_services(services_file: &Path) -> Result<ServicesDef> {
  let content = tokio::fs::read_to_string(services_file)
    .await
    .with_context(|| format!("failed to read services file: {}", services_file.display()))?;

  ServicesDef::from_json(&content)
    .with_context(|| format!("failed to parse services file: {}", services_file.display()))
}

fn read_payload_from_stdin() -> Result<Map<String, Value>> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe, use empty object
    return Ok(Map::new());
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read payload from stdin")?;

  if input.trim().is_empty() {
    return Ok(Map::new());
  }

  match serde_json::from_str(&input).context("failed to parse payload JSON from stdin")? {
    Value::Object(map) => Ok(map),
    other => anyhow::bail!("payload must be a JSON object, got: {}", other),
  }
}
