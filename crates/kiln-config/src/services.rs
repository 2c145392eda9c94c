use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::service::ServiceDef;

/// Top-level contents of a services file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServicesDef {
  /// Location aliases. A service whose `location` matches a key is loaded
  /// from the mapped value instead.
  #[serde(default)]
  pub locations: HashMap<String, String>,

  /// Named dispatch contexts and their resource search roots.
  #[serde(default)]
  pub contexts: Vec<ContextDef>,

  #[serde(default)]
  pub services: Vec<ServiceDef>,
}

/// A named dispatch context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDef {
  pub name: String,
  /// Directories searched, in order, for relative script locations.
  #[serde(default)]
  pub roots: Vec<String>,
}

impl ServicesDef {
  /// Parse a services file from JSON text.
  pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(content)
  }
}
