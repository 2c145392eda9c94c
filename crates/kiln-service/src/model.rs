//! Resolved service model.

use std::collections::HashSet;

use kiln_config::{ParamDef, ParamMode, ServiceDef};
use serde_json::{Map, Value};

use crate::contract::{OutputContract, RESERVED_OUTPUTS, coerce_value};
use crate::error::{ContractError, ModelError};

/// A service definition resolved for dispatch.
#[derive(Debug, Clone)]
pub struct ModelService {
  pub name: String,
  pub engine: String,
  pub location: Option<String>,
  pub invoke: Option<String>,
  pub description: Option<String>,
  params: Vec<ParamDef>,
  contract: OutputContract,
}

impl ModelService {
  /// Resolve a service definition.
  ///
  /// # Errors
  /// Returns an error if the name is empty, a parameter is declared twice, or
  /// a parameter shadows a reserved output key.
  pub fn from_def(def: ServiceDef) -> Result<Self, ModelError> {
    if def.name.trim().is_empty() {
      return Err(ModelError::EmptyName);
    }

    let mut seen = HashSet::new();
    for param in &def.parameters {
      if RESERVED_OUTPUTS.contains(&param.name.as_str()) {
        return Err(ModelError::ReservedParam {
          service: def.name.clone(),
          param: param.name.clone(),
        });
      }
      if !seen.insert(param.name.as_str()) {
        return Err(ModelError::DuplicateParam {
          service: def.name.clone(),
          param: param.name.clone(),
        });
      }
    }

    let contract = OutputContract::new(&def.name, &def.parameters);

    Ok(Self {
      name: def.name,
      engine: def.engine,
      location: def.location.filter(|l| !l.trim().is_empty()),
      invoke: def.invoke.filter(|i| !i.trim().is_empty()),
      description: def.description,
      params: def.parameters,
      contract,
    })
  }

  /// All declared parameters.
  pub fn params(&self) -> &[ParamDef] {
    &self.params
  }

  /// Look up a declared parameter.
  pub fn param(&self, name: &str) -> Option<&ParamDef> {
    self.params.iter().find(|p| p.name == name)
  }

  /// The declared output contract.
  pub fn contract(&self) -> &OutputContract {
    &self.contract
  }

  /// Check that every required input is present and non-null.
  pub fn validate_inputs(&self, context: &Map<String, Value>) -> Result<(), ContractError> {
    for param in self.params.iter().filter(|p| p.mode.is_in() && !p.optional) {
      if matches!(context.get(&param.name), None | Some(Value::Null)) {
        return Err(ContractError::MissingRequired {
          service: self.name.clone(),
          param: param.name.clone(),
        });
      }
    }
    Ok(())
  }

  /// Make a context valid for one direction of the service.
  ///
  /// `In` keeps the declared IN / INOUT entries that are present, coerced to
  /// their declared types. `Out` applies the output contract.
  pub fn make_valid(&self, context: &Map<String, Value>, mode: ParamMode) -> Result<Map<String, Value>, ContractError> {
    match mode {
      ParamMode::Out => self.contract.filter_outputs(context),
      ParamMode::In | ParamMode::InOut => {
        let mut valid = Map::new();
        for param in self.params.iter().filter(|p| p.mode.is_in()) {
          if let Some(value) = context.get(&param.name) {
            let typed = match value {
              Value::Null => Value::Null,
              v => coerce_value(&self.name, param, v)?,
            };
            valid.insert(param.name.clone(), typed);
          }
        }
        Ok(valid)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use assert_matches::assert_matches;
  use kiln_config::ParamType;
  use serde_json::json;

  use super::*;

  fn def(params: Value) -> ServiceDef {
    serde_json::from_value(json!({
      "name": "calculateTotal",
      "location": "total.lua",
      "invoke": "main",
      "parameters": params,
    }))
    .unwrap()
  }

  #[test]
  fn test_from_def() {
    let model = ModelService::from_def(def(json!([
      { "name": "amount", "mode": "in", "type": "number" },
      { "name": "total", "mode": "out", "type": "number" }
    ])))
    .unwrap();

    assert_eq!(model.engine, "lua");
    assert_eq!(model.location.as_deref(), Some("total.lua"));
    assert_eq!(model.invoke.as_deref(), Some("main"));
    assert_eq!(model.param("amount").unwrap().param_type, ParamType::Number);
    assert_eq!(model.contract().outputs().len(), 1);
  }

  #[test]
  fn test_blank_location_and_invoke_are_none() {
    let mut service = def(json!([]));
    service.location = Some("  ".to_string());
    service.invoke = Some(String::new());
    let model = ModelService::from_def(service).unwrap();
    assert!(model.location.is_none());
    assert!(model.invoke.is_none());
  }

  #[test]
  fn test_duplicate_param_rejected() {
    let result = ModelService::from_def(def(json!([
      { "name": "amount", "mode": "in" },
      { "name": "amount", "mode": "out" }
    ])));
    assert_matches!(result, Err(ModelError::DuplicateParam { param, .. }) if param == "amount");
  }

  #[test]
  fn test_reserved_param_rejected() {
    let result = ModelService::from_def(def(json!([{ "name": "error_message", "mode": "out" }])));
    assert_matches!(result, Err(ModelError::ReservedParam { .. }));
  }

  #[test]
  fn test_empty_name_rejected() {
    let mut service = def(json!([]));
    service.name = String::new();
    assert_matches!(ModelService::from_def(service), Err(ModelError::EmptyName));
  }

  #[test]
  fn test_validate_inputs() {
    let model = ModelService::from_def(def(json!([
      { "name": "amount", "mode": "in", "type": "number" },
      { "name": "note", "mode": "in", "optional": true }
    ])))
    .unwrap();

    let ok = json!({ "amount": 3 });
    assert!(model.validate_inputs(ok.as_object().unwrap()).is_ok());

    let missing = json!({ "note": "x" });
    assert_matches!(
      model.validate_inputs(missing.as_object().unwrap()),
      Err(ContractError::MissingRequired { param, .. }) if param == "amount"
    );
  }

  #[test]
  fn test_make_valid_in_filters_and_coerces() {
    let model = ModelService::from_def(def(json!([
      { "name": "amount", "mode": "in", "type": "integer" },
      { "name": "total", "mode": "out", "type": "number" }
    ])))
    .unwrap();

    let context = json!({ "amount": "12", "total": 1, "stray": true });
    let valid = model.make_valid(context.as_object().unwrap(), ParamMode::In).unwrap();

    assert_eq!(Value::Object(valid), json!({ "amount": 12 }));
  }
}
