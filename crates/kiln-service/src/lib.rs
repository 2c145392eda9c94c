//! Kiln Service
//!
//! Resolved service models. A [`ModelService`] is built from a
//! `kiln_config::ServiceDef` once, when it is registered, and owns the
//! [`OutputContract`] used to filter whatever an engine hands back.

mod contract;
mod error;
mod model;

pub use contract::{OutputContract, RESERVED_OUTPUTS, coerce_value};
pub use error::{ContractError, ModelError};
pub use kiln_config::{ParamDef, ParamMode, ParamType};
pub use model::ModelService;
