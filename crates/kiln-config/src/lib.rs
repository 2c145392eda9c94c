//! Kiln Config
//!
//! This crate contains the serializable service definition types for kiln.
//! These types describe services before they are resolved into service models
//! by `kiln-service` and registered with a dispatcher.
//!
//! Definitions are loaded from a JSON services file:
//!
//! ```json
//! {
//!   "locations": { "shared": "https://scripts.example.com/shared.lua" },
//!   "contexts": [{ "name": "orders", "roots": ["./scripts/orders"] }],
//!   "services": [
//!     {
//!       "name": "calculateTotal",
//!       "engine": "lua",
//!       "location": "total.lua",
//!       "invoke": "main",
//!       "parameters": [
//!         { "name": "amount", "mode": "in", "type": "number" },
//!         { "name": "total", "mode": "out", "type": "number" }
//!       ]
//!     }
//!   ]
//! }
//! ```

mod enums;
mod service;
mod services;

pub use enums::{ParamMode, ParamType};
pub use service::{ParamDef, ServiceDef};
pub use services::{ContextDef, ServicesDef};
