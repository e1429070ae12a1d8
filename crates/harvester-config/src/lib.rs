//! # Harvester Config
//!
//! Configuration for the invoice harvester: server address, on-disk
//! layout, browser launch policy, job limits and per-vendor overrides.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
