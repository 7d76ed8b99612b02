//! Prelude for commonly used types and traits in vigil-guard.

pub use crate::config::{ConfigurationBuilder, ConfigurationSource, TypeConfig};
pub use crate::core::{
    Check, Constraint, ConstraintViolation, Context, EntityRef, Severity, Validatable, Value,
};
pub use crate::error::{Result, VigilError};
pub use crate::guard::{Guard, ViolationListener};
pub use crate::logging::LoggingConfig;
pub use crate::validator::Validator;
