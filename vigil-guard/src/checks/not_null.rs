//! Presence constraint.

use crate::core::{Constraint, Context, EntityRef, Value};
use crate::error::Result;
use crate::validator::Validator;

/// Rejects null values.
///
/// The only bundled constraint a null value fails; every other constraint
/// treats null as satisfied.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotNullConstraint;

impl NotNullConstraint {
    /// Creates the constraint.
    pub fn new() -> Self {
        Self
    }
}

impl Constraint for NotNullConstraint {
    fn name(&self) -> &str {
        "not_null"
    }

    fn satisfied(
        &self,
        _entity: Option<&EntityRef>,
        value: &Value,
        _context: &Context,
        _validator: &Validator,
    ) -> Result<bool> {
        Ok(!value.is_null())
    }

    fn default_message(&self) -> String {
        "{context} must not be null".to_string()
    }
}
