//! Formula-backed constraint.

use std::collections::BTreeMap;

use crate::core::{Constraint, Context, EntityRef, Formula, Value};
use crate::error::Result;
use crate::expr::Bindings;
use crate::validator::Validator;

/// Checks a value with a condition formula.
///
/// The formula sees the value under `_value` and the owning entity under
/// `_this` (the type name for static members). It must produce a boolean;
/// anything else fails the evaluation rather than the check.
///
/// # Examples
///
/// ```rust
/// use vigil_guard::checks::AssertConstraint;
///
/// // The account may only be emptied by its owner.
/// let constraint = AssertConstraint::new("vigil", "_value > 0 || _this.owner == \"ada\"");
/// ```
#[derive(Debug, Clone)]
pub struct AssertConstraint {
    formula: Formula,
}

impl AssertConstraint {
    /// Creates a constraint evaluating the given formula.
    pub fn new(language: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            formula: Formula::new(language, expression),
        }
    }

    /// Returns the formula.
    pub fn formula(&self) -> &Formula {
        &self.formula
    }
}

impl Constraint for AssertConstraint {
    fn name(&self) -> &str {
        "assert"
    }

    fn satisfied(
        &self,
        entity: Option<&EntityRef>,
        value: &Value,
        context: &Context,
        validator: &Validator,
    ) -> Result<bool> {
        let mut bindings = Bindings::new();
        let this = match entity {
            Some(entity) => Value::Entity(entity.clone()),
            None => Value::Str(context.type_name().to_string()),
        };
        bindings.insert("_this".to_string(), this);
        bindings.insert("_value".to_string(), value.clone());
        validator
            .evaluators()
            .evaluate_condition(&self.formula.language, &self.formula.expression, &bindings)
    }

    fn default_message(&self) -> String {
        "{context} does not satisfy '{expression}'".to_string()
    }

    fn message_variables(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        vars.insert(
            "expression".to_string(),
            self.formula.expression.clone(),
        );
        vars
    }
}
