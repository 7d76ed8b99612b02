//! Numeric range constraint.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{Constraint, Context, EntityRef, Value};
use crate::error::Result;
use crate::validator::Validator;

/// Types of range assertions that can be made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RangeAssertion {
    /// Value must be at least this
    Min(f64),
    /// Value must be at most this
    Max(f64),
    /// Value must be between min and max (inclusive)
    Between(f64, f64),
}

impl RangeAssertion {
    fn holds(&self, value: f64) -> bool {
        match self {
            RangeAssertion::Min(min) => value >= *min,
            RangeAssertion::Max(max) => value <= *max,
            RangeAssertion::Between(min, max) => value >= *min && value <= *max,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            RangeAssertion::Min(_) => "min",
            RangeAssertion::Max(_) => "max",
            RangeAssertion::Between(_, _) => "range",
        }
    }

    fn description(&self) -> String {
        match self {
            RangeAssertion::Min(min) => format!("at least {min}"),
            RangeAssertion::Max(max) => format!("at most {max}"),
            RangeAssertion::Between(min, max) => format!("between {min} and {max}"),
        }
    }

    fn variables(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        match self {
            RangeAssertion::Min(min) => {
                vars.insert("min".to_string(), min.to_string());
            }
            RangeAssertion::Max(max) => {
                vars.insert("max".to_string(), max.to_string());
            }
            RangeAssertion::Between(min, max) => {
                vars.insert("min".to_string(), min.to_string());
                vars.insert("max".to_string(), max.to_string());
            }
        }
        vars
    }
}

impl fmt::Display for RangeAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Checks a numeric value against bounds.
///
/// Integers and floats are both accepted. Null values satisfy the
/// constraint; non-numeric values do not.
///
/// # Examples
///
/// ```rust
/// use vigil_guard::checks::RangeConstraint;
///
/// let non_negative = RangeConstraint::min(0.0);
/// let percentage = RangeConstraint::between(0.0, 100.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeConstraint {
    /// The range assertion to evaluate
    assertion: RangeAssertion,
}

impl RangeConstraint {
    /// Creates a range constraint with the given assertion.
    pub fn new(assertion: RangeAssertion) -> Self {
        Self { assertion }
    }

    /// Creates a minimum value constraint.
    pub fn min(min: f64) -> Self {
        Self::new(RangeAssertion::Min(min))
    }

    /// Creates a maximum value constraint.
    pub fn max(max: f64) -> Self {
        Self::new(RangeAssertion::Max(max))
    }

    /// Creates a constraint that checks the value is between bounds
    /// (inclusive).
    pub fn between(min: f64, max: f64) -> Self {
        assert!(min <= max, "min must be <= max");
        Self::new(RangeAssertion::Between(min, max))
    }
}

impl Constraint for RangeConstraint {
    fn name(&self) -> &str {
        self.assertion.name()
    }

    fn satisfied(
        &self,
        _entity: Option<&EntityRef>,
        value: &Value,
        _context: &Context,
        _validator: &Validator,
    ) -> Result<bool> {
        if value.is_null() {
            return Ok(true);
        }
        match value.as_number() {
            Some(number) => Ok(self.assertion.holds(number)),
            None => Ok(false),
        }
    }

    fn default_message(&self) -> String {
        "{context} must be {assertion}, was {invalidValue}".to_string()
    }

    fn message_variables(&self) -> BTreeMap<String, String> {
        let mut vars = self.assertion.variables();
        vars.insert("assertion".to_string(), self.assertion.description());
        vars
    }
}
