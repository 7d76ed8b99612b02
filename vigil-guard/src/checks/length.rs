//! Unified length constraint for strings and collections.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{Constraint, Context, EntityRef, Value};
use crate::error::Result;
use crate::validator::Validator;

/// Types of length assertions that can be made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthAssertion {
    /// Length must be at least this
    Min(usize),
    /// Length must be at most this
    Max(usize),
    /// Length must be between min and max (inclusive)
    Between(usize, usize),
    /// Length must be exactly this
    Exactly(usize),
    /// Length must be at least one (convenience for Min(1))
    NotEmpty,
}

impl LengthAssertion {
    fn holds(&self, len: usize) -> bool {
        match self {
            LengthAssertion::Min(min) => len >= *min,
            LengthAssertion::Max(max) => len <= *max,
            LengthAssertion::Between(min, max) => len >= *min && len <= *max,
            LengthAssertion::Exactly(exact) => len == *exact,
            LengthAssertion::NotEmpty => len >= 1,
        }
    }

    /// Returns a human-readable name for this assertion.
    fn name(&self) -> &'static str {
        match self {
            LengthAssertion::Min(_) => "min_length",
            LengthAssertion::Max(_) => "max_length",
            LengthAssertion::Between(_, _) => "length_between",
            LengthAssertion::Exactly(_) => "exact_length",
            LengthAssertion::NotEmpty => "not_empty",
        }
    }

    /// Returns a human-readable description for this assertion.
    fn description(&self) -> String {
        match self {
            LengthAssertion::Min(min) => format!("at least {min} characters"),
            LengthAssertion::Max(max) => format!("at most {max} characters"),
            LengthAssertion::Between(min, max) => format!("between {min} and {max} characters"),
            LengthAssertion::Exactly(exact) => format!("exactly {exact} characters"),
            LengthAssertion::NotEmpty => "not empty".to_string(),
        }
    }

    fn variables(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        match self {
            LengthAssertion::Min(min) => {
                vars.insert("min".to_string(), min.to_string());
            }
            LengthAssertion::Max(max) => {
                vars.insert("max".to_string(), max.to_string());
            }
            LengthAssertion::Between(min, max) => {
                vars.insert("min".to_string(), min.to_string());
                vars.insert("max".to_string(), max.to_string());
            }
            LengthAssertion::Exactly(exact) => {
                vars.insert("min".to_string(), exact.to_string());
                vars.insert("max".to_string(), exact.to_string());
            }
            LengthAssertion::NotEmpty => {
                vars.insert("min".to_string(), "1".to_string());
            }
        }
        vars
    }
}

impl fmt::Display for LengthAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Checks the length of a string, list, or map value.
///
/// Strings are measured in characters, collections in elements. Null values
/// satisfy the constraint; values without a measurable length do not.
///
/// # Examples
///
/// ```rust
/// use vigil_guard::checks::{LengthAssertion, LengthConstraint};
///
/// let min = LengthConstraint::min(8);
/// let between = LengthConstraint::between(10, 500);
/// let exact = LengthConstraint::new(LengthAssertion::Exactly(6));
/// let not_empty = LengthConstraint::not_empty();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthConstraint {
    /// The length assertion to evaluate
    assertion: LengthAssertion,
}

impl LengthConstraint {
    /// Creates a length constraint with the given assertion.
    pub fn new(assertion: LengthAssertion) -> Self {
        Self { assertion }
    }

    /// Creates a minimum length constraint.
    pub fn min(min_length: usize) -> Self {
        Self::new(LengthAssertion::Min(min_length))
    }

    /// Creates a maximum length constraint.
    pub fn max(max_length: usize) -> Self {
        Self::new(LengthAssertion::Max(max_length))
    }

    /// Creates a constraint that checks the length is between bounds
    /// (inclusive).
    pub fn between(min_length: usize, max_length: usize) -> Self {
        assert!(min_length <= max_length, "min_length must be <= max_length");
        Self::new(LengthAssertion::Between(min_length, max_length))
    }

    /// Creates a constraint that checks for exact length.
    pub fn exactly(length: usize) -> Self {
        Self::new(LengthAssertion::Exactly(length))
    }

    /// Creates a constraint that checks the value is not empty.
    pub fn not_empty() -> Self {
        Self::new(LengthAssertion::NotEmpty)
    }
}

impl Constraint for LengthConstraint {
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
        match value.len() {
            Some(len) => Ok(self.assertion.holds(len)),
            None => Ok(false),
        }
    }

    fn default_message(&self) -> String {
        "{context} must be {assertion}".to_string()
    }

    fn message_variables(&self) -> BTreeMap<String, String> {
        let mut vars = self.assertion.variables();
        vars.insert("assertion".to_string(), self.assertion.description());
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn satisfied(constraint: &LengthConstraint, value: Value) -> bool {
        let validator = Validator::new();
        let context = Context::property("Account", "owner");
        constraint
            .satisfied(None, &value, &context, &validator)
            .unwrap()
    }

    #[test]
    fn test_min_length() {
        let constraint = LengthConstraint::min(5);
        assert!(satisfied(&constraint, Value::Str("hello".to_string())));
        assert!(!satisfied(&constraint, Value::Str("hi".to_string())));
        assert_eq!(constraint.name(), "min_length");
    }

    #[test]
    fn test_between_length() {
        let constraint = LengthConstraint::between(3, 10);
        assert!(satisfied(&constraint, Value::Str("hello".to_string())));
        assert!(!satisfied(&constraint, Value::Str("hi".to_string())));
        assert!(!satisfied(
            &constraint,
            Value::Str("this is way too long".to_string())
        ));
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let constraint = LengthConstraint::exactly(2);
        assert!(satisfied(&constraint, Value::Str("你好".to_string())));
    }

    #[test]
    fn test_collections_measure_elements() {
        let constraint = LengthConstraint::not_empty();
        assert!(satisfied(&constraint, Value::List(vec![Value::Int(1)])));
        assert!(!satisfied(&constraint, Value::List(vec![])));
    }

    #[test]
    fn test_null_satisfies() {
        let constraint = LengthConstraint::min(5);
        assert!(satisfied(&constraint, Value::Null));
    }

    #[test]
    fn test_unmeasurable_value_fails() {
        let constraint = LengthConstraint::min(1);
        assert!(!satisfied(&constraint, Value::Int(42)));
    }

    #[test]
    fn test_assertion_display() {
        assert_eq!(LengthAssertion::Min(5).to_string(), "at least 5 characters");
        assert_eq!(
            LengthAssertion::Between(3, 8).to_string(),
            "between 3 and 8 characters"
        );
        assert_eq!(LengthAssertion::NotEmpty.to_string(), "not empty");
    }

    #[test]
    #[should_panic(expected = "min_length must be <= max_length")]
    fn test_invalid_between_bounds() {
        LengthConstraint::between(10, 5);
    }
}
