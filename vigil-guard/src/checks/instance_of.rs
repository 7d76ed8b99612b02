//! Entity type constraint.

use std::collections::BTreeMap;

use crate::core::{Constraint, Context, EntityRef, Value};
use crate::error::Result;
use crate::validator::Validator;

/// Checks that an entity value is of one of the named types.
///
/// A type matches either directly or through its declared supertype chain,
/// so a value of a subtype satisfies a constraint naming its ancestor. Null
/// values satisfy the constraint; non-entity values do not.
#[derive(Debug, Clone)]
pub struct InstanceOfConstraint {
    type_names: Vec<String>,
}

impl InstanceOfConstraint {
    /// Creates a constraint accepting a single type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_names: vec![type_name.into()],
        }
    }

    /// Creates a constraint accepting any of the given types.
    pub fn any_of(type_names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            type_names: type_names.into_iter().map(Into::into).collect(),
        }
    }
}

impl Constraint for InstanceOfConstraint {
    fn name(&self) -> &str {
        "instance_of"
    }

    fn satisfied(
        &self,
        _entity: Option<&EntityRef>,
        value: &Value,
        _context: &Context,
        validator: &Validator,
    ) -> Result<bool> {
        let entity = match value {
            Value::Null => return Ok(true),
            Value::Entity(entity) => entity,
            _ => return Ok(false),
        };

        // Walk the declared ancestry, starting at the runtime type.
        let mut current = Some(entity.type_name().to_string());
        while let Some(type_name) = current {
            if self.type_names.iter().any(|n| n == &type_name) {
                return Ok(true);
            }
            current = validator
                .registry()
                .get(&type_name)?
                .supertype()
                .map(str::to_string);
        }
        Ok(false)
    }

    fn default_message(&self) -> String {
        "{context} must be an instance of {types}".to_string()
    }

    fn message_variables(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        vars.insert("types".to_string(), self.type_names.join(", "));
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::{ConfigurationBuilder, TypeConfig};
    use crate::core::Validatable;

    struct Savings;

    impl Validatable for Savings {
        fn type_name(&self) -> &str {
            "Savings"
        }

        fn property(&self, _name: &str) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    fn validator_with_ancestry() -> Validator {
        let source = ConfigurationBuilder::new()
            .configure(TypeConfig::new("Savings").supertype("Account"))
            .build();
        Validator::with_sources(vec![Arc::new(source)]).unwrap()
    }

    #[test]
    fn test_direct_type_match() {
        let constraint = InstanceOfConstraint::new("Savings");
        let validator = Validator::new();
        let context = Context::property("Bank", "account");
        let value = Value::Entity(Arc::new(Savings));

        assert!(constraint
            .satisfied(None, &value, &context, &validator)
            .unwrap());
    }

    #[test]
    fn test_supertype_match() {
        let constraint = InstanceOfConstraint::new("Account");
        let validator = validator_with_ancestry();
        let context = Context::property("Bank", "account");
        let value = Value::Entity(Arc::new(Savings));

        assert!(constraint
            .satisfied(None, &value, &context, &validator)
            .unwrap());
    }

    #[test]
    fn test_mismatch_fails() {
        let constraint = InstanceOfConstraint::new("Ledger");
        let validator = validator_with_ancestry();
        let context = Context::property("Bank", "account");
        let value = Value::Entity(Arc::new(Savings));

        assert!(!constraint
            .satisfied(None, &value, &context, &validator)
            .unwrap());
    }

    #[test]
    fn test_null_satisfies_and_scalar_fails() {
        let constraint = InstanceOfConstraint::new("Account");
        let validator = Validator::new();
        let context = Context::property("Bank", "account");

        assert!(constraint
            .satisfied(None, &Value::Null, &context, &validator)
            .unwrap());
        assert!(!constraint
            .satisfied(None, &Value::Int(1), &context, &validator)
            .unwrap());
    }
}
