//! Expression evaluation for condition formulas.
//!
//! Formulas appear in three places: `when` clauses gating individual checks,
//! pre/postcondition bodies, and old-value capture expressions. Each formula
//! names the language it is written in; the [`EvaluatorRegistry`] maps
//! language ids to [`ExpressionEvaluator`] implementations. The crate ships
//! one language, `"vigil"`, a small strict expression dialect implemented in
//! [`script`]. Embedders can register additional evaluators under their own
//! language ids.
//!
//! Every evaluation receives a [`Bindings`] map. The guard and validator
//! populate the well-known bindings before each evaluation:
//!
//! | binding      | bound to                                          |
//! |--------------|---------------------------------------------------|
//! | `_this`      | the receiver entity, or the type name for statics |
//! | `_value`     | the value under validation (`when` clauses)       |
//! | `_args`      | the full argument list of a guarded call          |
//! | `_returns`   | the return value (postconditions)                 |
//! | `_old`       | the captured old value (postconditions)           |
//! | `<param>`    | each declared parameter, by name                  |

mod script;

pub use script::ScriptEvaluator;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::core::Value;
use crate::error::{Result, VigilError};

/// Named values visible to a formula.
pub type Bindings = BTreeMap<String, Value>;

/// Evaluates formulas written in one language.
pub trait ExpressionEvaluator: Send + Sync {
    /// The language id formulas use to select this evaluator.
    fn language(&self) -> &str;

    /// Evaluates the expression against the given bindings.
    fn evaluate(&self, expression: &str, bindings: &Bindings) -> Result<Value>;
}

/// Maps language ids to evaluators.
///
/// An unresolved language id is a configuration error, surfaced the first
/// time a formula in that language is evaluated.
pub struct EvaluatorRegistry {
    evaluators: RwLock<HashMap<String, Arc<dyn ExpressionEvaluator>>>,
}

impl EvaluatorRegistry {
    /// Creates a registry with the bundled `"vigil"` evaluator installed.
    pub fn new() -> Self {
        let registry = Self {
            evaluators: RwLock::new(HashMap::new()),
        };
        // Registration on a fresh registry cannot observe a poisoned lock.
        let _ = registry.register(Arc::new(ScriptEvaluator::new()));
        registry
    }

    /// Registers an evaluator under its language id, replacing any previous
    /// evaluator for that language.
    pub fn register(&self, evaluator: Arc<dyn ExpressionEvaluator>) -> Result<()> {
        let mut evaluators = self
            .evaluators
            .write()
            .map_err(|e| VigilError::internal(format!("failed to acquire evaluator lock: {e}")))?;
        evaluators.insert(evaluator.language().to_string(), evaluator);
        Ok(())
    }

    /// Returns the evaluator for a language id.
    pub fn get(&self, language: &str) -> Result<Arc<dyn ExpressionEvaluator>> {
        let evaluators = self
            .evaluators
            .read()
            .map_err(|e| VigilError::internal(format!("failed to acquire evaluator lock: {e}")))?;
        evaluators.get(language).cloned().ok_or_else(|| {
            VigilError::configuration(format!(
                "no expression evaluator registered for language '{language}'"
            ))
        })
    }

    /// Evaluates a formula to an arbitrary value.
    pub fn evaluate(&self, language: &str, expression: &str, bindings: &Bindings) -> Result<Value> {
        self.get(language)?.evaluate(expression, bindings)
    }

    /// Evaluates a formula that must produce a boolean. A non-boolean
    /// result is an expression error, never coerced.
    pub fn evaluate_condition(
        &self,
        language: &str,
        expression: &str,
        bindings: &Bindings,
    ) -> Result<bool> {
        let value = self.evaluate(language, expression, bindings)?;
        value.as_bool().ok_or_else(|| {
            VigilError::expression(
                expression,
                format!("condition produced {} instead of a boolean", value.type_name()),
            )
        })
    }
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_language_is_registered() {
        let registry = EvaluatorRegistry::new();
        assert!(registry.get("vigil").is_ok());
    }

    #[test]
    fn test_unknown_language_is_configuration_error() {
        let registry = EvaluatorRegistry::new();
        let err = registry.get("groovy").err().unwrap();
        assert!(matches!(err, VigilError::Configuration(_)));
    }

    #[test]
    fn test_condition_rejects_non_boolean() {
        let registry = EvaluatorRegistry::new();
        let err = registry
            .evaluate_condition("vigil", "1 + 1", &Bindings::new())
            .unwrap_err();
        assert!(matches!(err, VigilError::Expression { .. }));
    }

    #[test]
    fn test_condition_accepts_boolean() {
        let registry = EvaluatorRegistry::new();
        let result = registry
            .evaluate_condition("vigil", "1 + 1 == 2", &Bindings::new())
            .unwrap();
        assert!(result);
    }
}
