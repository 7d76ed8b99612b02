//! Core constraint abstraction.
//!
//! A [`Constraint`] is the predicate behind an ordinary [`Check`]: it looks
//! at a single value and decides whether the value satisfies the rule.
//! Bundled implementations live in [`crate::checks`]; custom rules implement
//! the trait directly.
//!
//! [`Check`]: crate::core::check::Check

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::context::Context;
use crate::core::entity::EntityRef;
use crate::core::value::Value;
use crate::error::Result;
use crate::validator::Validator;

/// A single validation rule evaluated against one value.
///
/// Implementations must be cheap to evaluate and free of side effects; the
/// engine may run them any number of times in any order within a cycle.
/// A failing evaluation (an `Err`) is an engine fault and aborts the whole
/// validation cycle, so data-dependent outcomes must be expressed through
/// the returned boolean, never through errors.
///
/// # Examples
///
/// ```rust
/// use std::collections::BTreeMap;
/// use vigil_guard::core::{Constraint, Context, EntityRef, Value};
/// use vigil_guard::error::Result;
/// use vigil_guard::validator::Validator;
///
/// struct EvenConstraint;
///
/// impl Constraint for EvenConstraint {
///     fn name(&self) -> &str {
///         "even"
///     }
///
///     fn satisfied(
///         &self,
///         _entity: Option<&EntityRef>,
///         value: &Value,
///         _context: &Context,
///         _validator: &Validator,
///     ) -> Result<bool> {
///         // null is acceptable; pair with a not-null check to forbid it
///         Ok(value.as_int().map(|i| i % 2 == 0).unwrap_or(true))
///     }
///
///     fn default_message(&self) -> String {
///         "{context} must be an even number but was {invalidValue}".to_string()
///     }
/// }
/// ```
pub trait Constraint: Send + Sync {
    /// Returns the stable rule identity, used as the default check name and
    /// error code.
    fn name(&self) -> &str;

    /// Decides whether the value satisfies this rule.
    ///
    /// `entity` is the object under validation when one exists; formula
    /// backed rules reach the expression evaluators through `validator`.
    fn satisfied(
        &self,
        entity: Option<&EntityRef>,
        value: &Value,
        context: &Context,
        validator: &Validator,
    ) -> Result<bool>;

    /// Returns the default message template for violations of this rule.
    ///
    /// Templates may reference `{context}`, `{invalidValue}`, and any
    /// variable returned by [`Constraint::message_variables`].
    fn default_message(&self) -> String;

    /// Returns rule-specific message variables, such as configured bounds.
    fn message_variables(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

/// A shared, thread-safe constraint handle.
pub type SharedConstraint = Arc<dyn Constraint>;
