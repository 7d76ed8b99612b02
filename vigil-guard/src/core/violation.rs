//! Constraint violation records.
//!
//! Violations are immutable result records created per validation cycle.
//! They hold weak references to the validated entity so that keeping a
//! report around never keeps the validated object graph alive.

use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::core::check::Check;
use crate::core::context::Context;
use crate::core::entity::{EntityRef, WeakEntity};
use crate::core::severity::Severity;
use crate::core::value::Value;

/// Renders a message template.
///
/// `{context}` and `{invalidValue}` are substituted first, then every
/// template-specific variable by name. Substitution happens once; variable
/// values are inserted verbatim.
pub(crate) fn render_template(
    template: &str,
    context: &Context,
    invalid_value: &Value,
    variables: &std::collections::BTreeMap<String, String>,
) -> String {
    let mut message = template.replace("{context}", &context.to_string());
    message = message.replace("{invalidValue}", &invalid_value.display_string());
    for (name, value) in variables {
        message = message.replace(&format!("{{{name}}}"), value);
    }
    message
}

/// Snapshot of the value that failed a check.
///
/// Scalar and container values are stored by value; entity values are
/// downgraded to a weak reference plus their type name.
#[derive(Debug, Clone)]
pub enum CapturedValue {
    /// A non-entity value, stored directly.
    Scalar(Value),
    /// An entity value, held weakly.
    Entity {
        /// Type name recorded at capture time
        type_name: String,
        /// Weak handle to the entity
        entity: WeakEntity,
    },
}

impl CapturedValue {
    /// Captures a value, downgrading entity references.
    pub fn capture(value: &Value) -> Self {
        match value {
            Value::Entity(entity) => CapturedValue::Entity {
                type_name: entity.type_name().to_string(),
                entity: Arc::downgrade(entity),
            },
            other => CapturedValue::Scalar(other.clone()),
        }
    }

    /// Returns the captured value, upgrading entity references.
    ///
    /// Returns `None` when a captured entity has been dropped since.
    pub fn get(&self) -> Option<Value> {
        match self {
            CapturedValue::Scalar(value) => Some(value.clone()),
            CapturedValue::Entity { entity, .. } => entity.upgrade().map(Value::Entity),
        }
    }

    /// Renders the captured value for display.
    pub fn display_string(&self) -> String {
        match self {
            CapturedValue::Scalar(value) => value.display_string(),
            CapturedValue::Entity { type_name, .. } => type_name.clone(),
        }
    }
}

impl Serialize for CapturedValue {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            CapturedValue::Scalar(value) => value.serialize(serializer),
            CapturedValue::Entity { type_name, .. } => serializer.serialize_str(type_name),
        }
    }
}

/// One failed check at one context.
///
/// Ordering within a cycle follows check registration order. The `causes`
/// list is non-empty only for delegating checks such as nested-valid, where
/// it carries the sub-violations that made the composite fail.
#[derive(Debug, Clone)]
pub struct ConstraintViolation {
    check_name: String,
    message: String,
    raw_message: String,
    error_code: String,
    severity: Severity,
    context: Context,
    entity: Option<WeakEntity>,
    invalid_value: CapturedValue,
    causes: Vec<ConstraintViolation>,
}

impl ConstraintViolation {
    /// Creates a violation for the given check.
    pub fn new(
        check: &Check,
        message: impl Into<String>,
        context: Context,
        entity: Option<&EntityRef>,
        invalid_value: &Value,
    ) -> Self {
        Self {
            check_name: check.name().to_string(),
            message: message.into(),
            raw_message: check.message().to_string(),
            error_code: check.error_code().to_string(),
            severity: check.severity(),
            context,
            entity: entity.map(Arc::downgrade),
            invalid_value: CapturedValue::capture(invalid_value),
            causes: Vec::new(),
        }
    }

    /// Creates a violation from explicit parts, used for pre- and
    /// postcondition failures that have no backing check.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        check_name: impl Into<String>,
        message: impl Into<String>,
        raw_message: impl Into<String>,
        error_code: impl Into<String>,
        severity: Severity,
        context: Context,
        entity: Option<&EntityRef>,
        invalid_value: &Value,
    ) -> Self {
        Self {
            check_name: check_name.into(),
            message: message.into(),
            raw_message: raw_message.into(),
            error_code: error_code.into(),
            severity,
            context,
            entity: entity.map(Arc::downgrade),
            invalid_value: CapturedValue::capture(invalid_value),
            causes: Vec::new(),
        }
    }

    /// Attaches nested cause violations, consuming self.
    pub fn with_causes(mut self, causes: Vec<ConstraintViolation>) -> Self {
        self.causes = causes;
        self
    }

    /// Returns the name of the violated check.
    pub fn check_name(&self) -> &str {
        &self.check_name
    }

    /// Returns the rendered message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the message template before substitution.
    pub fn raw_message(&self) -> &str {
        &self.raw_message
    }

    /// Returns the error code of the violated check.
    pub fn error_code(&self) -> &str {
        &self.error_code
    }

    /// Returns the severity of the violated check.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Returns the context the check was evaluated at.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Returns the validated entity if it is still alive.
    pub fn entity(&self) -> Option<EntityRef> {
        self.entity.as_ref().and_then(WeakEntity::upgrade)
    }

    /// Returns the captured invalid value.
    pub fn invalid_value(&self) -> &CapturedValue {
        &self.invalid_value
    }

    /// Returns the nested cause violations.
    pub fn causes(&self) -> &[ConstraintViolation] {
        &self.causes
    }

    /// Returns true if this violation carries nested causes.
    pub fn has_causes(&self) -> bool {
        !self.causes.is_empty()
    }

    /// Returns true for an error-severity violation.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.context, self.message)
    }
}

impl Serialize for ConstraintViolation {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let field_count = if self.causes.is_empty() { 7 } else { 8 };
        let mut state = serializer.serialize_struct("ConstraintViolation", field_count)?;
        state.serialize_field("check", &self.check_name)?;
        state.serialize_field("message", &self.message)?;
        state.serialize_field("raw_message", &self.raw_message)?;
        state.serialize_field("error_code", &self.error_code)?;
        state.serialize_field("severity", &self.severity)?;
        state.serialize_field("context", &self.context)?;
        state.serialize_field("invalid_value", &self.invalid_value)?;
        if !self.causes.is_empty() {
            state.serialize_field("causes", &self.causes)?;
        }
        state.end()
    }
}

/// An aggregated, serializable view over one validation cycle's violations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ViolationReport {
    /// All violations in evaluation order
    pub violations: Vec<ConstraintViolation>,
    /// Number of error-severity violations
    pub error_count: usize,
    /// Number of warning-severity violations
    pub warning_count: usize,
    /// Number of info-severity violations
    pub info_count: usize,
}

impl ViolationReport {
    /// Builds a report from a violation list.
    pub fn from_violations(violations: Vec<ConstraintViolation>) -> Self {
        let error_count = violations
            .iter()
            .filter(|v| v.severity() == Severity::Error)
            .count();
        let warning_count = violations
            .iter()
            .filter(|v| v.severity() == Severity::Warning)
            .count();
        let info_count = violations
            .iter()
            .filter(|v| v.severity() == Severity::Info)
            .count();
        Self {
            violations,
            error_count,
            warning_count,
            info_count,
        }
    }

    /// Returns true if no violations were recorded.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns true if any error-severity violation was recorded.
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Iterates over the error-severity violations.
    pub fn errors(&self) -> impl Iterator<Item = &ConstraintViolation> {
        self.violations.iter().filter(|v| v.is_error())
    }
}

impl IntoIterator for ViolationReport {
    type Item = ConstraintViolation;
    type IntoIter = std::vec::IntoIter<ConstraintViolation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::NotNullConstraint;
    use crate::core::check::Check;

    fn sample_violation() -> ConstraintViolation {
        let check = Check::rule(NotNullConstraint::new()).build();
        ConstraintViolation::new(
            &check,
            "Account::owner must not be null",
            Context::property("Account", "owner"),
            None,
            &Value::Null,
        )
    }

    #[test]
    fn test_violation_fields() {
        let violation = sample_violation();
        assert_eq!(violation.check_name(), "not_null");
        assert_eq!(violation.error_code(), "not_null");
        assert_eq!(violation.severity(), Severity::Error);
        assert!(violation.raw_message().contains("{context}"));
        assert!(!violation.has_causes());
        assert!(violation.entity().is_none());
    }

    #[test]
    fn test_captured_scalar_round_trip() {
        let captured = CapturedValue::capture(&Value::from(42));
        assert_eq!(captured.get(), Some(Value::Int(42)));
        assert_eq!(captured.display_string(), "42");
    }

    #[test]
    fn test_display() {
        let violation = sample_violation();
        assert_eq!(
            violation.to_string(),
            "[error] Account::owner: Account::owner must not be null"
        );
    }

    #[test]
    fn test_serialize_omits_empty_causes() {
        let violation = sample_violation();
        let json = serde_json::to_value(&violation).unwrap();
        assert!(json.get("causes").is_none());
        assert_eq!(json["check"], "not_null");
        assert_eq!(json["invalid_value"], serde_json::Value::Null);

        let with_causes = sample_violation().with_causes(vec![sample_violation()]);
        let json = serde_json::to_value(&with_causes).unwrap();
        assert_eq!(json["causes"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_report_counts() {
        let report = ViolationReport::from_violations(vec![sample_violation()]);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.warning_count, 0);
        assert!(report.has_errors());
        assert!(!report.is_clean());
        assert_eq!(report.errors().count(), 1);
    }
}
