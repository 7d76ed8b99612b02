//! Check definitions and related configuration records.
//!
//! A [`Check`] binds a rule to everything the engine needs to evaluate and
//! report it: message template, error code, severity, activation profiles,
//! target kinds, and an optional "when" guard formula. Checks are immutable
//! once registered.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::constraint::{Constraint, SharedConstraint};
use crate::core::severity::Severity;
use crate::core::value::Value;

/// A formula in a registered expression language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Formula {
    /// Language id the formula is written in
    pub language: String,
    /// The formula text
    pub expression: String,
}

impl Formula {
    /// Creates a new formula.
    pub fn new(language: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            expression: expression.into(),
        }
    }
}

/// The part of a container value a check applies to.
///
/// Checks default to [`ConstraintTarget::Container`], the value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintTarget {
    /// The value itself.
    Container,
    /// The keys of a map value.
    Keys,
    /// The elements of a list value or the values of a map value.
    Values,
    /// Like `Values`, but repeated through nested containers.
    Recursive,
}

/// The dispatch category of a check.
#[derive(Clone)]
pub enum CheckBody {
    /// An ordinary rule evaluated through a [`Constraint`].
    Rule(SharedConstraint),
    /// Nested-valid: delegate to the value's own registered checks.
    Valid,
    /// Apply every check of a named, shared constraint set.
    Set {
        /// Id of the constraint set to resolve
        set_id: String,
    },
    /// Reuse the checks of a property on another (or the same) type.
    Member {
        /// Explicit property name; inferred from the context when `None`
        property: Option<String>,
        /// Explicit declaring type; derived from the context when `None`
        target_type: Option<String>,
    },
}

impl std::fmt::Debug for CheckBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckBody::Rule(constraint) => f.debug_tuple("Rule").field(&constraint.name()).finish(),
            CheckBody::Valid => write!(f, "Valid"),
            CheckBody::Set { set_id } => f.debug_struct("Set").field("set_id", set_id).finish(),
            CheckBody::Member {
                property,
                target_type,
            } => f
                .debug_struct("Member")
                .field("property", property)
                .field("target_type", target_type)
                .finish(),
        }
    }
}

/// A single registered check.
///
/// Built through [`Check::rule`], [`Check::valid`], [`Check::constraint_set`],
/// or [`Check::member`]; the builder seeds name, message, and error code from
/// the rule and lets callers override any of them.
///
/// # Examples
///
/// ```rust
/// use vigil_guard::checks::LengthConstraint;
/// use vigil_guard::core::{Check, Severity};
///
/// let check = Check::rule(LengthConstraint::between(1, 64))
///     .severity(Severity::Warning)
///     .profile("strict")
///     .build();
///
/// assert_eq!(check.name(), "length_between");
/// assert_eq!(check.profiles(), ["strict"]);
/// ```
#[derive(Debug, Clone)]
pub struct Check {
    name: String,
    body: CheckBody,
    message: String,
    message_variables: BTreeMap<String, String>,
    error_code: String,
    severity: Severity,
    profiles: Vec<String>,
    targets: Vec<ConstraintTarget>,
    when: Option<Formula>,
}

impl Check {
    /// Starts building an ordinary check from a constraint.
    ///
    /// Name, message template, error code, and message variables are seeded
    /// from the constraint.
    pub fn rule(constraint: impl Constraint + 'static) -> CheckBuilder {
        let name = constraint.name().to_string();
        let message = constraint.default_message();
        let variables = constraint.message_variables();
        CheckBuilder::new(CheckBody::Rule(Arc::new(constraint)), name, message, variables)
    }

    /// Starts building an ordinary check from an already shared constraint.
    pub fn shared_rule(constraint: SharedConstraint) -> CheckBuilder {
        let name = constraint.name().to_string();
        let message = constraint.default_message();
        let variables = constraint.message_variables();
        CheckBuilder::new(CheckBody::Rule(constraint), name, message, variables)
    }

    /// Starts building a nested-valid check that delegates to the value's
    /// own registered checks.
    pub fn valid() -> CheckBuilder {
        CheckBuilder::new(
            CheckBody::Valid,
            "valid".to_string(),
            "{context} is invalid".to_string(),
            BTreeMap::new(),
        )
    }

    /// Starts building a check that applies a named constraint set.
    pub fn constraint_set(set_id: impl Into<String>) -> CheckBuilder {
        let set_id = set_id.into();
        let mut variables = BTreeMap::new();
        variables.insert("set".to_string(), set_id.clone());
        CheckBuilder::new(
            CheckBody::Set { set_id },
            "constraint_set".to_string(),
            "{context} violates constraint set '{set}'".to_string(),
            variables,
        )
    }

    /// Starts building a member-delegation check that reuses a property's
    /// checks; the property is inferred from the parameter or accessor name
    /// unless set explicitly with [`CheckBuilder::property`].
    pub fn member() -> CheckBuilder {
        CheckBuilder::new(
            CheckBody::Member {
                property: None,
                target_type: None,
            },
            "member_of".to_string(),
            "{context} is invalid".to_string(),
            BTreeMap::new(),
        )
    }

    /// Returns the check name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the dispatch body.
    pub fn body(&self) -> &CheckBody {
        &self.body
    }

    /// Returns the raw message template.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the check-specific message variables.
    pub fn message_variables(&self) -> &BTreeMap<String, String> {
        &self.message_variables
    }

    /// Returns the error code.
    pub fn error_code(&self) -> &str {
        &self.error_code
    }

    /// Returns the severity assigned to violations of this check.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Returns the activation profiles; empty means the implicit "default"
    /// profile.
    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }

    /// Returns the container target kinds.
    pub fn targets(&self) -> &[ConstraintTarget] {
        &self.targets
    }

    /// Returns the optional "when" guard formula.
    pub fn when(&self) -> Option<&Formula> {
        self.when.as_ref()
    }

    /// Returns true if this check applies to the given target kind.
    pub fn applies_to(&self, target: ConstraintTarget) -> bool {
        self.targets.contains(&target)
    }
}

/// Builder for [`Check`].
#[derive(Debug, Clone)]
pub struct CheckBuilder {
    name: String,
    body: CheckBody,
    message: String,
    message_variables: BTreeMap<String, String>,
    error_code: Option<String>,
    severity: Severity,
    profiles: Vec<String>,
    targets: Vec<ConstraintTarget>,
    when: Option<Formula>,
}

impl CheckBuilder {
    fn new(
        body: CheckBody,
        name: String,
        message: String,
        message_variables: BTreeMap<String, String>,
    ) -> Self {
        Self {
            name,
            body,
            message,
            message_variables,
            error_code: None,
            severity: Severity::default(),
            profiles: Vec::new(),
            targets: Vec::new(),
            when: None,
        }
    }

    /// Overrides the check name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Overrides the message template.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Adds a message variable available to the template.
    pub fn variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.message_variables.insert(key.into(), value.into());
        self
    }

    /// Overrides the error code; defaults to the check name.
    pub fn error_code(mut self, error_code: impl Into<String>) -> Self {
        self.error_code = Some(error_code.into());
        self
    }

    /// Sets the severity; defaults to [`Severity::Error`].
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Adds an activation profile.
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profiles.push(profile.into());
        self
    }

    /// Adds several activation profiles.
    pub fn profiles<I, S>(mut self, profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.profiles.extend(profiles.into_iter().map(Into::into));
        self
    }

    /// Adds a container target kind; the first call replaces the implicit
    /// [`ConstraintTarget::Container`] default.
    pub fn target(mut self, target: ConstraintTarget) -> Self {
        self.targets.push(target);
        self
    }

    /// Adds several container target kinds.
    pub fn targets<I>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = ConstraintTarget>,
    {
        self.targets.extend(targets);
        self
    }

    /// Guards the check with a formula; the check is skipped when the
    /// formula evaluates to false.
    pub fn when(mut self, language: impl Into<String>, expression: impl Into<String>) -> Self {
        self.when = Some(Formula::new(language, expression));
        self
    }

    /// Sets the explicit property for a member-delegation check.
    ///
    /// Has no effect on other check kinds.
    pub fn property(mut self, name: impl Into<String>) -> Self {
        if let CheckBody::Member { property, .. } = &mut self.body {
            *property = Some(name.into());
        }
        self
    }

    /// Overrides the declaring type for a member-delegation check.
    ///
    /// Has no effect on other check kinds.
    pub fn source_type(mut self, type_name: impl Into<String>) -> Self {
        if let CheckBody::Member { target_type, .. } = &mut self.body {
            *target_type = Some(type_name.into());
        }
        self
    }

    /// Builds the immutable check.
    pub fn build(self) -> Check {
        let error_code = self.error_code.unwrap_or_else(|| self.name.clone());
        let targets = if self.targets.is_empty() {
            vec![ConstraintTarget::Container]
        } else {
            self.targets
        };
        Check {
            name: self.name,
            body: self.body,
            message: self.message,
            message_variables: self.message_variables,
            error_code,
            severity: self.severity,
            profiles: self.profiles,
            targets,
            when: self.when,
        }
    }
}

/// A profile-gated predicate that can suppress specific checks.
///
/// Exclusions attach to parameter slots; before an attached check runs, all
/// active exclusions are consulted and any of them can suppress it.
pub trait CheckExclusion: Send + Sync {
    /// Returns the exclusion name.
    fn name(&self) -> &str;

    /// Returns the activation profiles; empty means the implicit "default"
    /// profile.
    fn profiles(&self) -> &[String] {
        &[]
    }

    /// Returns true if the given check must be suppressed for this value.
    fn suppresses(&self, check: &Check, value: &Value) -> bool;
}

/// A shared, thread-safe exclusion handle.
pub type SharedExclusion = Arc<dyn CheckExclusion>;

/// The ordered checks and exclusions of one parameter slot.
#[derive(Clone)]
pub struct ParameterChecks {
    name: String,
    checks: Vec<Check>,
    exclusions: Vec<SharedExclusion>,
}

impl ParameterChecks {
    /// Creates an empty slot for the named parameter.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            checks: Vec::new(),
            exclusions: Vec::new(),
        }
    }

    /// Adds a check to this parameter.
    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    /// Adds an exclusion to this parameter.
    pub fn exclusion(mut self, exclusion: impl CheckExclusion + 'static) -> Self {
        self.exclusions.push(Arc::new(exclusion));
        self
    }

    /// Returns the parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the checks in insertion order.
    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// Returns the attached exclusions.
    pub fn exclusions(&self) -> &[SharedExclusion] {
        &self.exclusions
    }

    pub(crate) fn add_checks(&mut self, checks: Vec<Check>, overwrite: bool) {
        if overwrite {
            self.checks.clear();
        }
        self.checks.extend(checks);
    }

    pub(crate) fn remove_checks(&mut self, check_names: &[&str]) {
        self.checks.retain(|c| !check_names.contains(&c.name()));
    }

    pub(crate) fn merge(&mut self, other: ParameterChecks) {
        self.checks.extend(other.checks);
        self.exclusions.extend(other.exclusions);
    }
}

impl std::fmt::Debug for ParameterChecks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterChecks")
            .field("name", &self.name)
            .field("checks", &self.checks)
            .field(
                "exclusions",
                &self.exclusions.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// A precondition attached to an operation.
#[derive(Debug, Clone)]
pub struct PreCondition {
    formula: Formula,
    message: String,
    error_code: String,
    severity: Severity,
    profiles: Vec<String>,
}

impl PreCondition {
    /// Creates a precondition from a formula.
    pub fn new(language: impl Into<String>, expression: impl Into<String>) -> Self {
        let formula = Formula::new(language, expression);
        Self {
            message: "{context} does not satisfy precondition '{expression}'".to_string(),
            error_code: "pre".to_string(),
            severity: Severity::default(),
            profiles: Vec::new(),
            formula,
        }
    }

    /// Overrides the message template.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Overrides the error code.
    pub fn with_error_code(mut self, error_code: impl Into<String>) -> Self {
        self.error_code = error_code.into();
        self
    }

    /// Sets the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Adds an activation profile.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profiles.push(profile.into());
        self
    }

    /// Returns the formula.
    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    /// Returns the message template.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the error code.
    pub fn error_code(&self) -> &str {
        &self.error_code
    }

    /// Returns the severity.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Returns the activation profiles.
    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }
}

/// A postcondition attached to an operation.
///
/// The optional old-value formula is evaluated before the call runs; its
/// result is bound as `_old` when the main formula is evaluated afterwards.
#[derive(Debug, Clone)]
pub struct PostCondition {
    formula: Formula,
    old: Option<Formula>,
    message: String,
    error_code: String,
    severity: Severity,
    profiles: Vec<String>,
}

impl PostCondition {
    /// Creates a postcondition from a formula.
    pub fn new(language: impl Into<String>, expression: impl Into<String>) -> Self {
        let formula = Formula::new(language, expression);
        Self {
            old: None,
            message: "{context} does not satisfy postcondition '{expression}'".to_string(),
            error_code: "post".to_string(),
            severity: Severity::default(),
            profiles: Vec::new(),
            formula,
        }
    }

    /// Declares an old-value formula, written in the same language as the
    /// main formula.
    pub fn with_old(mut self, expression: impl Into<String>) -> Self {
        self.old = Some(Formula::new(self.formula.language.clone(), expression));
        self
    }

    /// Overrides the message template.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Overrides the error code.
    pub fn with_error_code(mut self, error_code: impl Into<String>) -> Self {
        self.error_code = error_code.into();
        self
    }

    /// Sets the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Adds an activation profile.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profiles.push(profile.into());
        self
    }

    /// Returns the main formula.
    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    /// Returns the old-value formula, if declared.
    pub fn old_formula(&self) -> Option<&Formula> {
        self.old.as_ref()
    }

    /// Returns the message template.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the error code.
    pub fn error_code(&self) -> &str {
        &self.error_code
    }

    /// Returns the severity.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Returns the activation profiles.
    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::NotNullConstraint;

    #[test]
    fn test_rule_check_seeds_from_constraint() {
        let check = Check::rule(NotNullConstraint::new()).build();
        assert_eq!(check.name(), "not_null");
        assert_eq!(check.error_code(), "not_null");
        assert!(check.message().contains("{context}"));
        assert_eq!(check.severity(), Severity::Error);
        assert_eq!(check.targets(), [ConstraintTarget::Container]);
        assert!(check.profiles().is_empty());
    }

    #[test]
    fn test_builder_overrides() {
        let check = Check::rule(NotNullConstraint::new())
            .name("owner_required")
            .message("owner is required")
            .error_code("E1001")
            .severity(Severity::Warning)
            .profile("strict")
            .target(ConstraintTarget::Values)
            .build();
        assert_eq!(check.name(), "owner_required");
        assert_eq!(check.message(), "owner is required");
        assert_eq!(check.error_code(), "E1001");
        assert_eq!(check.severity(), Severity::Warning);
        assert_eq!(check.profiles(), ["strict"]);
        assert_eq!(check.targets(), [ConstraintTarget::Values]);
        assert!(!check.applies_to(ConstraintTarget::Container));
    }

    #[test]
    fn test_member_check_fields() {
        let check = Check::member()
            .property("owner")
            .source_type("Account")
            .build();
        match check.body() {
            CheckBody::Member {
                property,
                target_type,
            } => {
                assert_eq!(property.as_deref(), Some("owner"));
                assert_eq!(target_type.as_deref(), Some("Account"));
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn test_post_condition_old_shares_language() {
        let post = PostCondition::new("vigil", "_this.value > _old").with_old("_this.value");
        assert_eq!(post.old_formula().map(|f| f.language.as_str()), Some("vigil"));
    }
}
