//! The validation engine.
//!
//! [`Validator`] owns the [`CheckRegistry`], the [`EvaluatorRegistry`] and the
//! runtime profile state, and drives every check evaluation in the crate. Both
//! ad-hoc validation ([`Validator::validate`]) and guarded invocations go
//! through [`Validator::check_one`], so profile gating, activation conditions,
//! target distribution and message rendering behave identically everywhere.
//!
//! A full validation walks the configured type chain:
//!
//! ```text
//! validate(entity)
//!   └─ for each type, most specific first
//!        ├─ property checks        (read via Validatable::property)
//!        ├─ accessor return checks (invoked with no arguments)
//!        └─ type-level checks      (the entity itself is the value)
//! ```
//!
//! Re-entrancy is tracked per thread: an entity already being validated on the
//! current thread is reported as valid without re-walking it, which keeps
//! cyclic object graphs terminating.

use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use tracing::{debug, instrument};

use crate::config::ConfigurationSource;
use crate::core::{
    render_template, Check, CheckBody, ConstraintTarget, ConstraintViolation, Context, EntityRef,
    ObjectId, ProfileState, StaticAccessor, ValidatedType, Value,
};
use crate::error::{Result, VigilError};
use crate::expr::{Bindings, EvaluatorRegistry};
use crate::registry::CheckRegistry;

thread_local! {
    /// Entities currently being validated on this thread, outermost first.
    static VALIDATION_STACK: RefCell<Vec<ObjectId>> = const { RefCell::new(Vec::new()) };
}

/// Returns whether the entity is already being validated on this thread.
pub(crate) fn currently_validating(id: ObjectId) -> bool {
    VALIDATION_STACK.with(|stack| stack.borrow().contains(&id))
}

/// Pops the innermost stack entry when dropped.
struct StackEntry;

impl Drop for StackEntry {
    fn drop(&mut self) {
        VALIDATION_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

fn push_validating(id: ObjectId) -> StackEntry {
    VALIDATION_STACK.with(|stack| stack.borrow_mut().push(id));
    StackEntry
}

/// Evaluates checks against entities and collects constraint violations.
///
/// A validator is cheap to share behind an `Arc` and safe to use from several
/// threads at once. Check configuration lives in the [`CheckRegistry`] and can
/// be changed at runtime; profile switches take effect for validations started
/// after the switch.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use vigil_guard::checks::NotNullConstraint;
/// use vigil_guard::config::{ConfigurationBuilder, PropertyConfig, TypeConfig};
/// use vigil_guard::core::{Check, Validatable, Value};
/// use vigil_guard::error::Result;
/// use vigil_guard::validator::Validator;
///
/// struct Account {
///     owner: Option<String>,
/// }
///
/// impl Validatable for Account {
///     fn type_name(&self) -> &str {
///         "Account"
///     }
///
///     fn property(&self, name: &str) -> Result<Value> {
///         match name {
///             "owner" => Ok(self.owner.clone().map(Value::Str).unwrap_or(Value::Null)),
///             other => Err(vigil_guard::error::VigilError::configuration(format!(
///                 "unknown property '{other}'"
///             ))),
///         }
///     }
/// }
///
/// let source = ConfigurationBuilder::new()
///     .configure(TypeConfig::new("Account").property(
///         PropertyConfig::new("owner").check(Check::rule(NotNullConstraint).build()),
///     ))
///     .build();
///
/// let validator = Validator::with_sources(vec![Arc::new(source)])?;
/// let account: Arc<dyn Validatable> = Arc::new(Account { owner: None });
/// let violations = validator.validate(&account)?;
/// assert_eq!(violations.len(), 1);
/// assert_eq!(violations[0].message(), "Account::owner must not be null");
/// # Ok::<(), vigil_guard::error::VigilError>(())
/// ```
pub struct Validator {
    registry: CheckRegistry,
    evaluators: EvaluatorRegistry,
    profiles: RwLock<ProfileState>,
}

impl Validator {
    /// Creates a validator with no configuration sources.
    ///
    /// Checks are registered programmatically through [`Validator::registry`].
    pub fn new() -> Self {
        Self {
            registry: CheckRegistry::new(),
            evaluators: EvaluatorRegistry::new(),
            profiles: RwLock::new(ProfileState::new()),
        }
    }

    /// Creates a validator backed by the given configuration sources.
    ///
    /// Sources are consulted in order; later sources extend earlier ones.
    /// Profile defaults declared by the sources are applied to the initial
    /// profile state.
    pub fn with_sources(sources: Vec<Arc<dyn ConfigurationSource>>) -> Result<Self> {
        let registry = CheckRegistry::with_sources(sources);
        let defaults = registry.profile_defaults()?;

        let mut profiles = ProfileState::new();
        if !defaults.all_enabled_by_default {
            profiles.disable_all();
        }
        for profile in &defaults.enabled {
            profiles.enable(profile);
        }
        for profile in &defaults.disabled {
            profiles.disable(profile);
        }

        Ok(Self {
            registry,
            evaluators: EvaluatorRegistry::new(),
            profiles: RwLock::new(profiles),
        })
    }

    /// Returns the check registry backing this validator.
    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    /// Returns the expression evaluator registry.
    pub fn evaluators(&self) -> &EvaluatorRegistry {
        &self.evaluators
    }

    /// Enables the named profile.
    pub fn enable_profile(&self, profile: &str) -> Result<()> {
        self.write_profiles()?.enable(profile);
        Ok(())
    }

    /// Disables the named profile.
    pub fn disable_profile(&self, profile: &str) -> Result<()> {
        self.write_profiles()?.disable(profile);
        Ok(())
    }

    /// Enables all profiles, clearing explicit disables.
    pub fn enable_all_profiles(&self) -> Result<()> {
        self.write_profiles()?.enable_all();
        Ok(())
    }

    /// Disables all profiles, clearing explicit enables.
    pub fn disable_all_profiles(&self) -> Result<()> {
        self.write_profiles()?.disable_all();
        Ok(())
    }

    /// Returns whether the named profile is currently enabled.
    pub fn is_profile_enabled(&self, profile: &str) -> Result<bool> {
        Ok(self.read_profiles()?.is_enabled(profile))
    }

    /// Returns whether a check carrying these profiles is active.
    pub(crate) fn profiles_active(&self, profiles: &[String]) -> Result<bool> {
        Ok(self.read_profiles()?.is_any_enabled(profiles))
    }

    /// Validates the entity against every check registered for its type and
    /// the configured supertype chain.
    ///
    /// Returns the collected violations; an empty vector means the entity is
    /// valid. If the entity is already being validated on the current thread
    /// it is reported valid immediately.
    #[instrument(skip_all, fields(entity.type = %entity.type_name()))]
    pub fn validate(&self, entity: &EntityRef) -> Result<Vec<ConstraintViolation>> {
        let id = ObjectId::of(entity);
        if currently_validating(id) {
            debug!(entity.id = %id, "entity already under validation on this thread");
            return Ok(Vec::new());
        }
        let _entry = push_validating(id);

        let mut violations = Vec::new();
        for entry in self.type_chain(entity.type_name())? {
            self.validate_members(&entry, Some(entity), &mut violations)?;
        }
        debug!(violations.count = violations.len(), "validation finished");
        Ok(violations)
    }

    /// Validates the static members registered for the named type and its
    /// configured supertype chain.
    ///
    /// Instance members and type-level checks are skipped; they require an
    /// entity and are covered by [`Validator::validate`].
    #[instrument(skip_all, fields(entity.type = %type_name))]
    pub fn validate_static(&self, type_name: &str) -> Result<Vec<ConstraintViolation>> {
        let mut violations = Vec::new();
        for entry in self.type_chain(type_name)? {
            self.validate_members(&entry, None, &mut violations)?;
        }
        debug!(violations.count = violations.len(), "static validation finished");
        Ok(violations)
    }

    /// Evaluates a single check against a value, appending any violations.
    ///
    /// Checks not active under the current profile state, or whose activation
    /// condition evaluates to `false`, are skipped. The check is distributed
    /// over its configured targets before the body is applied.
    pub fn check_one(
        &self,
        check: &Check,
        entity: Option<&EntityRef>,
        value: &Value,
        context: &Context,
        violations: &mut Vec<ConstraintViolation>,
    ) -> Result<()> {
        if !self.profiles_active(check.profiles())? {
            return Ok(());
        }
        if !self.when_active(check, entity, value, context)? {
            return Ok(());
        }

        for target in check.targets() {
            match target {
                ConstraintTarget::Container => {
                    self.apply_body(check, entity, value, context, violations)?;
                }
                ConstraintTarget::Keys => {
                    if let Value::Map(map) = value {
                        for key in map.keys() {
                            let key = Value::Str(key.clone());
                            self.apply_body(check, entity, &key, context, violations)?;
                        }
                    }
                }
                ConstraintTarget::Values => match value {
                    Value::List(items) => {
                        for item in items {
                            self.apply_body(check, entity, item, context, violations)?;
                        }
                    }
                    Value::Map(map) => {
                        for item in map.values() {
                            self.apply_body(check, entity, item, context, violations)?;
                        }
                    }
                    _ => {}
                },
                ConstraintTarget::Recursive => {
                    self.apply_recursive(check, entity, value, context, violations)?;
                }
            }
        }
        Ok(())
    }

    /// Resolves the configured type chain, most specific type first.
    fn type_chain(&self, type_name: &str) -> Result<Vec<Arc<ValidatedType>>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(type_name.to_string());
        while let Some(name) = current {
            if !seen.insert(name.clone()) {
                return Err(VigilError::configuration(format!(
                    "supertype cycle detected at type '{name}'"
                )));
            }
            let entry = self.registry.get(&name)?;
            current = entry.supertype().map(str::to_string);
            chain.push(entry);
        }
        Ok(chain)
    }

    /// Validates the members of one type entry.
    ///
    /// With an entity, instance properties, instance accessors and type-level
    /// checks are evaluated. Without one, only static members are.
    fn validate_members(
        &self,
        entry: &ValidatedType,
        entity: Option<&EntityRef>,
        violations: &mut Vec<ConstraintViolation>,
    ) -> Result<()> {
        let statics_only = entity.is_none();

        for property in entry.properties() {
            if property.is_static != statics_only || property.checks.is_empty() {
                continue;
            }
            let context = Context::property(entry.name(), &property.name);
            let value = match entity {
                Some(entity) => entity.property(&property.name),
                None => self.statics(entry)?.property(&property.name),
            }
            .map_err(|e| {
                member_fault(
                    format!("failed to read '{}::{}'", entry.name(), property.name),
                    e,
                )
            })?;
            for check in &property.checks {
                self.check_one(check, entity, &value, &context, violations)?;
            }
        }

        for operation in entry.operations() {
            if operation.is_static != statics_only
                || !operation.accessor
                || operation.return_checks.is_empty()
            {
                continue;
            }
            let context = Context::return_value(entry.name(), &operation.name);
            let value = match entity {
                Some(entity) => entity.invoke(&operation.name, &[]),
                None => self.statics(entry)?.invoke(&operation.name, &[]),
            }
            .map_err(|e| {
                member_fault(
                    format!("failed to invoke '{}::{}'", entry.name(), operation.name),
                    e,
                )
            })?;
            for check in &operation.return_checks {
                self.check_one(check, entity, &value, &context, violations)?;
            }
        }

        if let Some(entity) = entity {
            if !entry.type_checks().is_empty() {
                let context = Context::for_type(entry.name());
                let value = Value::Entity(entity.clone());
                for check in entry.type_checks() {
                    self.check_one(check, Some(entity), &value, &context, violations)?;
                }
            }
        }
        Ok(())
    }

    /// Applies the check body to one candidate value.
    fn apply_body(
        &self,
        check: &Check,
        entity: Option<&EntityRef>,
        value: &Value,
        context: &Context,
        violations: &mut Vec<ConstraintViolation>,
    ) -> Result<()> {
        match check.body() {
            CheckBody::Rule(constraint) => {
                let satisfied = constraint
                    .satisfied(entity, value, context, self)
                    .map_err(|e| {
                        member_fault(
                            format!("check '{}' failed to evaluate at {context}", check.name()),
                            e,
                        )
                    })?;
                if !satisfied {
                    debug!(
                        check.name = %check.name(),
                        check.context = %context,
                        "check not satisfied"
                    );
                    let message = self.render(check, context, value);
                    violations.push(ConstraintViolation::new(
                        check,
                        message,
                        context.clone(),
                        entity,
                        value,
                    ));
                }
            }
            CheckBody::Valid => {
                self.validate_nested(check, entity, value, context, violations)?;
            }
            CheckBody::Set { set_id } => {
                let set = self.registry.constraint_set(set_id)?;
                for member in &set.checks {
                    self.check_one(member, entity, value, context, violations)?;
                }
            }
            CheckBody::Member {
                property,
                target_type,
            } => {
                self.delegate_to_member(
                    property.as_deref(),
                    target_type.as_deref(),
                    entity,
                    value,
                    context,
                    violations,
                )?;
            }
        }
        Ok(())
    }

    /// Descends container values, applying the body to every scalar found.
    ///
    /// Map keys are visited before map values, matching the order of the
    /// explicit `keys` and `values` targets.
    fn apply_recursive(
        &self,
        check: &Check,
        entity: Option<&EntityRef>,
        value: &Value,
        context: &Context,
        violations: &mut Vec<ConstraintViolation>,
    ) -> Result<()> {
        match value {
            Value::List(items) => {
                for item in items {
                    self.apply_recursive(check, entity, item, context, violations)?;
                }
            }
            Value::Map(map) => {
                for key in map.keys() {
                    let key = Value::Str(key.clone());
                    self.apply_body(check, entity, &key, context, violations)?;
                }
                for item in map.values() {
                    self.apply_recursive(check, entity, item, context, violations)?;
                }
            }
            other => self.apply_body(check, entity, other, context, violations)?,
        }
        Ok(())
    }

    /// Recursively validates a nested entity value.
    ///
    /// Null and non-entity values are treated as valid; nullness is the
    /// concern of [`NotNullConstraint`]. A nested entity that is already on
    /// this thread's validation stack is skipped, which terminates cycles.
    /// Violations found in the nested entity are attached as causes of a
    /// single violation at the delegating context.
    ///
    /// [`NotNullConstraint`]: crate::checks::NotNullConstraint
    fn validate_nested(
        &self,
        check: &Check,
        entity: Option<&EntityRef>,
        value: &Value,
        context: &Context,
        violations: &mut Vec<ConstraintViolation>,
    ) -> Result<()> {
        let Value::Entity(nested) = value else {
            return Ok(());
        };
        if currently_validating(ObjectId::of(nested)) {
            debug!(
                entity.type = %nested.type_name(),
                "nested entity already under validation, treating as valid"
            );
            return Ok(());
        }
        let causes = self.validate(nested)?;
        if !causes.is_empty() {
            let message = self.render(check, context, value);
            violations.push(
                ConstraintViolation::new(check, message, context.clone(), entity, value)
                    .with_causes(causes),
            );
        }
        Ok(())
    }

    /// Applies the property checks of another member to this value.
    ///
    /// The target type defaults to the context's type and the property name is
    /// inferred from the context when not given explicitly: parameter contexts
    /// use the parameter name, return-value contexts the operation name and
    /// property contexts the property name. Delegated checks keep the
    /// delegating context, so violations report where the value was used.
    fn delegate_to_member(
        &self,
        property: Option<&str>,
        target_type: Option<&str>,
        entity: Option<&EntityRef>,
        value: &Value,
        context: &Context,
        violations: &mut Vec<ConstraintViolation>,
    ) -> Result<()> {
        let type_name = target_type.unwrap_or_else(|| context.type_name());
        let property_name = match property {
            Some(name) => name.to_string(),
            None => {
                let inferred = match context {
                    Context::OperationParameter { .. } | Context::InitializerParameter { .. } => {
                        context.parameter_name()
                    }
                    Context::Property { .. } | Context::ReturnValue { .. } => context.member_name(),
                    _ => None,
                };
                inferred.map(str::to_string).ok_or_else(|| {
                    VigilError::configuration(format!(
                        "cannot infer a target property for member delegation at {context}"
                    ))
                })?
            }
        };

        let entry = self.registry.get(type_name)?;
        let target = entry.property(&property_name).ok_or_else(|| {
            VigilError::configuration(format!(
                "member delegation at {context} references unknown property \
                 '{property_name}' on type '{type_name}'"
            ))
        })?;
        for check in &target.checks {
            self.check_one(check, entity, value, context, violations)?;
        }
        Ok(())
    }

    /// Evaluates the check's activation condition, if any.
    fn when_active(
        &self,
        check: &Check,
        entity: Option<&EntityRef>,
        value: &Value,
        context: &Context,
    ) -> Result<bool> {
        let Some(when) = check.when() else {
            return Ok(true);
        };
        let bindings = value_bindings(entity, context, value);
        self.evaluators
            .evaluate_condition(&when.language, &when.expression, &bindings)
            .map_err(|e| {
                member_fault(
                    format!(
                        "activation condition of check '{}' failed at {context}",
                        check.name()
                    ),
                    e,
                )
            })
    }

    /// Renders the check's message template for this context and value.
    fn render(&self, check: &Check, context: &Context, value: &Value) -> String {
        render_template(check.message(), context, value, check.message_variables())
    }

    fn statics<'a>(&self, entry: &'a ValidatedType) -> Result<&'a Arc<dyn StaticAccessor>> {
        entry.statics().ok_or_else(|| {
            VigilError::configuration(format!(
                "type '{}' declares static members but no static accessor",
                entry.name()
            ))
        })
    }

    fn read_profiles(&self) -> Result<std::sync::RwLockReadGuard<'_, ProfileState>> {
        self.profiles
            .read()
            .map_err(|e| VigilError::internal(format!("failed to acquire profile lock: {e}")))
    }

    fn write_profiles(&self) -> Result<std::sync::RwLockWriteGuard<'_, ProfileState>> {
        self.profiles
            .write()
            .map_err(|e| VigilError::internal(format!("failed to acquire profile lock: {e}")))
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the bindings visible to activation conditions and formula checks.
///
/// `_this` is the validated entity, or the type name for static contexts, and
/// `_value` is the value under validation.
pub(crate) fn value_bindings(
    entity: Option<&EntityRef>,
    context: &Context,
    value: &Value,
) -> Bindings {
    let mut bindings = Bindings::new();
    let this = match entity {
        Some(entity) => Value::Entity(entity.clone()),
        None => Value::Str(context.type_name().to_string()),
    };
    bindings.insert("_this".to_string(), this);
    bindings.insert("_value".to_string(), value.clone());
    bindings
}

/// Wraps a member access or check evaluation fault.
///
/// Configuration errors describe broken wiring rather than a failed
/// evaluation and pass through unchanged.
pub(crate) fn member_fault(message: String, source: VigilError) -> VigilError {
    match source {
        VigilError::Configuration(_) => source,
        other => VigilError::validation_failed_with_source(message, Box::new(other)),
    }
}
