//! Contract enforcement around intercepted calls.
//!
//! [`Guard`] wraps the real body of a guarded operation, static call, or
//! initializer in a two-phase protocol. An interception layer, whether a
//! hand-written wrapper type, a generated proxy, or a trait decorator, hands
//! the body to one of the `guard_*` entry points as a closure and the guard
//! decides if and when it runs:
//!
//! ```text
//! PRE    invariants on the receiver, parameter checks (minus exclusions),
//!        precondition formulas, old-value capture
//! INVOKE the supplied body closure
//! POST   invariants again, return-value checks, postcondition formulas
//! ```
//!
//! Violations found in either phase are delivered to registered
//! [`ViolationListener`]s and then raised as
//! [`VigilError::ConstraintsViolated`], optionally remapped by an
//! [`ExceptionTranslator`]. While an entity is in probe mode its guarded
//! calls stop after PRE: violations are recorded instead of raised, passing
//! calls are deferred for later replay, and the body never runs.
//!
//! Formula bindings follow the conventions of [`crate::expr`]: `_this` is the
//! receiver (or the type name for static calls), `_args` the full argument
//! list, `_returns` the produced return value, `_old` the captured old value,
//! and every configured parameter is bound by name.

mod listener;
mod probe;

pub use listener::{ListenerSet, SharedListener, ViolationEvent, ViolationListener};
pub use probe::{DeferredCall, ProbeModeRecorder};

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::LocalKey;

use tracing::{debug, instrument, warn};

use crate::core::{
    render_template, Check, ConstraintViolation, Context, EntityRef, Formula, ObjectId,
    OperationEntry, ParameterChecks, Severity, ValidatedType, Value, Visibility,
};
use crate::error::{Result, VigilError};
use crate::expr::Bindings;
use crate::validator::{member_fault, Validator};

/// Remaps the aggregate violation error a guarded call is about to raise.
///
/// Returning `None` keeps the original error.
pub trait ExceptionTranslator: Send + Sync {
    /// Maps the error, or declines.
    fn translate(&self, error: &VigilError) -> Option<Box<dyn std::error::Error + Send + Sync>>;
}

/// Per-receiver per-member keys of guard sections currently evaluating on
/// this thread.
///
/// Formula evaluation can re-enter the guard through an accessor wired back
/// into the interception layer; a section that finds its own key already
/// present skips itself instead of recursing. The three sections keep
/// separate sets so that, say, a precondition may still invoke a guarded
/// accessor whose return checks run.
type ScopeKey = (ReceiverKey, String);
type ScopeSet = RefCell<HashSet<ScopeKey>>;

thread_local! {
    static RETURN_SCOPE: ScopeSet = RefCell::new(HashSet::new());
    static PRE_SCOPE: ScopeSet = RefCell::new(HashSet::new());
    static POST_SCOPE: ScopeSet = RefCell::new(HashSet::new());
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum ReceiverKey {
    Object(ObjectId),
    Type(String),
}

struct ScopeGuard {
    scope: &'static LocalKey<ScopeSet>,
    key: ScopeKey,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.scope.with(|set| {
            set.borrow_mut().remove(&self.key);
        });
    }
}

fn enter_scope(scope: &'static LocalKey<ScopeSet>, key: ScopeKey) -> Option<ScopeGuard> {
    let entered = scope.with(|set| set.borrow_mut().insert(key.clone()));
    if entered {
        Some(ScopeGuard { scope, key })
    } else {
        None
    }
}

fn scope_key(receiver: Option<&EntityRef>, type_name: &str, member: &str) -> ScopeKey {
    let target = match receiver {
        Some(entity) => ReceiverKey::Object(ObjectId::of(entity)),
        None => ReceiverKey::Type(type_name.to_string()),
    };
    (target, member.to_string())
}

/// Enforces contracts around guarded calls.
///
/// A guard shares one [`Validator`] and is safe for concurrent use; the
/// activation toggles apply process-wide while probe sessions and re-entrancy
/// scopes stay per thread.
pub struct Guard {
    validator: Arc<Validator>,
    active: AtomicBool,
    invariants: AtomicBool,
    pre_conditions: AtomicBool,
    post_conditions: AtomicBool,
    listeners: ListenerSet,
    translator: RwLock<Option<Arc<dyn ExceptionTranslator>>>,
}

impl Guard {
    /// Creates a guard over the given validator with every feature enabled.
    pub fn new(validator: Arc<Validator>) -> Self {
        Self {
            validator,
            active: AtomicBool::new(true),
            invariants: AtomicBool::new(true),
            pre_conditions: AtomicBool::new(true),
            post_conditions: AtomicBool::new(true),
            listeners: ListenerSet::new(),
            translator: RwLock::new(None),
        }
    }

    /// Returns the validator backing this guard.
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Returns whether guarding is active at all.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Activates or deactivates guarding; deactivated guards invoke bodies
    /// directly.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    /// Returns whether automatic invariant checking is enabled.
    pub fn invariants_enabled(&self) -> bool {
        self.invariants.load(Ordering::Relaxed)
    }

    /// Enables or disables automatic invariant checking.
    ///
    /// Members explicitly marked for invariant checking are unaffected.
    pub fn set_invariants_enabled(&self, enabled: bool) {
        self.invariants.store(enabled, Ordering::Relaxed);
    }

    /// Returns whether precondition checking is enabled.
    pub fn pre_conditions_enabled(&self) -> bool {
        self.pre_conditions.load(Ordering::Relaxed)
    }

    /// Enables or disables parameter checks and precondition formulas.
    pub fn set_pre_conditions_enabled(&self, enabled: bool) {
        self.pre_conditions.store(enabled, Ordering::Relaxed);
    }

    /// Returns whether postcondition checking is enabled.
    pub fn post_conditions_enabled(&self) -> bool {
        self.post_conditions.load(Ordering::Relaxed)
    }

    /// Enables or disables return-value checks and postcondition formulas.
    pub fn set_post_conditions_enabled(&self, enabled: bool) {
        self.post_conditions.store(enabled, Ordering::Relaxed);
    }

    /// Returns the listener registrations of this guard.
    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    /// Installs or clears the exception translator.
    pub fn set_translator(&self, translator: Option<Arc<dyn ExceptionTranslator>>) -> Result<()> {
        let mut slot = self
            .translator
            .write()
            .map_err(|e| VigilError::internal(format!("failed to acquire translator lock: {e}")))?;
        *slot = translator;
        Ok(())
    }

    /// Opens a probe session for the entity on the current thread.
    ///
    /// Fails if a session is already active for this entity on this thread.
    pub fn enable_probe_mode(&self, entity: &EntityRef) -> Result<()> {
        probe::begin(entity)
    }

    /// Closes the entity's probe session and returns its recorder.
    pub fn disable_probe_mode(&self, entity: &EntityRef) -> Result<ProbeModeRecorder> {
        probe::end(entity)
    }

    /// Returns whether the entity is being probed on the current thread.
    pub fn is_probing(&self, entity: &EntityRef) -> bool {
        probe::is_active(ObjectId::of(entity))
    }

    /// Guards an instance operation call.
    ///
    /// The wrapper supplies the real body as a closure; it runs only when the
    /// PRE phase passes and no probe session is active for the receiver.
    /// Probed calls return [`Value::Null`] without invoking the body.
    #[instrument(skip_all, fields(guard.type = %receiver.type_name(), guard.member = %operation))]
    pub fn guard_operation<F>(
        &self,
        receiver: &EntityRef,
        operation: &str,
        args: &[Value],
        body: F,
    ) -> Result<Value>
    where
        F: FnOnce() -> Result<Value>,
    {
        self.guard_call(Some(receiver), receiver.type_name(), operation, args, body)
    }

    /// Guards a static operation call on the named type.
    #[instrument(skip_all, fields(guard.type = %type_name, guard.member = %operation))]
    pub fn guard_static<F>(
        &self,
        type_name: &str,
        operation: &str,
        args: &[Value],
        body: F,
    ) -> Result<Value>
    where
        F: FnOnce() -> Result<Value>,
    {
        self.guard_call(None, type_name, operation, args, body)
    }

    /// Guards an initializer call.
    ///
    /// Initializers carry parameter checks only; the constructed entity is
    /// validated through [`Validator::validate`] or invariant checking on its
    /// later guarded calls.
    #[instrument(skip_all, fields(guard.type = %type_name, guard.member = %initializer))]
    pub fn guard_initializer<F>(
        &self,
        type_name: &str,
        initializer: &str,
        args: &[Value],
        body: F,
    ) -> Result<Value>
    where
        F: FnOnce() -> Result<Value>,
    {
        if !self.is_active() {
            return body();
        }
        let entry = self.validator.registry().get(type_name)?;

        let mut violations = Vec::new();
        if self.pre_conditions_enabled() {
            if let Some(init) = entry.initializer(initializer) {
                self.check_parameter_slots(
                    &init.params,
                    None,
                    |name, index| Context::initializer_parameter(type_name, initializer, name, index),
                    args,
                    &mut violations,
                )?;
            }
        }
        if !violations.is_empty() {
            self.notify(None, type_name, initializer, &violations)?;
            return Err(self.raise(violations));
        }
        body()
    }

    fn guard_call<F>(
        &self,
        receiver: Option<&EntityRef>,
        type_name: &str,
        operation: &str,
        args: &[Value],
        body: F,
    ) -> Result<Value>
    where
        F: FnOnce() -> Result<Value>,
    {
        if !self.is_active() {
            return body();
        }
        let entry = self.validator.registry().get(type_name)?;
        let op = entry.operation(operation);

        // PRE
        let mut violations = Vec::new();
        let marked_pre = op.map(|o| o.invariants_pre).unwrap_or(false);
        if self.invariants_apply(&entry, op, marked_pre) {
            violations.extend(self.validate_invariants(receiver, type_name)?);
        }
        if self.pre_conditions_enabled() && violations.is_empty() {
            if let Some(op) = op {
                self.check_parameter_slots(
                    &op.params,
                    receiver,
                    |name, index| Context::operation_parameter(type_name, operation, name, index),
                    args,
                    &mut violations,
                )?;
                self.check_pre_conditions(op, receiver, type_name, args, &mut violations)?;
            }
        }

        let probing = receiver
            .map(|r| probe::is_active(ObjectId::of(r)))
            .unwrap_or(false);

        if !violations.is_empty() {
            self.notify(receiver, type_name, operation, &violations)?;
            if probing {
                if let Some(receiver) = receiver {
                    probe::record_violations(ObjectId::of(receiver), violations);
                }
                return Ok(Value::Null);
            }
            return Err(self.raise(violations));
        }

        if probing {
            if let Some(receiver) = receiver {
                probe::record_call(
                    ObjectId::of(receiver),
                    DeferredCall::new(receiver.clone(), operation, args.to_vec()),
                );
            }
            debug!(guard.member = %operation, "probed call deferred");
            return Ok(Value::Null);
        }

        let old_values = match op {
            Some(op) if self.post_conditions_enabled() => {
                self.capture_old_values(op, receiver, type_name, args)?
            }
            _ => Vec::new(),
        };

        // INVOKE
        let result = body()?;

        // POST
        let mut violations = Vec::new();
        let marked_post = op.map(|o| o.invariants_post).unwrap_or(false);
        if self.invariants_apply(&entry, op, marked_post) {
            violations.extend(self.validate_invariants(receiver, type_name)?);
        }
        if self.post_conditions_enabled() && violations.is_empty() {
            if let Some(op) = op {
                self.check_return_value(op, receiver, type_name, &result, &mut violations)?;
                self.check_post_conditions(
                    op,
                    receiver,
                    type_name,
                    args,
                    &result,
                    &old_values,
                    &mut violations,
                )?;
            }
        }
        if !violations.is_empty() {
            self.notify(receiver, type_name, operation, &violations)?;
            return Err(self.raise(violations));
        }

        Ok(result)
    }

    /// Decides whether invariants run for this call.
    ///
    /// Automatic checking requires the global toggle, the type's opt-in, and
    /// a public member; an explicit per-member mark overrides all three.
    fn invariants_apply(
        &self,
        entry: &ValidatedType,
        op: Option<&OperationEntry>,
        explicitly_marked: bool,
    ) -> bool {
        if explicitly_marked {
            return true;
        }
        self.invariants_enabled()
            && entry.check_invariants()
            && op.map(|o| o.visibility == Visibility::Public).unwrap_or(true)
    }

    fn validate_invariants(
        &self,
        receiver: Option<&EntityRef>,
        type_name: &str,
    ) -> Result<Vec<ConstraintViolation>> {
        match receiver {
            Some(entity) => self.validator.validate(entity),
            None => self.validator.validate_static(type_name),
        }
    }

    fn check_parameter_slots<C>(
        &self,
        slots: &[ParameterChecks],
        receiver: Option<&EntityRef>,
        make_context: C,
        args: &[Value],
        violations: &mut Vec<ConstraintViolation>,
    ) -> Result<()>
    where
        C: Fn(&str, usize) -> Context,
    {
        for (index, slot) in slots.iter().enumerate() {
            if slot.checks().is_empty() {
                continue;
            }
            let value = args.get(index).cloned().unwrap_or(Value::Null);
            let context = make_context(slot.name(), index);
            for check in slot.checks() {
                if self.is_excluded(slot, check, &value)? {
                    continue;
                }
                self.validator
                    .check_one(check, receiver, &value, &context, violations)?;
            }
        }
        Ok(())
    }

    fn is_excluded(&self, slot: &ParameterChecks, check: &Check, value: &Value) -> Result<bool> {
        for exclusion in slot.exclusions() {
            if self.validator.profiles_active(exclusion.profiles())?
                && exclusion.suppresses(check, value)
            {
                debug!(
                    exclusion.name = %exclusion.name(),
                    check.name = %check.name(),
                    "check suppressed by exclusion"
                );
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn check_pre_conditions(
        &self,
        op: &OperationEntry,
        receiver: Option<&EntityRef>,
        type_name: &str,
        args: &[Value],
        violations: &mut Vec<ConstraintViolation>,
    ) -> Result<()> {
        if op.pre_conditions.is_empty() {
            return Ok(());
        }
        let Some(_scope) = enter_scope(&PRE_SCOPE, scope_key(receiver, type_name, &op.name)) else {
            return Ok(());
        };
        let bindings = call_bindings(receiver, type_name, op, args);
        let context = Context::operation_entry(type_name, &op.name);
        let invalid = Value::List(args.to_vec());
        for pre in &op.pre_conditions {
            if !self.validator.profiles_active(pre.profiles())? {
                continue;
            }
            let holds = self.evaluate_condition(pre.formula(), &bindings, &context)?;
            if !holds {
                violations.push(condition_violation(
                    "pre",
                    pre.message(),
                    pre.error_code(),
                    pre.severity(),
                    &pre.formula().expression,
                    &context,
                    receiver,
                    &invalid,
                ));
            }
        }
        Ok(())
    }

    fn check_return_value(
        &self,
        op: &OperationEntry,
        receiver: Option<&EntityRef>,
        type_name: &str,
        result: &Value,
        violations: &mut Vec<ConstraintViolation>,
    ) -> Result<()> {
        if op.return_checks.is_empty() {
            return Ok(());
        }
        let Some(_scope) = enter_scope(&RETURN_SCOPE, scope_key(receiver, type_name, &op.name))
        else {
            return Ok(());
        };
        let context = Context::return_value(type_name, &op.name);
        for check in &op.return_checks {
            self.validator
                .check_one(check, receiver, result, &context, violations)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn check_post_conditions(
        &self,
        op: &OperationEntry,
        receiver: Option<&EntityRef>,
        type_name: &str,
        args: &[Value],
        result: &Value,
        old_values: &[Option<Value>],
        violations: &mut Vec<ConstraintViolation>,
    ) -> Result<()> {
        if op.post_conditions.is_empty() {
            return Ok(());
        }
        let Some(_scope) = enter_scope(&POST_SCOPE, scope_key(receiver, type_name, &op.name))
        else {
            return Ok(());
        };
        let base = call_bindings(receiver, type_name, op, args);
        let context = Context::operation_exit(type_name, &op.name);
        for (index, post) in op.post_conditions.iter().enumerate() {
            if !self.validator.profiles_active(post.profiles())? {
                continue;
            }
            let mut bindings = base.clone();
            bindings.insert("_returns".to_string(), result.clone());
            if post.old_formula().is_some() {
                let captured = old_values
                    .get(index)
                    .cloned()
                    .flatten()
                    .unwrap_or(Value::Null);
                bindings.insert("_old".to_string(), captured);
            }
            let holds = self.evaluate_condition(post.formula(), &bindings, &context)?;
            if !holds {
                violations.push(condition_violation(
                    "post",
                    post.message(),
                    post.error_code(),
                    post.severity(),
                    &post.formula().expression,
                    &context,
                    receiver,
                    result,
                ));
            }
        }
        Ok(())
    }

    /// Evaluates the old-value formulas of the operation's active
    /// postconditions, indexed by postcondition position.
    fn capture_old_values(
        &self,
        op: &OperationEntry,
        receiver: Option<&EntityRef>,
        type_name: &str,
        args: &[Value],
    ) -> Result<Vec<Option<Value>>> {
        let mut captured = vec![None; op.post_conditions.len()];
        if op.post_conditions.iter().all(|p| p.old_formula().is_none()) {
            return Ok(captured);
        }
        let bindings = call_bindings(receiver, type_name, op, args);
        let context = Context::operation_entry(type_name, &op.name);
        for (index, post) in op.post_conditions.iter().enumerate() {
            let Some(old) = post.old_formula() else {
                continue;
            };
            if !self.validator.profiles_active(post.profiles())? {
                continue;
            }
            let value = self
                .validator
                .evaluators()
                .evaluate(&old.language, &old.expression, &bindings)
                .map_err(|e| member_fault(format!("old-value capture failed at {context}"), e))?;
            captured[index] = Some(value);
        }
        Ok(captured)
    }

    fn evaluate_condition(
        &self,
        formula: &Formula,
        bindings: &Bindings,
        context: &Context,
    ) -> Result<bool> {
        self.validator
            .evaluators()
            .evaluate_condition(&formula.language, &formula.expression, bindings)
            .map_err(|e| member_fault(format!("condition evaluation failed at {context}"), e))
    }

    fn notify(
        &self,
        receiver: Option<&EntityRef>,
        type_name: &str,
        member: &str,
        violations: &[ConstraintViolation],
    ) -> Result<()> {
        warn!(
            guard.type = %type_name,
            guard.member = %member,
            violations.count = violations.len(),
            "guarded call failed validation"
        );
        let event = ViolationEvent {
            entity: receiver,
            type_name,
            member,
            violations,
        };
        self.listeners.notify(&event)
    }

    fn raise(&self, violations: Vec<ConstraintViolation>) -> VigilError {
        let error = VigilError::ConstraintsViolated(violations);
        if let Ok(translator) = self.translator.read() {
            if let Some(translator) = translator.as_ref() {
                if let Some(mapped) = translator.translate(&error) {
                    return VigilError::Translated(mapped);
                }
            }
        }
        error
    }
}

/// Builds the bindings for pre/post formulas and old-value capture.
fn call_bindings(
    receiver: Option<&EntityRef>,
    type_name: &str,
    op: &OperationEntry,
    args: &[Value],
) -> Bindings {
    let mut bindings = Bindings::new();
    let this = match receiver {
        Some(entity) => Value::Entity(entity.clone()),
        None => Value::Str(type_name.to_string()),
    };
    bindings.insert("_this".to_string(), this);
    bindings.insert("_args".to_string(), Value::List(args.to_vec()));
    for (index, slot) in op.params.iter().enumerate() {
        let value = args.get(index).cloned().unwrap_or(Value::Null);
        bindings.insert(slot.name().to_string(), value);
    }
    bindings
}

#[allow(clippy::too_many_arguments)]
fn condition_violation(
    kind: &str,
    template: &str,
    error_code: &str,
    severity: Severity,
    expression: &str,
    context: &Context,
    entity: Option<&EntityRef>,
    invalid: &Value,
) -> ConstraintViolation {
    let mut variables = BTreeMap::new();
    variables.insert("expression".to_string(), expression.to_string());
    let message = render_template(template, context, invalid, &variables);
    ConstraintViolation::from_parts(
        kind,
        message,
        template,
        error_code,
        severity,
        context.clone(),
        entity,
        invalid,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use super::*;
    use crate::checks::{NotNullConstraint, NullableExclusion, RangeConstraint};
    use crate::config::{
        ConfigurationBuilder, InitializerConfig, OperationConfig, PropertyConfig, TypeConfig,
    };
    use crate::core::{PreCondition, Validatable};
    use crate::expr::ScriptEvaluator;

    struct Wallet {
        balance: Mutex<i64>,
        writes: AtomicUsize,
    }

    impl Wallet {
        fn new(balance: i64) -> Arc<Self> {
            Arc::new(Self {
                balance: Mutex::new(balance),
                writes: AtomicUsize::new(0),
            })
        }

        fn balance(&self) -> i64 {
            *self.balance.lock().unwrap()
        }
    }

    impl Validatable for Wallet {
        fn type_name(&self) -> &str {
            "Wallet"
        }

        fn property(&self, name: &str) -> Result<Value> {
            match name {
                "balance" => Ok(Value::Int(self.balance())),
                other => Err(VigilError::configuration(format!(
                    "unknown property '{other}' on 'Wallet'"
                ))),
            }
        }

        fn invoke(&self, operation: &str, args: &[Value]) -> Result<Value> {
            match operation {
                "deposit" => {
                    let amount = args.first().and_then(Value::as_int).unwrap_or(0);
                    *self.balance.lock().unwrap() += amount;
                    self.writes.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::Null)
                }
                other => Err(VigilError::configuration(format!(
                    "unknown operation '{other}' on 'Wallet'"
                ))),
            }
        }
    }

    fn deposit(guard: &Guard, wallet: &Arc<Wallet>, amount: i64) -> Result<Value> {
        let entity: EntityRef = wallet.clone();
        let args = vec![Value::Int(amount)];
        let inner = wallet.clone();
        guard.guard_operation(&entity, "deposit", &args, move || {
            inner.invoke("deposit", &[Value::Int(amount)])
        })
    }

    fn guard_with(config: TypeConfig) -> Guard {
        let source = ConfigurationBuilder::new().configure(config).build();
        let validator = Validator::with_sources(vec![Arc::new(source)]).unwrap();
        Guard::new(Arc::new(validator))
    }

    fn deposit_config() -> TypeConfig {
        TypeConfig::new("Wallet").operation(
            OperationConfig::new("deposit").param(
                ParameterChecks::new("amount").check(
                    Check::rule(RangeConstraint::min(1.0))
                        .message("deposit amount must be positive")
                        .build(),
                ),
            ),
        )
    }

    #[test]
    fn test_precondition_violation_blocks_the_body() {
        let guard = guard_with(deposit_config());
        let wallet = Wallet::new(10);

        let err = deposit(&guard, &wallet, -5).unwrap_err();
        match err {
            VigilError::ConstraintsViolated(violations) => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].message(), "deposit amount must be positive");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(wallet.balance(), 10);
        assert_eq!(wallet.writes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_valid_call_runs_the_body() {
        let guard = guard_with(deposit_config());
        let wallet = Wallet::new(10);

        deposit(&guard, &wallet, 5).unwrap();
        assert_eq!(wallet.balance(), 15);
        assert_eq!(wallet.writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deactivated_guard_bypasses_checks() {
        let guard = guard_with(deposit_config());
        guard.set_active(false);
        let wallet = Wallet::new(10);

        deposit(&guard, &wallet, -5).unwrap();
        assert_eq!(wallet.balance(), 5);
    }

    #[test]
    fn test_disabled_preconditions_skip_parameter_checks() {
        let guard = guard_with(deposit_config());
        guard.set_pre_conditions_enabled(false);
        let wallet = Wallet::new(10);

        deposit(&guard, &wallet, -5).unwrap();
        assert_eq!(wallet.balance(), 5);
    }

    #[test]
    fn test_exclusion_suppresses_parameter_check() {
        let config = TypeConfig::new("Wallet").operation(
            OperationConfig::new("deposit").param(
                ParameterChecks::new("amount")
                    .check(Check::rule(NotNullConstraint).build())
                    .exclusion(NullableExclusion::new()),
            ),
        );
        let guard = guard_with(config);
        let wallet = Wallet::new(10);

        let entity: EntityRef = wallet.clone();
        let inner = wallet.clone();
        guard
            .guard_operation(&entity, "deposit", &[Value::Null], move || {
                inner.invoke("deposit", &[Value::Null])
            })
            .unwrap();
        assert_eq!(wallet.writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pre_formula_sees_receiver_and_parameters() {
        let config = TypeConfig::new("Wallet").operation(
            OperationConfig::new("deposit")
                .param(ParameterChecks::new("amount"))
                .pre(
                    PreCondition::new(ScriptEvaluator::LANGUAGE, "_this.balance + amount >= 0")
                        .with_message("balance must stay non-negative"),
                ),
        );
        let guard = guard_with(config);
        let wallet = Wallet::new(10);

        deposit(&guard, &wallet, -4).unwrap();
        assert_eq!(wallet.balance(), 6);

        let err = deposit(&guard, &wallet, -7).unwrap_err();
        match err {
            VigilError::ConstraintsViolated(violations) => {
                assert_eq!(violations[0].message(), "balance must stay non-negative");
                assert_eq!(violations[0].check_name(), "pre");
                assert_eq!(
                    violations[0].context().to_string(),
                    "Wallet::deposit() entry"
                );
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(wallet.balance(), 6);
    }

    #[test]
    fn test_invariants_guard_the_receiver() {
        let config = TypeConfig::new("Wallet")
            .check_invariants(true)
            .property(
                PropertyConfig::new("balance").check(
                    Check::rule(RangeConstraint::min(0.0))
                        .message("balance corrupted")
                        .build(),
                ),
            )
            .operation(OperationConfig::new("deposit").param(ParameterChecks::new("amount")));
        let guard = guard_with(config);

        // Invariants hold, call proceeds and holds afterwards.
        let wallet = Wallet::new(5);
        deposit(&guard, &wallet, 3).unwrap();
        assert_eq!(wallet.balance(), 8);

        // A call that leaves the receiver invalid fails in POST.
        let err = deposit(&guard, &wallet, -20).unwrap_err();
        match err {
            VigilError::ConstraintsViolated(violations) => {
                assert_eq!(violations[0].message(), "balance corrupted");
            }
            other => panic!("unexpected error: {other}"),
        }
        // The body already ran; POST reports, it does not roll back.
        assert_eq!(wallet.balance(), -12);

        // A call on an already-invalid receiver fails in PRE.
        let err = deposit(&guard, &wallet, 1).unwrap_err();
        assert!(matches!(err, VigilError::ConstraintsViolated(_)));
        assert_eq!(wallet.balance(), -12);
    }

    #[test]
    fn test_invariants_skip_non_public_members() {
        let config = TypeConfig::new("Wallet")
            .check_invariants(true)
            .property(
                PropertyConfig::new("balance")
                    .check(Check::rule(RangeConstraint::min(0.0)).build()),
            )
            .operation(
                OperationConfig::new("deposit")
                    .visibility(Visibility::Private)
                    .param(ParameterChecks::new("amount")),
            );
        let guard = guard_with(config);

        let wallet = Wallet::new(-3);
        deposit(&guard, &wallet, 1).unwrap();
        assert_eq!(wallet.balance(), -2);
    }

    #[test]
    fn test_disabled_invariants_still_run_for_marked_members() {
        let config = TypeConfig::new("Wallet")
            .check_invariants(true)
            .property(
                PropertyConfig::new("balance")
                    .check(Check::rule(RangeConstraint::min(0.0)).build()),
            )
            .operation(
                OperationConfig::new("deposit")
                    .param(ParameterChecks::new("amount"))
                    .invariants(true, false),
            );
        let guard = guard_with(config);
        guard.set_invariants_enabled(false);

        let wallet = Wallet::new(-3);
        let err = deposit(&guard, &wallet, 1).unwrap_err();
        assert!(matches!(err, VigilError::ConstraintsViolated(_)));
        assert_eq!(wallet.balance(), -3);
    }

    #[test]
    fn test_return_value_checks_run_in_post() {
        struct Meter;

        impl Validatable for Meter {
            fn type_name(&self) -> &str {
                "Meter"
            }

            fn property(&self, _name: &str) -> Result<Value> {
                Ok(Value::Null)
            }

            fn invoke(&self, operation: &str, _args: &[Value]) -> Result<Value> {
                match operation {
                    "read" => Ok(Value::Int(-1)),
                    other => Err(VigilError::configuration(format!(
                        "unknown operation '{other}'"
                    ))),
                }
            }
        }

        let config = TypeConfig::new("Meter").operation(
            OperationConfig::new("read").return_check(
                Check::rule(RangeConstraint::min(0.0))
                    .message("meter cannot go backwards")
                    .build(),
            ),
        );
        let guard = guard_with(config);

        let entity: EntityRef = Arc::new(Meter);
        let inner = entity.clone();
        let err = guard
            .guard_operation(&entity, "read", &[], move || inner.invoke("read", &[]))
            .unwrap_err();
        match err {
            VigilError::ConstraintsViolated(violations) => {
                assert_eq!(violations[0].message(), "meter cannot go backwards");
                assert_eq!(
                    violations[0].context().to_string(),
                    "Meter::read() return value"
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_probe_mode_defers_valid_calls() {
        let guard = guard_with(deposit_config());
        let wallet = Wallet::new(10);
        let entity: EntityRef = wallet.clone();

        guard.enable_probe_mode(&entity).unwrap();
        assert!(guard.is_probing(&entity));

        deposit(&guard, &wallet, 5).unwrap();
        deposit(&guard, &wallet, 7).unwrap();
        assert_eq!(wallet.balance(), 10);
        assert_eq!(wallet.writes.load(Ordering::SeqCst), 0);

        let recorder = guard.disable_probe_mode(&entity).unwrap();
        assert!(!recorder.has_violations());
        assert_eq!(recorder.deferred_calls().len(), 2);

        recorder.commit().unwrap();
        assert_eq!(wallet.balance(), 22);
        assert_eq!(wallet.writes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_probe_mode_records_violations_without_raising() {
        let guard = guard_with(deposit_config());
        let wallet = Wallet::new(10);
        let entity: EntityRef = wallet.clone();

        guard.enable_probe_mode(&entity).unwrap();
        deposit(&guard, &wallet, -1).unwrap();
        deposit(&guard, &wallet, -2).unwrap();
        let recorder = guard.disable_probe_mode(&entity).unwrap();

        assert_eq!(recorder.violations().len(), 2);
        assert!(recorder.deferred_calls().is_empty());
        assert_eq!(wallet.balance(), 10);

        let err = recorder.commit().unwrap_err();
        assert!(matches!(err, VigilError::ConstraintsViolated(_)));
    }

    #[test]
    fn test_listener_hears_guard_violations() {
        struct Tape {
            heard: Mutex<Vec<String>>,
        }

        impl ViolationListener for Tape {
            fn on_violations(&self, event: &ViolationEvent<'_>) {
                let mut heard = self.heard.lock().unwrap();
                for violation in event.violations {
                    heard.push(format!("{}: {}", event.member, violation.message()));
                }
            }
        }

        let guard = guard_with(deposit_config());
        let tape = Arc::new(Tape {
            heard: Mutex::new(Vec::new()),
        });
        guard.listeners().add_global(tape.clone()).unwrap();

        let wallet = Wallet::new(10);
        let _ = deposit(&guard, &wallet, -5);

        let heard = tape.heard.lock().unwrap();
        assert_eq!(heard.len(), 1);
        assert_eq!(heard[0], "deposit: deposit amount must be positive");
    }

    #[test]
    fn test_translator_remaps_the_aggregate() {
        #[derive(Debug)]
        struct DomainError(usize);

        impl std::fmt::Display for DomainError {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "domain rejected {} rules", self.0)
            }
        }

        impl std::error::Error for DomainError {}

        struct ToDomain;

        impl ExceptionTranslator for ToDomain {
            fn translate(
                &self,
                error: &VigilError,
            ) -> Option<Box<dyn std::error::Error + Send + Sync>> {
                match error {
                    VigilError::ConstraintsViolated(violations) => {
                        Some(Box::new(DomainError(violations.len())))
                    }
                    _ => None,
                }
            }
        }

        let guard = guard_with(deposit_config());
        guard.set_translator(Some(Arc::new(ToDomain))).unwrap();

        let wallet = Wallet::new(10);
        let err = deposit(&guard, &wallet, -5).unwrap_err();
        match err {
            VigilError::Translated(inner) => {
                assert_eq!(inner.to_string(), "domain rejected 1 rules");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_static_call_binds_the_type_name() {
        let config = TypeConfig::new("Wallet").operation(
            OperationConfig::new("mint")
                .static_member()
                .param(ParameterChecks::new("amount"))
                .pre(
                    PreCondition::new(ScriptEvaluator::LANGUAGE, "_this == \"Wallet\" && amount > 0")
                        .with_message("static mint rejected"),
                ),
        );
        let guard = guard_with(config);

        guard
            .guard_static("Wallet", "mint", &[Value::Int(3)], || Ok(Value::Int(3)))
            .unwrap();

        let err = guard
            .guard_static("Wallet", "mint", &[Value::Int(0)], || Ok(Value::Int(0)))
            .unwrap_err();
        assert!(matches!(err, VigilError::ConstraintsViolated(_)));
    }

    #[test]
    fn test_initializer_parameters_are_checked() {
        let config = TypeConfig::new("Wallet").initializer(
            InitializerConfig::new("new").param(
                ParameterChecks::new("opening_balance").check(
                    Check::rule(RangeConstraint::min(0.0))
                        .message("opening balance cannot be negative")
                        .build(),
                ),
            ),
        );
        let guard = guard_with(config);

        let built = guard
            .guard_initializer("Wallet", "new", &[Value::Int(5)], || {
                Ok(Value::Entity(Wallet::new(5) as EntityRef))
            })
            .unwrap();
        assert!(built.is_entity());

        let err = guard
            .guard_initializer("Wallet", "new", &[Value::Int(-5)], || {
                Ok(Value::Entity(Wallet::new(-5) as EntityRef))
            })
            .unwrap_err();
        match err {
            VigilError::ConstraintsViolated(violations) => {
                assert_eq!(
                    violations[0].message(),
                    "opening balance cannot be negative"
                );
                assert_eq!(
                    violations[0].context().to_string(),
                    "Wallet::new() parameter 'opening_balance'"
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unconfigured_operation_only_checks_invariants() {
        let config = TypeConfig::new("Wallet").check_invariants(true).property(
            PropertyConfig::new("balance").check(Check::rule(RangeConstraint::min(0.0)).build()),
        );
        let guard = guard_with(config);
        let wallet = Wallet::new(4);

        deposit(&guard, &wallet, 1).unwrap();
        assert_eq!(wallet.balance(), 5);

        let err = deposit(&guard, &wallet, -9).unwrap_err();
        assert!(matches!(err, VigilError::ConstraintsViolated(_)));
    }
}
