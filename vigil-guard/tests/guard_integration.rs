//! Contract-enforcement scenarios run through the public guard API.
//!
//! A `Counter` entity plays the role of the guarded object; its operations
//! mutate shared state so the tests can observe whether a body actually ran.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use vigil_guard::checks::RangeConstraint;
use vigil_guard::config::{
    ConfigurationBuilder, OperationConfig, PropertyConfig, TypeConfig,
};
use vigil_guard::core::{
    Check, EntityRef, ParameterChecks, PostCondition, PreCondition, Validatable, Value,
};
use vigil_guard::error::{Result, VigilError};
use vigil_guard::expr::ScriptEvaluator;
use vigil_guard::guard::{ViolationEvent, ViolationListener};
use vigil_guard::{Guard, Validator};

struct Counter {
    value: Mutex<i64>,
    invocations: AtomicUsize,
}

impl Counter {
    fn new(value: i64) -> Arc<Self> {
        Arc::new(Self {
            value: Mutex::new(value),
            invocations: AtomicUsize::new(0),
        })
    }

    fn value(&self) -> i64 {
        *self.value.lock().unwrap()
    }
}

impl Validatable for Counter {
    fn type_name(&self) -> &str {
        "Counter"
    }

    fn property(&self, name: &str) -> Result<Value> {
        match name {
            "value" => Ok(Value::Int(self.value())),
            other => Err(VigilError::configuration(format!(
                "unknown property '{other}' on 'Counter'"
            ))),
        }
    }

    fn invoke(&self, operation: &str, args: &[Value]) -> Result<Value> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let amount = args.first().and_then(Value::as_int).unwrap_or(0);
        match operation {
            "add" => {
                let mut value = self.value.lock().unwrap();
                *value += amount;
                Ok(Value::Int(*value))
            }
            "subtract" => {
                let mut value = self.value.lock().unwrap();
                *value -= amount;
                Ok(Value::Int(*value))
            }
            "set" => {
                let mut value = self.value.lock().unwrap();
                *value = amount;
                Ok(Value::Int(*value))
            }
            "read" => Ok(Value::Int(self.value())),
            other => Err(VigilError::configuration(format!(
                "unknown operation '{other}' on 'Counter'"
            ))),
        }
    }
}

fn guard_with(config: TypeConfig) -> Guard {
    let source = ConfigurationBuilder::new().configure(config).build();
    let validator = Validator::with_sources(vec![Arc::new(source)]).unwrap();
    Guard::new(Arc::new(validator))
}

fn call(guard: &Guard, counter: &Arc<Counter>, operation: &str, amount: i64) -> Result<Value> {
    let entity: EntityRef = counter.clone();
    let args = vec![Value::Int(amount)];
    let inner = counter.clone();
    let op = operation.to_string();
    guard.guard_operation(&entity, operation, &args, move || {
        inner.invoke(&op, &[Value::Int(amount)])
    })
}

#[test]
fn test_entry_violations_aggregate_across_parameters_and_formulas() {
    let config = TypeConfig::new("Counter").operation(
        OperationConfig::new("add")
            .param(
                ParameterChecks::new("amount")
                    .check(Check::rule(RangeConstraint::min(1.0)).build()),
            )
            .pre(PreCondition::new(
                ScriptEvaluator::LANGUAGE,
                "_this.value + amount >= 0",
            )),
    );
    let guard = guard_with(config);
    let counter = Counter::new(0);

    // One call trips both the parameter rule and the entry formula; the
    // caller sees everything wrong with the call at once.
    let err = call(&guard, &counter, "add", -3).unwrap_err();
    let violations = err.constraint_violations().unwrap();
    assert_eq!(violations.len(), 2);
    assert_eq!(
        violations[0].message(),
        "Counter::add() parameter 'amount' must be at least 1, was -3"
    );
    assert_eq!(violations[0].error_code(), "min");
    assert_eq!(
        violations[1].message(),
        "Counter::add() entry does not satisfy precondition '_this.value + amount >= 0'"
    );
    assert_eq!(violations[1].check_name(), "pre");

    assert_eq!(counter.value(), 0);
    assert_eq!(counter.invocations.load(Ordering::SeqCst), 0);

    // A positive amount on a deeply negative counter trips only the formula.
    let poor = Counter::new(-5);
    let err = call(&guard, &poor, "add", 1).unwrap_err();
    let violations = err.constraint_violations().unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].check_name(), "pre");
}

#[test]
fn test_broken_invariant_masks_entry_checks() {
    let config = TypeConfig::new("Counter")
        .check_invariants(true)
        .property(
            PropertyConfig::new("value").check(
                Check::rule(RangeConstraint::min(0.0))
                    .message("counter corrupted")
                    .build(),
            ),
        )
        .operation(
            OperationConfig::new("add").param(
                ParameterChecks::new("amount")
                    .check(Check::rule(RangeConstraint::min(1.0)).build()),
            ),
        );
    let guard = guard_with(config);

    // The receiver is already invalid, so the call fails on the invariant
    // alone; the parameter rule is not worth evaluating against a corrupted
    // object.
    let corrupted = Counter::new(-1);
    let err = call(&guard, &corrupted, "add", -3).unwrap_err();
    let violations = err.constraint_violations().unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].message(), "counter corrupted");
    assert_eq!(corrupted.invocations.load(Ordering::SeqCst), 0);

    // On a healthy receiver the parameter rule fires as usual.
    let healthy = Counter::new(1);
    let err = call(&guard, &healthy, "add", -3).unwrap_err();
    let violations = err.constraint_violations().unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].error_code(), "min");
}

#[test]
fn test_old_value_binding_detects_decreasing_update() {
    // Both mutators promise a strictly increasing value; only `add` with a
    // positive amount can keep that promise.
    let increasing = || {
        PostCondition::new(ScriptEvaluator::LANGUAGE, "_this.value > _old")
            .with_old("_this.value")
            .with_message("POST")
    };
    let config = TypeConfig::new("Counter")
        .operation(
            OperationConfig::new("add")
                .param(ParameterChecks::new("amount"))
                .post(increasing()),
        )
        .operation(
            OperationConfig::new("subtract")
                .param(ParameterChecks::new("amount"))
                .post(increasing()),
        );
    let guard = guard_with(config);

    let counter = Counter::new(-2);
    let err = call(&guard, &counter, "subtract", 1).unwrap_err();
    let violations = err.constraint_violations().unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].message(), "POST");
    assert_eq!(violations[0].check_name(), "post");
    // Postconditions report, they do not roll back.
    assert_eq!(counter.value(), -3);

    let counter = Counter::new(0);
    call(&guard, &counter, "add", 1).unwrap();
    assert_eq!(counter.value(), 1);
}

#[test]
fn test_exit_violations_aggregate_return_checks_and_formulas() {
    let config = TypeConfig::new("Counter").operation(
        OperationConfig::new("read")
            .return_check(Check::rule(RangeConstraint::min(0.0)).build())
            .post(PostCondition::new(ScriptEvaluator::LANGUAGE, "_returns > 0")),
    );
    let guard = guard_with(config);

    let counter = Counter::new(-7);
    let err = call(&guard, &counter, "read", 0).unwrap_err();
    let violations = err.constraint_violations().unwrap();
    assert_eq!(violations.len(), 2);
    assert_eq!(
        violations[0].context().to_string(),
        "Counter::read() return value"
    );
    assert_eq!(
        violations[1].context().to_string(),
        "Counter::read() exit"
    );
    assert_eq!(violations[1].check_name(), "post");

    let counter = Counter::new(7);
    let result = call(&guard, &counter, "read", 0).unwrap();
    assert_eq!(result.as_int(), Some(7));
}

#[test]
fn test_parameter_delegation_reuses_property_rules() {
    let config = TypeConfig::new("Counter")
        .property(
            PropertyConfig::new("value").check(Check::rule(RangeConstraint::min(0.0)).build()),
        )
        .operation(
            OperationConfig::new("set").param(
                ParameterChecks::new("new_value").check(Check::member().property("value").build()),
            ),
        );
    let guard = guard_with(config);

    let counter = Counter::new(3);
    let err = call(&guard, &counter, "set", -4).unwrap_err();
    let violations = err.constraint_violations().unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].error_code(), "min");
    assert_eq!(
        violations[0].message(),
        "Counter::set() parameter 'new_value' must be at least 0, was -4"
    );
    assert_eq!(counter.value(), 3);

    // The same rule fires with the same tail when the property itself is
    // validated.
    let counter = Counter::new(-4);
    let entity: EntityRef = counter.clone();
    let direct = guard.validator().validate(&entity).unwrap();
    assert_eq!(direct.len(), 1);
    assert_eq!(
        direct[0].message(),
        "Counter::value must be at least 0, was -4"
    );
}

struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    fn heard(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ViolationListener for RecordingListener {
    fn on_violations(&self, event: &ViolationEvent<'_>) {
        let mut events = self.events.lock().unwrap();
        for violation in event.violations {
            events.push(format!(
                "{}::{} -> {}",
                event.type_name,
                event.member,
                violation.message()
            ));
        }
    }
}

#[derive(Debug)]
struct LedgerRejected(usize);

impl std::fmt::Display for LedgerRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ledger rejected the call ({} rule(s))", self.0)
    }
}

impl std::error::Error for LedgerRejected {}

struct LedgerTranslator;

impl vigil_guard::guard::ExceptionTranslator for LedgerTranslator {
    fn translate(
        &self,
        error: &VigilError,
    ) -> Option<Box<dyn std::error::Error + Send + Sync>> {
        let violations = error.constraint_violations()?;
        Some(Box::new(LedgerRejected(violations.len())))
    }
}

#[test]
fn test_scoped_listeners_hear_raw_violations_despite_translation() {
    let config = TypeConfig::new("Counter").operation(
        OperationConfig::new("add").param(
            ParameterChecks::new("amount").check(
                Check::rule(RangeConstraint::min(1.0))
                    .message("amount must be positive")
                    .build(),
            ),
        ),
    );
    let guard = guard_with(config);

    let watched = Counter::new(0);
    let unwatched = Counter::new(0);
    let watched_entity: EntityRef = watched.clone();

    let global = RecordingListener::new();
    let scoped = RecordingListener::new();
    guard.listeners().add_global(global.clone()).unwrap();
    guard
        .listeners()
        .add_for_entity(&watched_entity, scoped.clone())
        .unwrap();
    guard.set_translator(Some(Arc::new(LedgerTranslator))).unwrap();

    let err = call(&guard, &watched, "add", 0).unwrap_err();
    match err {
        VigilError::Translated(inner) => {
            assert_eq!(inner.to_string(), "ledger rejected the call (1 rule(s))");
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = call(&guard, &unwatched, "add", 0).unwrap_err();
    assert!(matches!(err, VigilError::Translated(_)));

    // Listeners observe the untranslated violations; the per-entity listener
    // only hears calls on its entity.
    assert_eq!(
        global.heard(),
        [
            "Counter::add -> amount must be positive",
            "Counter::add -> amount must be positive"
        ]
    );
    assert_eq!(scoped.heard(), ["Counter::add -> amount must be positive"]);
}

#[test]
fn test_post_condition_toggle_bypasses_exit_checks() {
    let config = TypeConfig::new("Counter").operation(
        OperationConfig::new("subtract")
            .param(ParameterChecks::new("amount"))
            .post(
                PostCondition::new(ScriptEvaluator::LANGUAGE, "_this.value > _old")
                    .with_old("_this.value"),
            ),
    );
    let guard = guard_with(config);
    let counter = Counter::new(10);

    guard.set_post_conditions_enabled(false);
    call(&guard, &counter, "subtract", 4).unwrap();
    assert_eq!(counter.value(), 6);

    guard.set_post_conditions_enabled(true);
    let err = call(&guard, &counter, "subtract", 4).unwrap_err();
    assert!(err.is_violation());
    assert_eq!(counter.value(), 2);
}

#[test]
fn test_concurrent_guarded_calls_share_one_guard() {
    let config = TypeConfig::new("Counter").operation(
        OperationConfig::new("add").param(
            ParameterChecks::new("amount")
                .check(Check::rule(RangeConstraint::min(1.0)).build()),
        ),
    );
    let guard = Arc::new(guard_with(config));
    let counter = Counter::new(0);

    thread::scope(|scope| {
        for _ in 0..4 {
            let guard = guard.clone();
            let counter = counter.clone();
            scope.spawn(move || {
                for _ in 0..50 {
                    call(&guard, &counter, "add", 1).unwrap();
                }
                // Rejected calls on other threads leave the shared state alone.
                assert!(call(&guard, &counter, "add", 0).is_err());
            });
        }
    });

    assert_eq!(counter.value(), 200);
    assert_eq!(counter.invocations.load(Ordering::SeqCst), 200);
}
