//! Contract enforcement example showing guarded calls, listeners, and probe mode

use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing::{info, warn};
use vigil_guard::checks::RangeConstraint;
use vigil_guard::config::{ConfigurationBuilder, OperationConfig, PropertyConfig, TypeConfig};
use vigil_guard::core::{
    Check, EntityRef, ParameterChecks, PostCondition, PreCondition, Validatable, Value,
};
use vigil_guard::expr::ScriptEvaluator;
use vigil_guard::guard::{ViolationEvent, ViolationListener};
use vigil_guard::logging::{init_logging, LoggingConfig};
use vigil_guard::{Guard, Validator, VigilError};

/// Warehouse stock level with contracts on every mutation.
struct Inventory {
    on_hand: Mutex<i64>,
}

impl Inventory {
    fn new(on_hand: i64) -> Arc<Self> {
        Arc::new(Self {
            on_hand: Mutex::new(on_hand),
        })
    }
}

impl Validatable for Inventory {
    fn type_name(&self) -> &str {
        "Inventory"
    }

    fn property(&self, name: &str) -> vigil_guard::error::Result<Value> {
        match name {
            "on_hand" => Ok(Value::from(*self.on_hand.lock().unwrap())),
            _ => Err(VigilError::configuration(format!(
                "unknown property '{name}' on 'Inventory'"
            ))),
        }
    }

    fn invoke(&self, operation: &str, args: &[Value]) -> vigil_guard::error::Result<Value> {
        let amount = args
            .first()
            .and_then(Value::as_int)
            .ok_or_else(|| VigilError::configuration("amount must be an integer"))?;
        let mut on_hand = self.on_hand.lock().unwrap();
        match operation {
            "reserve" => {
                *on_hand -= amount;
                Ok(Value::from(*on_hand))
            }
            "restock" => {
                *on_hand += amount;
                Ok(Value::from(*on_hand))
            }
            other => Err(VigilError::configuration(format!(
                "operation '{other}' is not implemented on 'Inventory'"
            ))),
        }
    }
}

/// Forwards every violation to the tracing pipeline.
struct AlertListener;

impl ViolationListener for AlertListener {
    fn on_violations(&self, event: &ViolationEvent<'_>) {
        for violation in event.violations {
            warn!(
                type_name = event.type_name,
                member = event.member,
                "contract violated: {}",
                violation.message()
            );
        }
    }
}

/// Contracts for the Inventory type:
/// - the stock count must never go negative (invariant)
/// - reservations take a positive amount no larger than the current stock
/// - a reservation removes exactly the requested amount (postcondition)
fn inventory_contracts() -> TypeConfig {
    TypeConfig::new("Inventory")
        .check_invariants(true)
        .property(
            PropertyConfig::new("on_hand").check(
                Check::rule(RangeConstraint::min(0.0))
                    .message("{context} must never go negative, was {invalidValue}")
                    .build(),
            ),
        )
        .operation(
            OperationConfig::new("reserve")
                .param(
                    ParameterChecks::new("amount")
                        .check(Check::rule(RangeConstraint::min(1.0)).build()),
                )
                .pre(
                    PreCondition::new(ScriptEvaluator::LANGUAGE, "_this.on_hand >= amount")
                        .with_message("cannot reserve more than is on hand"),
                )
                .post(
                    PostCondition::new(
                        ScriptEvaluator::LANGUAGE,
                        "_this.on_hand == _old - amount",
                    )
                    .with_old("_this.on_hand")
                    .with_message("a reservation must remove exactly the requested amount"),
                ),
        )
        .operation(
            OperationConfig::new("restock").param(
                ParameterChecks::new("amount")
                    .check(Check::rule(RangeConstraint::min(1.0)).build()),
            ),
        )
}

fn reserve(guard: &Guard, inventory: &Arc<Inventory>, amount: i64) -> vigil_guard::Result<Value> {
    let entity: EntityRef = inventory.clone();
    let receiver = Arc::clone(inventory);
    guard.guard_operation(&entity, "reserve", &[Value::from(amount)], move || {
        receiver.invoke("reserve", &[Value::from(amount)])
    })
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::development())?;
    info!("starting guarded operations example");

    println!("=== Vigil Guarded Operations Example ===\n");

    // Step 1: Build a validator from the contracts and wrap it in a guard
    let source = ConfigurationBuilder::new()
        .configure(inventory_contracts())
        .build();
    let validator = Validator::with_sources(vec![Arc::new(source)])?;
    let guard = Guard::new(Arc::new(validator));
    guard.listeners().add_global(Arc::new(AlertListener))?;
    println!("✓ Guard ready\n");

    let warehouse = Inventory::new(10);

    // Step 2: A reservation within stock goes through
    let remaining = reserve(&guard, &warehouse, 4)?;
    println!("Reserved 4 units, {remaining} remaining");

    // Step 3: Reserving more than is on hand is rejected before the body runs
    println!("\nReserving 100 units...");
    match reserve(&guard, &warehouse, 100) {
        Err(VigilError::ConstraintsViolated(violations)) => {
            println!("✗ Rejected with {} violation(s):", violations.len());
            for violation in &violations {
                println!("   {}", violation.message());
            }
        }
        other => anyhow::bail!("expected a contract rejection, got {other:?}"),
    }

    let entity: EntityRef = warehouse.clone();
    println!(
        "Stock is untouched: {} units",
        entity.property("on_hand")?.as_int().unwrap_or(0)
    );

    // Step 4: Probe a batch of reservations without applying any of them
    println!("\nProbing a batch of reservations...");
    guard.enable_probe_mode(&entity)?;

    for amount in [2, 3] {
        let placeholder = reserve(&guard, &warehouse, amount)?;
        println!("   probed reserve({amount}) -> {placeholder} (deferred)");
    }

    let recorder = guard.disable_probe_mode(&entity)?;
    println!(
        "Session recorded {} deferred call(s), {} violation(s)",
        recorder.deferred_calls().len(),
        recorder.violations().len()
    );

    // Step 5: Committing a clean session replays the calls for real
    recorder.commit()?;
    println!(
        "✓ Committed; stock is now {} units",
        entity.property("on_hand")?.as_int().unwrap_or(0)
    );

    info!("example finished");
    Ok(())
}
