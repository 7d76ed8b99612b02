//! Basic validation example demonstrating Vigil's core features

use std::sync::Arc;

use anyhow::Result;
use vigil_guard::checks::{LengthConstraint, NotNullConstraint, PatternConstraint, RangeConstraint};
use vigil_guard::config::{ConfigurationBuilder, PropertyConfig, TypeConfig};
use vigil_guard::core::{Check, EntityRef, Severity, Validatable, Value, ViolationReport};
use vigil_guard::Validator;

struct Customer {
    name: Option<String>,
    email: Option<String>,
    age: i64,
}

impl Validatable for Customer {
    fn type_name(&self) -> &str {
        "Customer"
    }

    fn property(&self, name: &str) -> vigil_guard::error::Result<Value> {
        match name {
            "name" => Ok(Value::from(self.name.clone())),
            "email" => Ok(Value::from(self.email.clone())),
            "age" => Ok(Value::from(self.age)),
            _ => Err(vigil_guard::error::VigilError::configuration(format!(
                "unknown property '{name}' on 'Customer'"
            ))),
        }
    }
}

fn main() -> Result<()> {
    println!("=== Vigil Basic Validation Example ===\n");

    // Step 1: Describe the checks each Customer must satisfy
    println!("Registering checks for the Customer type...");

    let source = ConfigurationBuilder::new()
        .configure(
            TypeConfig::new("Customer")
                // Check 1: names are required and reasonably sized
                .property(
                    PropertyConfig::new("name")
                        .check(Check::rule(NotNullConstraint::new()).build())
                        .check(Check::rule(LengthConstraint::between(2, 64)).build()),
                )
                // Check 2: email addresses must look like addresses
                .property(
                    PropertyConfig::new("email")
                        .check(
                            Check::rule(PatternConstraint::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")?)
                                .message("{context} must be a well-formed email address")
                                .error_code("email_format")
                                .build(),
                        ),
                )
                // Check 3: ages outside the plausible range are worth a warning
                .property(
                    PropertyConfig::new("age")
                        .check(
                            Check::rule(RangeConstraint::between(0.0, 130.0))
                                .severity(Severity::Warning)
                                .build(),
                        ),
                ),
        )
        .build();

    // Step 2: Build the validator from the configured source
    let validator = Validator::with_sources(vec![Arc::new(source)])?;
    println!("✓ Validator ready\n");

    // Step 3: A well-formed customer passes cleanly
    let good: EntityRef = Arc::new(Customer {
        name: Some("Ada Lovelace".into()),
        email: Some("ada@example.com".into()),
        age: 36,
    });

    let violations = validator.validate(&good)?;
    println!("Validating a well-formed customer...");
    println!("✓ {} violation(s) found\n", violations.len());

    // Step 4: A broken customer produces one violation per failed check
    let bad: EntityRef = Arc::new(Customer {
        name: None,
        email: Some("not-an-address".into()),
        age: 150,
    });

    println!("Validating a broken customer...");
    let report = ViolationReport::from_violations(validator.validate(&bad)?);

    println!(
        "Summary: {} error(s), {} warning(s)\n",
        report.error_count, report.warning_count
    );

    for violation in &report.violations {
        let icon = match violation.severity() {
            Severity::Warning => "⚠",
            Severity::Info => "ℹ",
            _ => "✗",
        };
        println!("{} [{}] {}", icon, violation.error_code(), violation.message());
        println!("   at: {}", violation.context());
        println!("   value: {}", violation.invalid_value().display_string());
    }

    // Step 5: Reports serialize for dashboards and structured logs
    println!("\nReport as JSON:\n{}", serde_json::to_string_pretty(&report)?);

    if report.has_errors() {
        println!("\n⚠ Some checks failed. Review the customer record.");
    } else {
        println!("\n✓ All checks passed.");
    }

    Ok(())
}
