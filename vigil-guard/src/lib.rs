//! # Vigil - Object Validation and Contract Enforcement for Rust
//!
//! Vigil is a declarative validation library. Constraints are attached to
//! types through configuration sources rather than scattered through
//! application code, then evaluated against live objects to produce
//! structured violation reports. On top of the validation engine sits a
//! contract runtime that guards operations with preconditions,
//! postconditions, and class invariants.
//!
//! ## Overview
//!
//! An application exposes its objects to Vigil through the [`Validatable`]
//! trait and describes the checks for each type with a
//! [`ConfigurationSource`]. Validation walks the configured type and its
//! declared supertypes, reads properties and accessor operations, and
//! collects one [`ConstraintViolation`] per failed check. Nothing is thrown
//! and nothing stops early; the caller decides what a non-empty report
//! means.
//!
//! [`Validatable`]: core::Validatable
//! [`ConfigurationSource`]: config::ConfigurationSource
//! [`ConstraintViolation`]: core::ConstraintViolation
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use vigil_guard::checks::{LengthConstraint, NotNullConstraint};
//! use vigil_guard::config::{ConfigurationBuilder, PropertyConfig, TypeConfig};
//! use vigil_guard::core::{Check, Validatable, Value};
//! use vigil_guard::error::Result;
//! use vigil_guard::Validator;
//!
//! struct Account {
//!     owner: Option<String>,
//! }
//!
//! impl Validatable for Account {
//!     fn type_name(&self) -> &str {
//!         "Account"
//!     }
//!
//!     fn property(&self, name: &str) -> Result<Value> {
//!         match name {
//!             "owner" => Ok(self.owner.clone().map(Value::Str).unwrap_or(Value::Null)),
//!             other => Err(vigil_guard::VigilError::configuration(format!(
//!                 "unknown property '{other}'"
//!             ))),
//!         }
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let source = ConfigurationBuilder::new()
//!     .configure(
//!         TypeConfig::new("Account").property(
//!             PropertyConfig::new("owner")
//!                 .check(Check::rule(NotNullConstraint).build())
//!                 .check(Check::rule(LengthConstraint::between(2, 64)).build()),
//!         ),
//!     )
//!     .build();
//!
//! let validator = Validator::with_sources(vec![Arc::new(source)])?;
//!
//! let account: Arc<dyn Validatable> = Arc::new(Account { owner: None });
//! let violations = validator.validate(&account)?;
//! assert_eq!(violations.len(), 1);
//! assert_eq!(violations[0].message(), "Account::owner must not be null");
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Features
//!
//! ### Declarative Constraints
//!
//! - **Built-in checks**: not-null, numeric range, string and collection
//!   length, regular expressions, type membership, scripted assertions
//! - **Constraint targets**: apply a check to a container, to map keys or
//!   values, or recursively through nested collections
//! - **Nested validation**: mark a property to validate the object it
//!   references, with cycle detection across the object graph
//! - **Constraint sets**: name a reusable bundle of checks once and
//!   reference it from any property
//! - **Severity levels**: violations carry a severity and an error code so
//!   callers can triage reports
//!
//! ### Contracts for Guarded Operations
//!
//! The [`Guard`] wraps operation calls in a pre/post protocol: parameter
//! checks and precondition formulas run before the body, invariants and
//! postconditions after it, with `_old` values captured in between.
//!
//! ```rust,ignore
//! let guard = Guard::new(Arc::new(validator));
//!
//! // Inside a wrapper, proxy, or macro-generated shim:
//! guard.guard_operation(&wallet, "deposit", &[Value::Int(amount)], || {
//!     wallet.raw_deposit(amount)
//! })?;
//! ```
//!
//! Violations notify registered listeners and surface as
//! [`VigilError::ConstraintsViolated`]; an exception translator can remap
//! them at the boundary. Probe mode records violations and defers state
//! changes so that a whole call sequence can be vetted before any of it is
//! applied.
//!
//! ### Profiles
//!
//! Every check can belong to one or more named profiles, toggled at runtime
//! per validator:
//!
//! ```rust
//! use vigil_guard::Validator;
//!
//! let validator = Validator::new();
//! validator.disable_profile("expensive-checks")?;
//! assert!(!validator.is_profile_enabled("expensive-checks")?);
//! # Ok::<(), vigil_guard::VigilError>(())
//! ```
//!
//! ### Expression Language
//!
//! When-clauses, preconditions, and postconditions are formulas evaluated
//! against named bindings (`_this`, `_value`, `_args`, `_returns`, `_old`,
//! and the declared parameter names). The built-in [`ScriptEvaluator`]
//! covers comparisons, boolean logic, arithmetic, and property access;
//! other languages can be plugged in through the [`ExpressionEvaluator`]
//! trait.
//!
//! [`Guard`]: guard::Guard
//! [`VigilError::ConstraintsViolated`]: error::VigilError::ConstraintsViolated
//! [`ScriptEvaluator`]: expr::ScriptEvaluator
//! [`ExpressionEvaluator`]: expr::ExpressionEvaluator
//!
//! ## Architecture
//!
//! - **`core`**: the value model, validation contexts, checks, violations,
//!   and the `Validatable` trait
//! - **`checks`**: built-in constraint implementations
//! - **`config`**: configuration sources and the fluent builder
//! - **`registry`**: compiled, cached per-type check storage
//! - **`expr`**: the expression language and evaluator registry
//! - **`validator`**: the validation walk
//! - **`guard`**: contract enforcement, probe mode, violation listeners
//! - **`logging`**: `tracing` subscriber setup

pub mod checks;
pub mod config;
pub mod core;
pub mod error;
pub mod expr;
pub mod guard;
pub mod logging;
pub mod prelude;
pub mod registry;
pub mod validator;

pub use error::{Result, VigilError};
pub use guard::Guard;
pub use validator::Validator;
