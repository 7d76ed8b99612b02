//! Core validation types for the Vigil library.
//!
//! This module provides the fundamental building blocks the engine and the
//! guard operate on:
//!
//! - **[`Value`]**: the dynamic value each property read, argument, and
//!   return value is represented as
//! - **[`Validatable`]**: the trait validated entities implement
//! - **[`Check`]**: a single rule with message template, severity,
//!   profiles, targets, and an optional "when" guard
//! - **[`Constraint`]**: the predicate behind an ordinary check
//! - **[`ConstraintViolation`]**: the record produced by a failed check
//! - **[`Context`]**: the location a check was evaluated at
//! - **[`ProfileState`]**: the activation profile toggles
//!
//! ## Architecture
//!
//! ```text
//! ValidatedType (registry entry)
//!     ├── property checks   ── Check ── Constraint
//!     ├── operation checks  ── ParameterChecks / return Checks
//!     │                        PreCondition / PostCondition
//!     ├── initializer checks
//!     └── type-level checks
//! ```
//!
//! ## Example
//!
//! ```rust
//! use vigil_guard::checks::{LengthConstraint, NotNullConstraint};
//! use vigil_guard::core::{Check, Severity};
//!
//! let required = Check::rule(NotNullConstraint::new()).build();
//! let bounded = Check::rule(LengthConstraint::max(64))
//!     .severity(Severity::Warning)
//!     .profile("strict")
//!     .build();
//!
//! assert!(required.profiles().is_empty());
//! assert_eq!(bounded.profiles(), ["strict"]);
//! ```

mod check;
mod constraint;
mod context;
mod entity;
mod profiles;
mod severity;
mod validated_type;
mod value;
mod violation;

pub use check::{
    Check, CheckBody, CheckBuilder, CheckExclusion, ConstraintTarget, Formula, ParameterChecks,
    PostCondition, PreCondition, SharedExclusion,
};
pub use constraint::{Constraint, SharedConstraint};
pub use context::Context;
pub use entity::{EntityRef, ObjectId, StaticAccessor, Validatable, WeakEntity};
pub use profiles::{ProfileState, DEFAULT_PROFILE};
pub use severity::Severity;
pub use validated_type::{
    InitializerEntry, OperationEntry, PropertyEntry, ValidatedType, Visibility,
};
pub use value::Value;
pub use violation::{CapturedValue, ConstraintViolation, ViolationReport};

pub(crate) use violation::render_template;
