//! Bundled constraints and exclusions.
//!
//! Every constraint here follows the same null convention: a null value
//! satisfies everything except [`NotNullConstraint`]. Pair a constraint with
//! `NotNullConstraint` when absent values should fail too, or attach a
//! [`NullableExclusion`] to a parameter to suppress null rejection in
//! selected profiles.
//!
//! | constraint             | checks                                        |
//! |------------------------|-----------------------------------------------|
//! | [`NotNullConstraint`]  | value is present                              |
//! | [`LengthConstraint`]   | string/collection length against an assertion |
//! | [`RangeConstraint`]    | numeric value against bounds                  |
//! | [`PatternConstraint`]  | string against a regular expression           |
//! | [`AssertConstraint`]   | arbitrary condition formula                   |
//! | [`InstanceOfConstraint`] | entity type, including declared supertypes  |

mod assert;
mod exclusion;
mod instance_of;
mod length;
mod not_null;
mod pattern;
mod range;

pub use assert::AssertConstraint;
pub use exclusion::NullableExclusion;
pub use instance_of::InstanceOfConstraint;
pub use length::{LengthAssertion, LengthConstraint};
pub use not_null::NotNullConstraint;
pub use pattern::PatternConstraint;
pub use range::{RangeAssertion, RangeConstraint};
