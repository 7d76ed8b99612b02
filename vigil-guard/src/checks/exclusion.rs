//! Bundled check exclusions.

use crate::core::{Check, CheckExclusion, Value};

/// Suppresses null rejection on a parameter.
///
/// Attached to a parameter slot, this exclusion filters out `not_null`
/// checks before they run, so a parameter whose type-level checks demand a
/// value can still accept null at specific call sites. Like checks,
/// exclusions can be confined to profiles; an exclusion whose profiles are
/// all disabled has no effect.
///
/// # Examples
///
/// ```rust
/// use vigil_guard::checks::NullableExclusion;
/// use vigil_guard::core::ParameterChecks;
///
/// let param = ParameterChecks::new("comment").exclusion(NullableExclusion::new());
/// ```
#[derive(Debug, Clone, Default)]
pub struct NullableExclusion {
    profiles: Vec<String>,
}

impl NullableExclusion {
    /// Creates the exclusion, active in every profile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Confines the exclusion to a profile. May be called repeatedly.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profiles.push(profile.into());
        self
    }
}

impl CheckExclusion for NullableExclusion {
    fn name(&self) -> &str {
        "nullable"
    }

    fn profiles(&self) -> &[String] {
        &self.profiles
    }

    fn suppresses(&self, check: &Check, _value: &Value) -> bool {
        check.name() == "not_null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::{LengthConstraint, NotNullConstraint};

    #[test]
    fn test_suppresses_not_null_only() {
        let exclusion = NullableExclusion::new();
        let not_null = Check::rule(NotNullConstraint::new()).build();
        let length = Check::rule(LengthConstraint::min(3)).build();

        assert!(exclusion.suppresses(&not_null, &Value::Null));
        assert!(!exclusion.suppresses(&length, &Value::Null));
    }

    #[test]
    fn test_profiles_are_recorded() {
        let exclusion = NullableExclusion::new().with_profile("lenient");
        assert_eq!(exclusion.profiles(), ["lenient".to_string()]);
    }
}
