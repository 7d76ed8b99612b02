//! Violation severity levels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The severity of a constraint check.
///
/// Every check carries a severity that is copied onto the violations it
/// produces, allowing callers to categorize failures by their impact.
/// Severities are ordered: Error > Warning > Info.
///
/// # Usage Guidelines
///
/// - **Error**: Use for contract breaches that must never reach production
///   state, such as failed invariants or rejected operation arguments.
///
/// - **Warning**: Use for rules worth surfacing that should not abort the
///   caller, typically consumed through listeners rather than raised.
///
/// - **Info**: Use for advisory rules whose violations are collected for
///   diagnostics only.
///
/// # Examples
///
/// ```rust
/// use vigil_guard::core::{Check, Severity};
/// use vigil_guard::checks::NotNullConstraint;
///
/// let check = Check::rule(NotNullConstraint::new())
///     .severity(Severity::Warning)
///     .build();
/// assert_eq!(check.severity(), Severity::Warning);
/// ```
///
/// # Comparison
///
/// ```rust
/// use vigil_guard::core::Severity;
///
/// assert!(Severity::Error > Severity::Warning);
/// assert!(Severity::Warning > Severity::Info);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational severity for advisory rules
    Info = 0,
    /// Warning severity for rules that flag but should not abort
    Warning = 1,
    /// Error severity for contract breaches
    #[default]
    Error = 2,
}

impl Severity {
    /// Returns the string representation of the severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    /// Checks if this severity is at least as severe as another.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use vigil_guard::core::Severity;
    ///
    /// assert!(Severity::Error.is_at_least(Severity::Warning));
    /// assert!(Severity::Warning.is_at_least(Severity::Warning));
    /// assert!(!Severity::Info.is_at_least(Severity::Error));
    /// ```
    pub fn is_at_least(&self, other: Severity) -> bool {
        *self >= other
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
        assert!(Severity::Error > Severity::Info);
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Info.to_string(), "info");
        assert_eq!(Severity::Warning.to_string(), "warning");
        assert_eq!(Severity::Error.to_string(), "error");
    }

    #[test]
    fn test_severity_default_is_error() {
        assert_eq!(Severity::default(), Severity::Error);
    }

    #[test]
    fn test_severity_is_at_least() {
        assert!(Severity::Error.is_at_least(Severity::Info));
        assert!(Severity::Error.is_at_least(Severity::Error));
        assert!(Severity::Warning.is_at_least(Severity::Info));
        assert!(!Severity::Warning.is_at_least(Severity::Error));
        assert!(!Severity::Info.is_at_least(Severity::Warning));
    }

    #[test]
    fn test_severity_serde() {
        let json = serde_json::to_string(&Severity::Error).unwrap();
        assert_eq!(json, "\"error\"");

        let severity: Severity = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(severity, Severity::Warning);
    }
}
