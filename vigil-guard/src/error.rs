//! Error types for the Vigil constraint-validation library.
//!
//! This module provides the error handling strategy for the crate using
//! `thiserror` for automatic error trait implementations. All errors raised
//! by the engine and guard are represented by the `VigilError` enum.

use thiserror::Error;

use crate::core::ConstraintViolation;

/// The main error type for the Vigil library.
///
/// Three of these variants form the error taxonomy of the engine:
/// [`VigilError::Configuration`] is always fatal and never retried,
/// [`VigilError::ValidationFailed`] aborts an entire validation cycle, and
/// [`VigilError::ConstraintsViolated`] is the expected, data-dependent
/// outcome of a guarded call whose checks did not pass.
#[derive(Error, Debug)]
pub enum VigilError {
    /// A reference to an unknown member, constraint set, or evaluator
    /// language, or an otherwise invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An unexpected fault while computing a value to validate, such as a
    /// failing property accessor. Partial results of the cycle are
    /// discarded.
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Human-readable description of what was being computed
        message: String,
        /// Optional underlying error that caused the failure
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// One or more constraints were violated during a guarded call.
    ///
    /// Carries the full violation list in evaluation order.
    #[error("{} constraint violation(s): {}", .0.len(), first_message(.0))]
    ConstraintsViolated(Vec<ConstraintViolation>),

    /// A violation error remapped by an [`ExceptionTranslator`].
    ///
    /// [`ExceptionTranslator`]: crate::guard::ExceptionTranslator
    #[error("{0}")]
    Translated(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A formula failed to parse or evaluate.
    #[error("Expression error in '{expression}': {message}")]
    Expression {
        /// The offending formula text
        expression: String,
        /// Detailed error message
        message: String,
    },

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn first_message(violations: &[ConstraintViolation]) -> &str {
    violations.first().map(|v| v.message()).unwrap_or_default()
}

/// A type alias for `Result<T, VigilError>`.
///
/// This is the standard `Result` type used throughout the Vigil library.
///
/// # Examples
///
/// ```rust,ignore
/// use vigil_guard::error::Result;
///
/// fn configure_checks() -> Result<()> {
///     // configuration logic here
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, VigilError>;

impl VigilError {
    /// Creates a new configuration error with the given message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a new validation failed error with the given message.
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new validation failed error with a source error.
    pub fn validation_failed_with_source(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::ValidationFailed {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a new expression error.
    pub fn expression(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Expression {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Creates a new internal error with the given message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns the violations carried by a [`VigilError::ConstraintsViolated`]
    /// error, or `None` for any other variant.
    pub fn constraint_violations(&self) -> Option<&[ConstraintViolation]> {
        match self {
            Self::ConstraintsViolated(violations) => Some(violations),
            _ => None,
        }
    }

    /// Returns `true` if this error is the expected violation outcome
    /// rather than an engine or configuration fault.
    pub fn is_violation(&self) -> bool {
        matches!(self, Self::ConstraintsViolated(_))
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<VigilError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| {
            let base_error = e.into();
            match base_error {
                VigilError::Internal(inner) => VigilError::Internal(format!("{}: {}", msg, inner)),
                other => VigilError::Internal(format!("{}: {}", msg, other)),
            }
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let msg = f();
            let base_error = e.into();
            match base_error {
                VigilError::Internal(inner) => VigilError::Internal(format!("{}: {}", msg, inner)),
                other => VigilError::Internal(format!("{}: {}", msg, other)),
            }
        })
    }
}
