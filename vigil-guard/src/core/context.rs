//! Context paths describing where a check was evaluated.

use std::fmt;

use serde::Serialize;

/// The location within an entity or call signature at which a check ran.
///
/// Rendered contexts replace the `{context}` placeholder of message
/// templates, so violation messages can point at the exact member.
///
/// # Examples
///
/// ```rust
/// use vigil_guard::core::Context;
///
/// let ctx = Context::property("Account", "owner");
/// assert_eq!(ctx.to_string(), "Account::owner");
///
/// let ctx = Context::operation_parameter("Account", "deposit", "amount", 0);
/// assert_eq!(ctx.to_string(), "Account::deposit() parameter 'amount'");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Context {
    /// A type-level check evaluated against the entity itself.
    Type {
        /// Name of the validated type
        type_name: String,
    },
    /// A property of a type.
    Property {
        /// Name of the declaring type
        type_name: String,
        /// Name of the property
        property: String,
    },
    /// Entry of an operation, used for precondition violations.
    OperationEntry {
        /// Name of the declaring type
        type_name: String,
        /// Name of the operation
        operation: String,
    },
    /// Exit of an operation, used for postcondition violations.
    OperationExit {
        /// Name of the declaring type
        type_name: String,
        /// Name of the operation
        operation: String,
    },
    /// A parameter of an operation.
    OperationParameter {
        /// Name of the declaring type
        type_name: String,
        /// Name of the operation
        operation: String,
        /// Name of the parameter
        parameter: String,
        /// Zero-based parameter position
        index: usize,
    },
    /// A parameter of an initializer.
    InitializerParameter {
        /// Name of the declaring type
        type_name: String,
        /// Name of the initializer
        initializer: String,
        /// Name of the parameter
        parameter: String,
        /// Zero-based parameter position
        index: usize,
    },
    /// The return value of an operation.
    ReturnValue {
        /// Name of the declaring type
        type_name: String,
        /// Name of the operation
        operation: String,
    },
}

impl Context {
    /// Creates a type-level context.
    pub fn for_type(type_name: impl Into<String>) -> Self {
        Context::Type {
            type_name: type_name.into(),
        }
    }

    /// Creates a property context.
    pub fn property(type_name: impl Into<String>, property: impl Into<String>) -> Self {
        Context::Property {
            type_name: type_name.into(),
            property: property.into(),
        }
    }

    /// Creates an operation-entry context.
    pub fn operation_entry(type_name: impl Into<String>, operation: impl Into<String>) -> Self {
        Context::OperationEntry {
            type_name: type_name.into(),
            operation: operation.into(),
        }
    }

    /// Creates an operation-exit context.
    pub fn operation_exit(type_name: impl Into<String>, operation: impl Into<String>) -> Self {
        Context::OperationExit {
            type_name: type_name.into(),
            operation: operation.into(),
        }
    }

    /// Creates an operation-parameter context.
    pub fn operation_parameter(
        type_name: impl Into<String>,
        operation: impl Into<String>,
        parameter: impl Into<String>,
        index: usize,
    ) -> Self {
        Context::OperationParameter {
            type_name: type_name.into(),
            operation: operation.into(),
            parameter: parameter.into(),
            index,
        }
    }

    /// Creates an initializer-parameter context.
    pub fn initializer_parameter(
        type_name: impl Into<String>,
        initializer: impl Into<String>,
        parameter: impl Into<String>,
        index: usize,
    ) -> Self {
        Context::InitializerParameter {
            type_name: type_name.into(),
            initializer: initializer.into(),
            parameter: parameter.into(),
            index,
        }
    }

    /// Creates a return-value context.
    pub fn return_value(type_name: impl Into<String>, operation: impl Into<String>) -> Self {
        Context::ReturnValue {
            type_name: type_name.into(),
            operation: operation.into(),
        }
    }

    /// Returns the name of the type this context belongs to.
    pub fn type_name(&self) -> &str {
        match self {
            Context::Type { type_name }
            | Context::Property { type_name, .. }
            | Context::OperationEntry { type_name, .. }
            | Context::OperationExit { type_name, .. }
            | Context::OperationParameter { type_name, .. }
            | Context::InitializerParameter { type_name, .. }
            | Context::ReturnValue { type_name, .. } => type_name,
        }
    }

    /// Returns the member name this context points at, if any.
    pub fn member_name(&self) -> Option<&str> {
        match self {
            Context::Type { .. } => None,
            Context::Property { property, .. } => Some(property),
            Context::OperationEntry { operation, .. }
            | Context::OperationExit { operation, .. }
            | Context::OperationParameter { operation, .. }
            | Context::ReturnValue { operation, .. } => Some(operation),
            Context::InitializerParameter { initializer, .. } => Some(initializer),
        }
    }

    /// Returns the parameter name for parameter contexts.
    pub fn parameter_name(&self) -> Option<&str> {
        match self {
            Context::OperationParameter { parameter, .. }
            | Context::InitializerParameter { parameter, .. } => Some(parameter),
            _ => None,
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::Type { type_name } => write!(f, "{}", type_name),
            Context::Property {
                type_name,
                property,
            } => write!(f, "{}::{}", type_name, property),
            Context::OperationEntry {
                type_name,
                operation,
            } => write!(f, "{}::{}() entry", type_name, operation),
            Context::OperationExit {
                type_name,
                operation,
            } => write!(f, "{}::{}() exit", type_name, operation),
            Context::OperationParameter {
                type_name,
                operation,
                parameter,
                ..
            } => write!(f, "{}::{}() parameter '{}'", type_name, operation, parameter),
            Context::InitializerParameter {
                type_name,
                initializer,
                parameter,
                ..
            } => write!(
                f,
                "{}::{}() parameter '{}'",
                type_name, initializer, parameter
            ),
            Context::ReturnValue {
                type_name,
                operation,
            } => write!(f, "{}::{}() return value", type_name, operation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_forms() {
        assert_eq!(Context::for_type("Account").to_string(), "Account");
        assert_eq!(
            Context::property("Account", "owner").to_string(),
            "Account::owner"
        );
        assert_eq!(
            Context::operation_entry("Account", "deposit").to_string(),
            "Account::deposit() entry"
        );
        assert_eq!(
            Context::operation_exit("Account", "deposit").to_string(),
            "Account::deposit() exit"
        );
        assert_eq!(
            Context::initializer_parameter("Account", "new", "owner", 0).to_string(),
            "Account::new() parameter 'owner'"
        );
        assert_eq!(
            Context::return_value("Account", "balance").to_string(),
            "Account::balance() return value"
        );
    }

    #[test]
    fn test_accessors() {
        let ctx = Context::operation_parameter("Account", "deposit", "amount", 1);
        assert_eq!(ctx.type_name(), "Account");
        assert_eq!(ctx.member_name(), Some("deposit"));
        assert_eq!(ctx.parameter_name(), Some("amount"));
        assert_eq!(Context::for_type("Account").member_name(), None);
    }

    #[test]
    fn test_serialize_tagged() {
        let ctx = Context::property("Account", "owner");
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["kind"], "property");
        assert_eq!(json["type_name"], "Account");
        assert_eq!(json["property"], "owner");
    }
}
