//! Entity abstraction for validated objects.
//!
//! The engine has no reflection facilities to lean on, so every object that
//! wants to be validated exposes itself through the [`Validatable`] trait:
//! a stable type name plus dynamic property reads and operation invocation.
//! Entities are always handled behind [`EntityRef`] so that identity-based
//! cycle detection and weak violation references work uniformly.

use std::sync::{Arc, Weak};

use crate::core::value::Value;
use crate::error::{Result, VigilError};

/// An object that can be validated against registered checks.
///
/// Implementations surface their state through [`Validatable::property`] and
/// their callable members through [`Validatable::invoke`]. Both return
/// [`Value`]s, which keeps the engine independent of concrete types.
///
/// # Examples
///
/// ```rust
/// use std::sync::Mutex;
/// use vigil_guard::core::{Validatable, Value};
/// use vigil_guard::error::Result;
///
/// struct Account {
///     owner: String,
///     balance: Mutex<i64>,
/// }
///
/// impl Validatable for Account {
///     fn type_name(&self) -> &str {
///         "Account"
///     }
///
///     fn property(&self, name: &str) -> Result<Value> {
///         match name {
///             "owner" => Ok(Value::from(self.owner.as_str())),
///             "balance" => Ok(Value::from(*self.balance.lock().unwrap())),
///             _ => Err(vigil_guard::error::VigilError::configuration(format!(
///                 "unknown property '{name}' on 'Account'"
///             ))),
///         }
///     }
/// }
/// ```
pub trait Validatable: Send + Sync {
    /// Returns the stable type name used to look up registered checks.
    fn type_name(&self) -> &str;

    /// Reads the named property.
    ///
    /// A failing read is treated as a validation fault and aborts the
    /// current validation cycle.
    fn property(&self, name: &str) -> Result<Value>;

    /// Invokes the named operation with the given arguments.
    ///
    /// The default implementation rejects every operation, which is
    /// sufficient for entities that only expose properties.
    fn invoke(&self, operation: &str, _args: &[Value]) -> Result<Value> {
        Err(VigilError::configuration(format!(
            "operation '{}' is not implemented on '{}'",
            operation,
            self.type_name()
        )))
    }
}

/// Shared handle to a validated entity.
pub type EntityRef = Arc<dyn Validatable>;

/// Weak handle to a validated entity, held by violations so that reports do
/// not keep the validated object graph alive.
pub type WeakEntity = Weak<dyn Validatable>;

/// Reads type-scoped state for static validation.
///
/// Supplied through the type configuration; [`Validator::validate_static`]
/// reads static properties and invokes static accessors through it.
///
/// [`Validator::validate_static`]: crate::validator::Validator::validate_static
pub trait StaticAccessor: Send + Sync {
    /// Reads the named static property.
    fn property(&self, name: &str) -> Result<Value>;

    /// Invokes the named static operation.
    fn invoke(&self, operation: &str, _args: &[Value]) -> Result<Value> {
        Err(VigilError::configuration(format!(
            "static operation '{operation}' is not implemented"
        )))
    }
}

/// Identity of an entity, derived from its allocation address.
///
/// Used as the key for thread-local re-entrancy scopes and probe sessions.
/// Two `EntityRef` clones of the same allocation share one `ObjectId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Returns the identity of the given entity.
    pub fn of(entity: &EntityRef) -> Self {
        ObjectId(Arc::as_ptr(entity) as *const () as usize)
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    impl Validatable for Fixed {
        fn type_name(&self) -> &str {
            self.0
        }

        fn property(&self, name: &str) -> Result<Value> {
            Ok(Value::from(name))
        }
    }

    #[test]
    fn test_object_id_stable_across_clones() {
        let a: EntityRef = Arc::new(Fixed("A"));
        let b = a.clone();
        assert_eq!(ObjectId::of(&a), ObjectId::of(&b));
    }

    #[test]
    fn test_object_id_distinct_per_allocation() {
        let a: EntityRef = Arc::new(Fixed("A"));
        let b: EntityRef = Arc::new(Fixed("A"));
        assert_ne!(ObjectId::of(&a), ObjectId::of(&b));
    }

    #[test]
    fn test_default_invoke_is_rejected() {
        let a: EntityRef = Arc::new(Fixed("A"));
        let err = a.invoke("frobnicate", &[]).unwrap_err();
        assert!(err.to_string().contains("frobnicate"));
    }
}
