//! Violation listeners and their registration scopes.
//!
//! Listeners observe the violations of guarded calls before the guard raises
//! them. They can be registered globally, for a type name, or for a single
//! entity; one event is delivered at most once to each distinct listener even
//! when it is registered in several scopes. A listener that panics is logged
//! and skipped, it cannot abort the triggering call or starve other
//! listeners.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::core::{ConstraintViolation, EntityRef, ObjectId};
use crate::error::{Result, VigilError};

/// Observes violations raised by guarded calls.
pub trait ViolationListener: Send + Sync {
    /// Called once per guarded call that produced violations.
    fn on_violations(&self, event: &ViolationEvent<'_>);
}

/// A shared, thread-safe listener handle.
pub type SharedListener = Arc<dyn ViolationListener>;

/// One guarded call's worth of violations, delivered to listeners before the
/// guard raises or records them.
pub struct ViolationEvent<'a> {
    /// The receiver, absent for static and initializer calls
    pub entity: Option<&'a EntityRef>,
    /// Declaring type of the guarded member
    pub type_name: &'a str,
    /// Name of the guarded operation or initializer
    pub member: &'a str,
    /// The violations, in evaluation order
    pub violations: &'a [ConstraintViolation],
}

/// Listener registrations across the three scopes.
///
/// Identity is the listener allocation: registering one `Arc` clone in
/// several scopes still delivers a single event to it.
pub struct ListenerSet {
    global: RwLock<Vec<SharedListener>>,
    by_type: RwLock<HashMap<String, Vec<SharedListener>>>,
    by_entity: RwLock<HashMap<ObjectId, Vec<SharedListener>>>,
}

impl ListenerSet {
    /// Creates an empty listener set.
    pub fn new() -> Self {
        Self {
            global: RwLock::new(Vec::new()),
            by_type: RwLock::new(HashMap::new()),
            by_entity: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a listener for every guarded call.
    pub fn add_global(&self, listener: SharedListener) -> Result<()> {
        self.write_global()?.push(listener);
        Ok(())
    }

    /// Removes a globally registered listener.
    ///
    /// Returns whether the listener was registered.
    pub fn remove_global(&self, listener: &SharedListener) -> Result<bool> {
        let mut listeners = self.write_global()?;
        let before = listeners.len();
        listeners.retain(|l| listener_ptr(l) != listener_ptr(listener));
        Ok(listeners.len() < before)
    }

    /// Registers a listener for guarded calls on the named type.
    pub fn add_for_type(&self, type_name: impl Into<String>, listener: SharedListener) -> Result<()> {
        self.write_by_type()?
            .entry(type_name.into())
            .or_default()
            .push(listener);
        Ok(())
    }

    /// Removes a per-type listener registration.
    pub fn remove_for_type(&self, type_name: &str, listener: &SharedListener) -> Result<bool> {
        let mut by_type = self.write_by_type()?;
        let Some(listeners) = by_type.get_mut(type_name) else {
            return Ok(false);
        };
        let before = listeners.len();
        listeners.retain(|l| listener_ptr(l) != listener_ptr(listener));
        let removed = listeners.len() < before;
        if listeners.is_empty() {
            by_type.remove(type_name);
        }
        Ok(removed)
    }

    /// Registers a listener for guarded calls on one entity.
    pub fn add_for_entity(&self, entity: &EntityRef, listener: SharedListener) -> Result<()> {
        self.write_by_entity()?
            .entry(ObjectId::of(entity))
            .or_default()
            .push(listener);
        Ok(())
    }

    /// Removes a per-entity listener registration.
    pub fn remove_for_entity(&self, entity: &EntityRef, listener: &SharedListener) -> Result<bool> {
        let mut by_entity = self.write_by_entity()?;
        let id = ObjectId::of(entity);
        let Some(listeners) = by_entity.get_mut(&id) else {
            return Ok(false);
        };
        let before = listeners.len();
        listeners.retain(|l| listener_ptr(l) != listener_ptr(listener));
        let removed = listeners.len() < before;
        if listeners.is_empty() {
            by_entity.remove(&id);
        }
        Ok(removed)
    }

    /// Delivers the event once to every listener registered for the entity,
    /// its type, or globally.
    ///
    /// Delivery order is per-entity, per-type, then global. A panicking
    /// listener is logged and skipped.
    pub fn notify(&self, event: &ViolationEvent<'_>) -> Result<()> {
        let mut recipients: Vec<SharedListener> = Vec::new();
        let mut seen: Vec<*const ()> = Vec::new();

        let mut collect = |listeners: &[SharedListener]| {
            for listener in listeners {
                let ptr = listener_ptr(listener);
                if !seen.contains(&ptr) {
                    seen.push(ptr);
                    recipients.push(listener.clone());
                }
            }
        };

        if let Some(entity) = event.entity {
            if let Some(listeners) = self.read_by_entity()?.get(&ObjectId::of(entity)) {
                collect(listeners);
            }
        }
        if let Some(listeners) = self.read_by_type()?.get(event.type_name) {
            collect(listeners);
        }
        collect(&self.read_global()?);

        for listener in recipients {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_violations(event)));
            if let Err(panic) = outcome {
                warn!(
                    event.type_name = %event.type_name,
                    event.member = %event.member,
                    panic.message = %panic_message(panic.as_ref()),
                    "violation listener panicked"
                );
            }
        }
        Ok(())
    }

    fn read_global(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<SharedListener>>> {
        self.global.read().map_err(lock_fault)
    }

    fn write_global(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<SharedListener>>> {
        self.global.write().map_err(lock_fault)
    }

    fn read_by_type(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Vec<SharedListener>>>> {
        self.by_type.read().map_err(lock_fault)
    }

    fn write_by_type(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<SharedListener>>>> {
        self.by_type.write().map_err(lock_fault)
    }

    fn read_by_entity(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<ObjectId, Vec<SharedListener>>>> {
        self.by_entity.read().map_err(lock_fault)
    }

    fn write_by_entity(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<ObjectId, Vec<SharedListener>>>> {
        self.by_entity.write().map_err(lock_fault)
    }
}

impl Default for ListenerSet {
    fn default() -> Self {
        Self::new()
    }
}

fn listener_ptr(listener: &SharedListener) -> *const () {
    Arc::as_ptr(listener) as *const ()
}

fn lock_fault<T>(error: std::sync::PoisonError<T>) -> VigilError {
    VigilError::internal(format!("failed to acquire listener lock: {error}"))
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
