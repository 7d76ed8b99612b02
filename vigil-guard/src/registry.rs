//! Lazily populated, cached store of per-type check configuration.
//!
//! The registry sits between configuration sources and the validator. The
//! first time a type is looked up, every registered source is queried, the
//! records are merged in registration order, and the result is compiled into
//! an immutable [`ValidatedType`] entry. Later lookups clone an `Arc` under a
//! shared lock; the exclusive lock is only taken for first-time population
//! and for mutation.
//!
//! Mutation never edits an entry in place. The current entry is cloned, the
//! change applied to the clone, and the clone swapped in, so validations
//! already holding the old `Arc` finish against a consistent snapshot.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::config::{ConfigurationSource, ConstraintSet, ProfileDefaults, TypeConfig};
use crate::core::{Check, PostCondition, PreCondition, ValidatedType};
use crate::error::{Result, VigilError};

/// Per-type store of checks, exclusions, conditions, and invariant flags.
pub struct CheckRegistry {
    sources: RwLock<Vec<Arc<dyn ConfigurationSource>>>,
    types: RwLock<HashMap<String, Arc<ValidatedType>>>,
    sets: RwLock<HashMap<String, Arc<ConstraintSet>>>,
}

impl CheckRegistry {
    /// Creates a registry with no configuration sources.
    pub fn new() -> Self {
        Self::with_sources(Vec::new())
    }

    /// Creates a registry backed by the given sources, consulted in order.
    pub fn with_sources(sources: Vec<Arc<dyn ConfigurationSource>>) -> Self {
        Self {
            sources: RwLock::new(sources),
            types: RwLock::new(HashMap::new()),
            sets: RwLock::new(HashMap::new()),
        }
    }

    /// Registers an additional source and drops cached entries so the new
    /// source is consulted on the next lookup.
    pub fn add_source(&self, source: Arc<dyn ConfigurationSource>) -> Result<()> {
        self.write_sources()?.push(source);
        self.reset()
    }

    /// Drops all cached entries and constraint sets. Sources are consulted
    /// again on the next lookup.
    pub fn reset(&self) -> Result<()> {
        self.write_types()?.clear();
        self.write_sets()?.clear();
        Ok(())
    }

    /// Returns the entry for the named type, building and caching it on
    /// first use. Types no source knows about get an empty entry.
    pub fn get(&self, type_name: &str) -> Result<Arc<ValidatedType>> {
        if let Some(entry) = self.read_types()?.get(type_name) {
            return Ok(entry.clone());
        }

        let mut types = self.write_types()?;
        // Another thread may have populated the entry while we waited.
        if let Some(entry) = types.get(type_name) {
            return Ok(entry.clone());
        }

        let entry = Arc::new(self.build_entry(type_name)?);
        types.insert(type_name.to_string(), entry.clone());
        Ok(entry)
    }

    /// Resolves a named constraint set, caching the result. Unknown ids are
    /// a configuration error.
    pub fn constraint_set(&self, set_id: &str) -> Result<Arc<ConstraintSet>> {
        if let Some(set) = self.read_sets()?.get(set_id) {
            return Ok(set.clone());
        }

        let mut sets = self.write_sets()?;
        if let Some(set) = sets.get(set_id) {
            return Ok(set.clone());
        }

        for source in self.read_sources()?.iter() {
            if let Some(set) = source.constraint_set(set_id)? {
                let set = Arc::new(set);
                sets.insert(set_id.to_string(), set.clone());
                return Ok(set);
            }
        }
        Err(VigilError::configuration(format!(
            "unknown constraint set '{set_id}'"
        )))
    }

    /// Returns the merged profile defaults of all sources, in registration
    /// order.
    pub fn profile_defaults(&self) -> Result<ProfileDefaults> {
        let mut defaults = ProfileDefaults::default();
        for source in self.read_sources()?.iter() {
            defaults.merge(&source.profile_defaults());
        }
        Ok(defaults)
    }

    fn build_entry(&self, type_name: &str) -> Result<ValidatedType> {
        let mut merged: Option<TypeConfig> = None;
        for source in self.read_sources()?.iter() {
            if let Some(config) = source.type_config(type_name)? {
                match merged.as_mut() {
                    Some(base) => base.merge(config),
                    None => merged = Some(config),
                }
            }
        }

        let config = merged.unwrap_or_else(|| TypeConfig::new(type_name));
        let entry = config.compile()?;
        debug!(
            type_name,
            properties = entry.properties().len(),
            operations = entry.operations().len(),
            initializers = entry.initializers().len(),
            "built registry entry"
        );
        Ok(entry)
    }

    /// Clones the current entry, applies the change, and swaps the result
    /// in. Mutations are serialized by the exclusive lock; readers keep
    /// whatever snapshot they already hold.
    fn mutate<F>(&self, type_name: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut ValidatedType) -> Result<()>,
    {
        let mut types = self.write_types()?;
        let mut entry = match types.get(type_name) {
            Some(entry) => (**entry).clone(),
            None => self.build_entry(type_name)?,
        };
        apply(&mut entry)?;
        types.insert(type_name.to_string(), Arc::new(entry));
        Ok(())
    }

    /// Adds checks to a property. With `overwrite` set, existing checks for
    /// the property are cleared first.
    pub fn add_property_checks(
        &self,
        type_name: &str,
        property: &str,
        checks: Vec<Check>,
        overwrite: bool,
    ) -> Result<()> {
        self.mutate(type_name, |e| {
            e.add_property_checks(property, checks, overwrite)
        })
    }

    /// Removes the named checks from a property.
    pub fn remove_property_checks(
        &self,
        type_name: &str,
        property: &str,
        check_names: &[&str],
    ) -> Result<()> {
        self.mutate(type_name, |e| {
            e.remove_property_checks(property, check_names)
        })
    }

    /// Removes every check from a property.
    pub fn clear_property_checks(&self, type_name: &str, property: &str) -> Result<()> {
        self.mutate(type_name, |e| e.clear_property_checks(property))
    }

    /// Adds checks to an operation parameter.
    pub fn add_operation_parameter_checks(
        &self,
        type_name: &str,
        operation: &str,
        parameter: &str,
        checks: Vec<Check>,
        overwrite: bool,
    ) -> Result<()> {
        self.mutate(type_name, |e| {
            e.add_operation_parameter_checks(operation, parameter, checks, overwrite)
        })
    }

    /// Removes the named checks from an operation parameter.
    pub fn remove_operation_parameter_checks(
        &self,
        type_name: &str,
        operation: &str,
        parameter: &str,
        check_names: &[&str],
    ) -> Result<()> {
        self.mutate(type_name, |e| {
            e.remove_operation_parameter_checks(operation, parameter, check_names)
        })
    }

    /// Removes every check from an operation parameter.
    pub fn clear_operation_parameter_checks(
        &self,
        type_name: &str,
        operation: &str,
        parameter: &str,
    ) -> Result<()> {
        self.mutate(type_name, |e| {
            e.add_operation_parameter_checks(operation, parameter, Vec::new(), true)
        })
    }

    /// Adds checks to an operation's return value.
    pub fn add_operation_return_checks(
        &self,
        type_name: &str,
        operation: &str,
        checks: Vec<Check>,
        overwrite: bool,
    ) -> Result<()> {
        self.mutate(type_name, |e| {
            e.add_operation_return_checks(operation, checks, overwrite)
        })
    }

    /// Removes the named checks from an operation's return value.
    pub fn remove_operation_return_checks(
        &self,
        type_name: &str,
        operation: &str,
        check_names: &[&str],
    ) -> Result<()> {
        self.mutate(type_name, |e| {
            e.remove_operation_return_checks(operation, check_names)
        })
    }

    /// Removes every return-value check from an operation.
    pub fn clear_operation_return_checks(&self, type_name: &str, operation: &str) -> Result<()> {
        self.mutate(type_name, |e| e.clear_operation_return_checks(operation))
    }

    /// Adds checks to an initializer parameter.
    pub fn add_initializer_parameter_checks(
        &self,
        type_name: &str,
        initializer: &str,
        parameter: &str,
        checks: Vec<Check>,
        overwrite: bool,
    ) -> Result<()> {
        self.mutate(type_name, |e| {
            e.add_initializer_parameter_checks(initializer, parameter, checks, overwrite)
        })
    }

    /// Removes the named checks from an initializer parameter.
    pub fn remove_initializer_parameter_checks(
        &self,
        type_name: &str,
        initializer: &str,
        parameter: &str,
        check_names: &[&str],
    ) -> Result<()> {
        self.mutate(type_name, |e| {
            e.remove_initializer_parameter_checks(initializer, parameter, check_names)
        })
    }

    /// Removes every check from an initializer parameter.
    pub fn clear_initializer_parameter_checks(
        &self,
        type_name: &str,
        initializer: &str,
        parameter: &str,
    ) -> Result<()> {
        self.mutate(type_name, |e| {
            e.add_initializer_parameter_checks(initializer, parameter, Vec::new(), true)
        })
    }

    /// Adds type-level checks.
    pub fn add_type_checks(
        &self,
        type_name: &str,
        checks: Vec<Check>,
        overwrite: bool,
    ) -> Result<()> {
        self.mutate(type_name, |e| {
            e.add_type_checks(checks, overwrite);
            Ok(())
        })
    }

    /// Removes the named type-level checks.
    pub fn remove_type_checks(&self, type_name: &str, check_names: &[&str]) -> Result<()> {
        self.mutate(type_name, |e| {
            e.remove_type_checks(check_names);
            Ok(())
        })
    }

    /// Removes every type-level check.
    pub fn clear_type_checks(&self, type_name: &str) -> Result<()> {
        self.mutate(type_name, |e| {
            e.clear_type_checks();
            Ok(())
        })
    }

    /// Adds a precondition to an operation.
    pub fn add_pre_condition(
        &self,
        type_name: &str,
        operation: &str,
        pre: PreCondition,
    ) -> Result<()> {
        self.mutate(type_name, |e| e.add_pre_condition(operation, pre))
    }

    /// Adds a postcondition to an operation.
    pub fn add_post_condition(
        &self,
        type_name: &str,
        operation: &str,
        post: PostCondition,
    ) -> Result<()> {
        self.mutate(type_name, |e| e.add_post_condition(operation, post))
    }

    /// Sets an operation's explicit invariant opt-in flags.
    pub fn mark_invariant_checks(
        &self,
        type_name: &str,
        operation: &str,
        pre: bool,
        post: bool,
    ) -> Result<()> {
        self.mutate(type_name, |e| e.mark_invariant_checks(operation, pre, post))
    }

    fn read_types(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Arc<ValidatedType>>>> {
        self.types
            .read()
            .map_err(|e| VigilError::internal(format!("failed to acquire registry lock: {e}")))
    }

    fn write_types(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<ValidatedType>>>> {
        self.types
            .write()
            .map_err(|e| VigilError::internal(format!("failed to acquire registry lock: {e}")))
    }

    fn read_sets(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Arc<ConstraintSet>>>> {
        self.sets
            .read()
            .map_err(|e| VigilError::internal(format!("failed to acquire registry lock: {e}")))
    }

    fn write_sets(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<ConstraintSet>>>> {
        self.sets
            .write()
            .map_err(|e| VigilError::internal(format!("failed to acquire registry lock: {e}")))
    }

    fn read_sources(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, Vec<Arc<dyn ConfigurationSource>>>> {
        self.sources
            .read()
            .map_err(|e| VigilError::internal(format!("failed to acquire registry lock: {e}")))
    }

    fn write_sources(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, Vec<Arc<dyn ConfigurationSource>>>> {
        self.sources
            .write()
            .map_err(|e| VigilError::internal(format!("failed to acquire registry lock: {e}")))
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}
