//! Registry entries describing the checked members of one type.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::check::{Check, ParameterChecks, PostCondition, PreCondition};
use crate::core::entity::StaticAccessor;
use crate::error::{Result, VigilError};

/// Member visibility, used by the guard's invariant gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Part of the type's public surface.
    #[default]
    Public,
    /// Visible within the owning crate only.
    Crate,
    /// Internal to the type.
    Private,
}

/// A checked property of a type.
#[derive(Clone)]
pub struct PropertyEntry {
    /// Property name
    pub name: String,
    /// Member visibility
    pub visibility: Visibility,
    /// True for type-scoped properties read through the static accessor
    pub is_static: bool,
    /// Checks in registration order
    pub checks: Vec<Check>,
}

impl PropertyEntry {
    /// Creates an entry with no checks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::default(),
            is_static: false,
            checks: Vec::new(),
        }
    }
}

/// A checked operation of a type.
#[derive(Clone, Default)]
pub struct OperationEntry {
    /// Operation name
    pub name: String,
    /// Member visibility
    pub visibility: Visibility,
    /// True for type-scoped operations invoked through the static accessor
    pub is_static: bool,
    /// True for zero-argument accessor-style operations whose result is
    /// validated during `validate()`
    pub accessor: bool,
    /// Parameter slots in declaration order
    pub params: Vec<ParameterChecks>,
    /// Checks applied to the return value
    pub return_checks: Vec<Check>,
    /// Preconditions evaluated before the call
    pub pre_conditions: Vec<PreCondition>,
    /// Postconditions evaluated after the call
    pub post_conditions: Vec<PostCondition>,
    /// Explicit opt-in to invariant validation before the call
    pub invariants_pre: bool,
    /// Explicit opt-in to invariant validation after the call
    pub invariants_post: bool,
}

impl OperationEntry {
    /// Creates an entry with no checks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Returns the parameter slot with the given name.
    pub fn parameter(&self, name: &str) -> Option<&ParameterChecks> {
        self.params.iter().find(|p| p.name() == name)
    }
}

/// A checked initializer of a type.
#[derive(Clone)]
pub struct InitializerEntry {
    /// Initializer name
    pub name: String,
    /// Parameter slots in declaration order
    pub params: Vec<ParameterChecks>,
}

impl InitializerEntry {
    /// Creates an entry with no checks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }
}

/// Everything the registry knows about one type.
///
/// Entries are built once from the configuration source and treated as
/// immutable afterwards; registry mutation operations clone, modify, and
/// swap whole entries. Member lists preserve configuration order, and the
/// name indexes make lookups cheap on the hot validation path.
#[derive(Clone)]
pub struct ValidatedType {
    name: String,
    supertype: Option<String>,
    check_invariants: bool,
    properties: Vec<PropertyEntry>,
    property_index: HashMap<String, usize>,
    operations: Vec<OperationEntry>,
    operation_index: HashMap<String, usize>,
    initializers: Vec<InitializerEntry>,
    initializer_index: HashMap<String, usize>,
    type_checks: Vec<Check>,
    statics: Option<Arc<dyn StaticAccessor>>,
}

impl ValidatedType {
    /// Creates an empty entry for the named type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertype: None,
            check_invariants: false,
            properties: Vec::new(),
            property_index: HashMap::new(),
            operations: Vec::new(),
            operation_index: HashMap::new(),
            initializers: Vec::new(),
            initializer_index: HashMap::new(),
            type_checks: Vec::new(),
            statics: None,
        }
    }

    /// Returns the type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared supertype, if any.
    pub fn supertype(&self) -> Option<&str> {
        self.supertype.as_deref()
    }

    /// Returns true if the type opted into invariant checking around
    /// guarded calls.
    pub fn check_invariants(&self) -> bool {
        self.check_invariants
    }

    /// Returns the checked properties in configuration order.
    pub fn properties(&self) -> &[PropertyEntry] {
        &self.properties
    }

    /// Returns the checked operations in configuration order.
    pub fn operations(&self) -> &[OperationEntry] {
        &self.operations
    }

    /// Returns the checked initializers in configuration order.
    pub fn initializers(&self) -> &[InitializerEntry] {
        &self.initializers
    }

    /// Returns the type-level checks.
    pub fn type_checks(&self) -> &[Check] {
        &self.type_checks
    }

    /// Returns the static accessor, if one was configured.
    pub fn statics(&self) -> Option<&Arc<dyn StaticAccessor>> {
        self.statics.as_ref()
    }

    /// Looks up a property by name.
    pub fn property(&self, name: &str) -> Option<&PropertyEntry> {
        self.property_index.get(name).map(|&i| &self.properties[i])
    }

    /// Looks up an operation by name.
    pub fn operation(&self, name: &str) -> Option<&OperationEntry> {
        self.operation_index.get(name).map(|&i| &self.operations[i])
    }

    /// Looks up an initializer by name.
    pub fn initializer(&self, name: &str) -> Option<&InitializerEntry> {
        self.initializer_index
            .get(name)
            .map(|&i| &self.initializers[i])
    }

    pub(crate) fn set_supertype(&mut self, supertype: Option<String>) {
        self.supertype = supertype;
    }

    pub(crate) fn set_check_invariants(&mut self, enabled: bool) {
        self.check_invariants = enabled;
    }

    pub(crate) fn set_statics(&mut self, statics: Option<Arc<dyn StaticAccessor>>) {
        self.statics = statics;
    }

    pub(crate) fn push_property(&mut self, entry: PropertyEntry) -> Result<()> {
        if self.property_index.contains_key(&entry.name) {
            return Err(VigilError::configuration(format!(
                "duplicate property '{}' configured on type '{}'",
                entry.name, self.name
            )));
        }
        self.property_index
            .insert(entry.name.clone(), self.properties.len());
        self.properties.push(entry);
        Ok(())
    }

    pub(crate) fn push_operation(&mut self, entry: OperationEntry) -> Result<()> {
        if self.operation_index.contains_key(&entry.name) {
            return Err(VigilError::configuration(format!(
                "duplicate operation '{}' configured on type '{}'",
                entry.name, self.name
            )));
        }
        self.operation_index
            .insert(entry.name.clone(), self.operations.len());
        self.operations.push(entry);
        Ok(())
    }

    pub(crate) fn push_initializer(&mut self, entry: InitializerEntry) -> Result<()> {
        if self.initializer_index.contains_key(&entry.name) {
            return Err(VigilError::configuration(format!(
                "duplicate initializer '{}' configured on type '{}'",
                entry.name, self.name
            )));
        }
        self.initializer_index
            .insert(entry.name.clone(), self.initializers.len());
        self.initializers.push(entry);
        Ok(())
    }

    fn property_mut(&mut self, property: &str) -> Result<&mut PropertyEntry> {
        let name = self.name.clone();
        match self.property_index.get(property) {
            Some(&i) => Ok(&mut self.properties[i]),
            None => Err(VigilError::configuration(format!(
                "unknown property '{property}' on type '{name}'"
            ))),
        }
    }

    fn operation_mut(&mut self, operation: &str) -> Result<&mut OperationEntry> {
        let name = self.name.clone();
        match self.operation_index.get(operation) {
            Some(&i) => Ok(&mut self.operations[i]),
            None => Err(VigilError::configuration(format!(
                "unknown operation '{operation}' on type '{name}'"
            ))),
        }
    }

    fn initializer_mut(&mut self, initializer: &str) -> Result<&mut InitializerEntry> {
        let name = self.name.clone();
        match self.initializer_index.get(initializer) {
            Some(&i) => Ok(&mut self.initializers[i]),
            None => Err(VigilError::configuration(format!(
                "unknown initializer '{initializer}' on type '{name}'"
            ))),
        }
    }

    pub(crate) fn add_property_checks(
        &mut self,
        property: &str,
        checks: Vec<Check>,
        overwrite: bool,
    ) -> Result<()> {
        let entry = self.property_mut(property)?;
        if overwrite {
            entry.checks.clear();
        }
        entry.checks.extend(checks);
        Ok(())
    }

    pub(crate) fn remove_property_checks(
        &mut self,
        property: &str,
        check_names: &[&str],
    ) -> Result<()> {
        let entry = self.property_mut(property)?;
        entry.checks.retain(|c| !check_names.contains(&c.name()));
        Ok(())
    }

    pub(crate) fn clear_property_checks(&mut self, property: &str) -> Result<()> {
        self.property_mut(property)?.checks.clear();
        Ok(())
    }

    pub(crate) fn add_operation_parameter_checks(
        &mut self,
        operation: &str,
        parameter: &str,
        checks: Vec<Check>,
        overwrite: bool,
    ) -> Result<()> {
        let type_name = self.name.clone();
        let entry = self.operation_mut(operation)?;
        let slot = entry
            .params
            .iter_mut()
            .find(|p| p.name() == parameter)
            .ok_or_else(|| {
                VigilError::configuration(format!(
                    "unknown parameter '{parameter}' on operation '{type_name}::{operation}'"
                ))
            })?;
        slot.add_checks(checks, overwrite);
        Ok(())
    }

    pub(crate) fn remove_operation_parameter_checks(
        &mut self,
        operation: &str,
        parameter: &str,
        check_names: &[&str],
    ) -> Result<()> {
        let type_name = self.name.clone();
        let entry = self.operation_mut(operation)?;
        let slot = entry
            .params
            .iter_mut()
            .find(|p| p.name() == parameter)
            .ok_or_else(|| {
                VigilError::configuration(format!(
                    "unknown parameter '{parameter}' on operation '{type_name}::{operation}'"
                ))
            })?;
        slot.remove_checks(check_names);
        Ok(())
    }

    pub(crate) fn add_operation_return_checks(
        &mut self,
        operation: &str,
        checks: Vec<Check>,
        overwrite: bool,
    ) -> Result<()> {
        let entry = self.operation_mut(operation)?;
        if overwrite {
            entry.return_checks.clear();
        }
        entry.return_checks.extend(checks);
        Ok(())
    }

    pub(crate) fn remove_operation_return_checks(
        &mut self,
        operation: &str,
        check_names: &[&str],
    ) -> Result<()> {
        let entry = self.operation_mut(operation)?;
        entry
            .return_checks
            .retain(|c| !check_names.contains(&c.name()));
        Ok(())
    }

    pub(crate) fn clear_operation_return_checks(&mut self, operation: &str) -> Result<()> {
        self.operation_mut(operation)?.return_checks.clear();
        Ok(())
    }

    pub(crate) fn add_initializer_parameter_checks(
        &mut self,
        initializer: &str,
        parameter: &str,
        checks: Vec<Check>,
        overwrite: bool,
    ) -> Result<()> {
        let type_name = self.name.clone();
        let entry = self.initializer_mut(initializer)?;
        let slot = entry
            .params
            .iter_mut()
            .find(|p| p.name() == parameter)
            .ok_or_else(|| {
                VigilError::configuration(format!(
                    "unknown parameter '{parameter}' on initializer '{type_name}::{initializer}'"
                ))
            })?;
        slot.add_checks(checks, overwrite);
        Ok(())
    }

    pub(crate) fn remove_initializer_parameter_checks(
        &mut self,
        initializer: &str,
        parameter: &str,
        check_names: &[&str],
    ) -> Result<()> {
        let type_name = self.name.clone();
        let entry = self.initializer_mut(initializer)?;
        let slot = entry
            .params
            .iter_mut()
            .find(|p| p.name() == parameter)
            .ok_or_else(|| {
                VigilError::configuration(format!(
                    "unknown parameter '{parameter}' on initializer '{type_name}::{initializer}'"
                ))
            })?;
        slot.remove_checks(check_names);
        Ok(())
    }

    pub(crate) fn add_type_checks(&mut self, checks: Vec<Check>, overwrite: bool) {
        if overwrite {
            self.type_checks.clear();
        }
        self.type_checks.extend(checks);
    }

    pub(crate) fn remove_type_checks(&mut self, check_names: &[&str]) {
        self.type_checks.retain(|c| !check_names.contains(&c.name()));
    }

    pub(crate) fn clear_type_checks(&mut self) {
        self.type_checks.clear();
    }

    pub(crate) fn add_pre_condition(&mut self, operation: &str, pre: PreCondition) -> Result<()> {
        self.operation_mut(operation)?.pre_conditions.push(pre);
        Ok(())
    }

    pub(crate) fn add_post_condition(
        &mut self,
        operation: &str,
        post: PostCondition,
    ) -> Result<()> {
        self.operation_mut(operation)?.post_conditions.push(post);
        Ok(())
    }

    pub(crate) fn mark_invariant_checks(
        &mut self,
        operation: &str,
        pre: bool,
        post: bool,
    ) -> Result<()> {
        let entry = self.operation_mut(operation)?;
        entry.invariants_pre = pre;
        entry.invariants_post = post;
        Ok(())
    }
}
