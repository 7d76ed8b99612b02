//! Configuration sources and the records they supply.
//!
//! Checks reach the registry through [`ConfigurationSource`] implementations.
//! A source is queried lazily, once per type, and answers with a [`TypeConfig`]
//! record describing every checked member of that type. Records are assembled
//! with chainable setters and compiled into immutable registry entries on first
//! use.
//!
//! ```text
//! ┌───────────────────────┐     ┌───────────────┐     ┌────────────────┐
//! │ ConfigurationBuilder  │ --> │ Configuration │ --> │ CheckRegistry  │
//! │ (fluent assembly)     │     │ Source        │     │ (compiled,     │
//! └───────────────────────┘     └───────────────┘     │  cached)       │
//!                                                     └────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust
//! use vigil_guard::config::{ConfigurationBuilder, OperationConfig, PropertyConfig, TypeConfig};
//! use vigil_guard::checks::NotNullConstraint;
//! use vigil_guard::core::{Check, ParameterChecks};
//!
//! let source = ConfigurationBuilder::new()
//!     .configure(
//!         TypeConfig::new("Account")
//!             .check_invariants(true)
//!             .property(
//!                 PropertyConfig::new("owner")
//!                     .check(Check::rule(NotNullConstraint::new()).build()),
//!             )
//!             .operation(
//!                 OperationConfig::new("deposit").param(
//!                     ParameterChecks::new("amount")
//!                         .check(Check::rule(NotNullConstraint::new()).build()),
//!                 ),
//!             ),
//!     )
//!     .build();
//! ```

mod builder;

pub use builder::{ConfigurationBuilder, InMemoryConfigurationSource};

use std::sync::Arc;

use crate::core::{
    Check, InitializerEntry, OperationEntry, ParameterChecks, PostCondition, PreCondition,
    PropertyEntry, StaticAccessor, ValidatedType, Visibility,
};
use crate::error::Result;

/// Supplies check configuration to the registry.
///
/// Sources are consulted lazily the first time a type is validated and the
/// answer is cached, so implementations may be arbitrarily expensive to query
/// but must be deterministic. Several sources can be registered; their records
/// for the same type are merged in registration order.
pub trait ConfigurationSource: Send + Sync {
    /// Returns the configuration for the named type, if this source has one.
    fn type_config(&self, type_name: &str) -> Result<Option<TypeConfig>>;

    /// Returns the named reusable constraint set, if this source defines it.
    fn constraint_set(&self, _set_id: &str) -> Result<Option<ConstraintSet>> {
        Ok(None)
    }

    /// Returns the profile state this source wants applied at construction.
    fn profile_defaults(&self) -> ProfileDefaults {
        ProfileDefaults::default()
    }
}

/// A named, reusable list of checks that other checks delegate to by id.
#[derive(Clone, Debug)]
pub struct ConstraintSet {
    /// Set identifier
    pub id: String,
    /// Member checks applied to the delegating value
    pub checks: Vec<Check>,
}

impl ConstraintSet {
    /// Creates an empty set with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            checks: Vec::new(),
        }
    }

    /// Adds a check to the set.
    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }
}

/// Profile state applied when a validator is constructed.
#[derive(Clone, Debug)]
pub struct ProfileDefaults {
    /// Whether profiles not listed below start out enabled
    pub all_enabled_by_default: bool,
    /// Profiles explicitly enabled at start
    pub enabled: Vec<String>,
    /// Profiles explicitly disabled at start
    pub disabled: Vec<String>,
}

impl Default for ProfileDefaults {
    fn default() -> Self {
        Self {
            all_enabled_by_default: true,
            enabled: Vec::new(),
            disabled: Vec::new(),
        }
    }
}

impl ProfileDefaults {
    /// Merges another defaults record into this one. The other record's
    /// explicit lists win on conflict.
    pub(crate) fn merge(&mut self, other: &ProfileDefaults) {
        self.all_enabled_by_default = other.all_enabled_by_default;
        for name in &other.enabled {
            self.disabled.retain(|d| d != name);
            if !self.enabled.contains(name) {
                self.enabled.push(name.clone());
            }
        }
        for name in &other.disabled {
            self.enabled.retain(|e| e != name);
            if !self.disabled.contains(name) {
                self.disabled.push(name.clone());
            }
        }
    }
}

/// Configuration record for one checked property.
#[derive(Clone)]
pub struct PropertyConfig {
    /// Property name
    pub name: String,
    /// Member visibility
    pub visibility: Visibility,
    /// True for type-scoped properties
    pub is_static: bool,
    /// Checks in declaration order
    pub checks: Vec<Check>,
}

impl PropertyConfig {
    /// Creates a record for the named property.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::default(),
            is_static: false,
            checks: Vec::new(),
        }
    }

    /// Sets the member visibility.
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Marks the property as type-scoped.
    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Adds a check.
    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    /// Adds several checks at once.
    pub fn checks(mut self, checks: impl IntoIterator<Item = Check>) -> Self {
        self.checks.extend(checks);
        self
    }
}

/// Configuration record for one checked operation.
#[derive(Clone)]
pub struct OperationConfig {
    /// Operation name
    pub name: String,
    /// Member visibility
    pub visibility: Visibility,
    /// True for type-scoped operations
    pub is_static: bool,
    /// True for zero-argument accessors validated during `validate()`
    pub accessor: bool,
    /// Parameter slots in declaration order
    pub params: Vec<ParameterChecks>,
    /// Checks applied to the return value
    pub return_checks: Vec<Check>,
    /// Preconditions evaluated before the call
    pub pre_conditions: Vec<PreCondition>,
    /// Postconditions evaluated after the call
    pub post_conditions: Vec<PostCondition>,
    /// Opt-in to invariant validation before the call
    pub invariants_pre: bool,
    /// Opt-in to invariant validation after the call
    pub invariants_post: bool,
}

impl OperationConfig {
    /// Creates a record for the named operation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::default(),
            is_static: false,
            accessor: false,
            params: Vec::new(),
            return_checks: Vec::new(),
            pre_conditions: Vec::new(),
            post_conditions: Vec::new(),
            invariants_pre: false,
            invariants_post: false,
        }
    }

    /// Sets the member visibility.
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Marks the operation as type-scoped.
    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Marks the operation as a zero-argument accessor whose result is
    /// validated during `validate()`.
    pub fn accessor(mut self) -> Self {
        self.accessor = true;
        self
    }

    /// Adds a parameter slot. Slots bind positionally to call arguments, in
    /// the order they are added here.
    pub fn param(mut self, param: ParameterChecks) -> Self {
        self.params.push(param);
        self
    }

    /// Adds a return-value check.
    pub fn return_check(mut self, check: Check) -> Self {
        self.return_checks.push(check);
        self
    }

    /// Adds a precondition.
    pub fn pre(mut self, pre: PreCondition) -> Self {
        self.pre_conditions.push(pre);
        self
    }

    /// Adds a postcondition.
    pub fn post(mut self, post: PostCondition) -> Self {
        self.post_conditions.push(post);
        self
    }

    /// Opts the operation into invariant validation before and/or after the
    /// guarded call, independently of the type-wide flag.
    pub fn invariants(mut self, pre: bool, post: bool) -> Self {
        self.invariants_pre = pre;
        self.invariants_post = post;
        self
    }
}

/// Configuration record for one checked initializer.
///
/// Initializers carry parameter checks only; the constructed instance is
/// validated through `validate()` or invariant checking, not here.
#[derive(Clone)]
pub struct InitializerConfig {
    /// Initializer name
    pub name: String,
    /// Parameter slots in declaration order
    pub params: Vec<ParameterChecks>,
}

impl InitializerConfig {
    /// Creates a record for the named initializer.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Adds a parameter slot.
    pub fn param(mut self, param: ParameterChecks) -> Self {
        self.params.push(param);
        self
    }
}

/// Configuration record for one type.
#[derive(Clone, Default)]
pub struct TypeConfig {
    /// Type name, as reported by `Validatable::type_name`
    pub name: String,
    /// Supertype whose checks also apply to instances of this type
    pub supertype: Option<String>,
    /// Whether guarded calls on this type validate invariants
    pub check_invariants: bool,
    /// Checked properties
    pub properties: Vec<PropertyConfig>,
    /// Checked operations
    pub operations: Vec<OperationConfig>,
    /// Checked initializers
    pub initializers: Vec<InitializerConfig>,
    /// Checks applied to the entity as a whole
    pub type_checks: Vec<Check>,
    /// Accessor for type-scoped members
    pub statics: Option<Arc<dyn StaticAccessor>>,
}

impl TypeConfig {
    /// Creates an empty record for the named type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Declares the supertype. The supertype's checks apply to instances of
    /// this type as well; chains end at the first type without one.
    pub fn supertype(mut self, supertype: impl Into<String>) -> Self {
        self.supertype = Some(supertype.into());
        self
    }

    /// Opts the type into invariant validation around guarded calls.
    pub fn check_invariants(mut self, enabled: bool) -> Self {
        self.check_invariants = enabled;
        self
    }

    /// Adds a property record.
    pub fn property(mut self, property: PropertyConfig) -> Self {
        self.properties.push(property);
        self
    }

    /// Adds an operation record.
    pub fn operation(mut self, operation: OperationConfig) -> Self {
        self.operations.push(operation);
        self
    }

    /// Adds an initializer record.
    pub fn initializer(mut self, initializer: InitializerConfig) -> Self {
        self.initializers.push(initializer);
        self
    }

    /// Adds a type-level check.
    pub fn type_check(mut self, check: Check) -> Self {
        self.type_checks.push(check);
        self
    }

    /// Sets the accessor used to read type-scoped members.
    pub fn statics(mut self, statics: Arc<dyn StaticAccessor>) -> Self {
        self.statics = Some(statics);
        self
    }

    /// Merges another record for the same type into this one. Members are
    /// matched by name and their checks appended; members only the other
    /// record declares are added after the existing ones.
    pub(crate) fn merge(&mut self, other: TypeConfig) {
        if other.supertype.is_some() {
            self.supertype = other.supertype;
        }
        self.check_invariants |= other.check_invariants;
        if other.statics.is_some() {
            self.statics = other.statics;
        }
        self.type_checks.extend(other.type_checks);

        for property in other.properties {
            match self.properties.iter_mut().find(|p| p.name == property.name) {
                Some(existing) => existing.checks.extend(property.checks),
                None => self.properties.push(property),
            }
        }
        for operation in other.operations {
            match self
                .operations
                .iter_mut()
                .find(|o| o.name == operation.name)
            {
                Some(existing) => {
                    existing.accessor |= operation.accessor;
                    existing.invariants_pre |= operation.invariants_pre;
                    existing.invariants_post |= operation.invariants_post;
                    existing.return_checks.extend(operation.return_checks);
                    existing.pre_conditions.extend(operation.pre_conditions);
                    existing.post_conditions.extend(operation.post_conditions);
                    for param in operation.params {
                        match existing
                            .params
                            .iter_mut()
                            .find(|p| p.name() == param.name())
                        {
                            Some(slot) => slot.merge(param),
                            None => existing.params.push(param),
                        }
                    }
                }
                None => self.operations.push(operation),
            }
        }
        for initializer in other.initializers {
            match self
                .initializers
                .iter_mut()
                .find(|i| i.name == initializer.name)
            {
                Some(existing) => {
                    for param in initializer.params {
                        match existing
                            .params
                            .iter_mut()
                            .find(|p| p.name() == param.name())
                        {
                            Some(slot) => slot.merge(param),
                            None => existing.params.push(param),
                        }
                    }
                }
                None => self.initializers.push(initializer),
            }
        }
    }

    /// Compiles the record into an immutable registry entry.
    pub(crate) fn compile(self) -> Result<ValidatedType> {
        let mut entry = ValidatedType::new(self.name);
        entry.set_supertype(self.supertype);
        entry.set_check_invariants(self.check_invariants);
        entry.set_statics(self.statics);
        entry.add_type_checks(self.type_checks, false);

        for property in self.properties {
            entry.push_property(PropertyEntry {
                name: property.name,
                visibility: property.visibility,
                is_static: property.is_static,
                checks: property.checks,
            })?;
        }
        for operation in self.operations {
            entry.push_operation(OperationEntry {
                name: operation.name,
                visibility: operation.visibility,
                is_static: operation.is_static,
                accessor: operation.accessor,
                params: operation.params,
                return_checks: operation.return_checks,
                pre_conditions: operation.pre_conditions,
                post_conditions: operation.post_conditions,
                invariants_pre: operation.invariants_pre,
                invariants_post: operation.invariants_post,
            })?;
        }
        for initializer in self.initializers {
            entry.push_initializer(InitializerEntry {
                name: initializer.name,
                params: initializer.params,
            })?;
        }
        Ok(entry)
    }
}
