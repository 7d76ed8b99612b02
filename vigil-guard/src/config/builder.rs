//! Fluent assembly of in-memory configuration sources.

use std::collections::HashMap;

use crate::config::{ConfigurationSource, ConstraintSet, ProfileDefaults, TypeConfig};
use crate::error::Result;

/// Chainable builder producing an [`InMemoryConfigurationSource`].
///
/// Records for the same type are merged in the order they are added, so
/// later `configure` calls extend earlier ones rather than replacing them.
#[derive(Default)]
pub struct ConfigurationBuilder {
    types: HashMap<String, TypeConfig>,
    sets: HashMap<String, ConstraintSet>,
    profiles: ProfileDefaults,
}

impl ConfigurationBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a type record, merging with any record already added for the
    /// same type name.
    pub fn configure(mut self, config: TypeConfig) -> Self {
        match self.types.get_mut(&config.name) {
            Some(existing) => existing.merge(config),
            None => {
                self.types.insert(config.name.clone(), config);
            }
        }
        self
    }

    /// Adds a reusable constraint set, replacing any set with the same id.
    pub fn constraint_set(mut self, set: ConstraintSet) -> Self {
        self.sets.insert(set.id.clone(), set);
        self
    }

    /// Enables the named profile at construction.
    pub fn enable_profile(mut self, profile: impl Into<String>) -> Self {
        let profile = profile.into();
        self.profiles.disabled.retain(|p| p != &profile);
        if !self.profiles.enabled.contains(&profile) {
            self.profiles.enabled.push(profile);
        }
        self
    }

    /// Disables the named profile at construction.
    pub fn disable_profile(mut self, profile: impl Into<String>) -> Self {
        let profile = profile.into();
        self.profiles.enabled.retain(|p| p != &profile);
        if !self.profiles.disabled.contains(&profile) {
            self.profiles.disabled.push(profile);
        }
        self
    }

    /// Sets whether profiles without an explicit entry start out enabled.
    pub fn profiles_enabled_by_default(mut self, enabled: bool) -> Self {
        self.profiles.all_enabled_by_default = enabled;
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> InMemoryConfigurationSource {
        InMemoryConfigurationSource {
            types: self.types,
            sets: self.sets,
            profiles: self.profiles,
        }
    }
}

/// A [`ConfigurationSource`] backed by records held in memory.
pub struct InMemoryConfigurationSource {
    types: HashMap<String, TypeConfig>,
    sets: HashMap<String, ConstraintSet>,
    profiles: ProfileDefaults,
}

impl ConfigurationSource for InMemoryConfigurationSource {
    fn type_config(&self, type_name: &str) -> Result<Option<TypeConfig>> {
        Ok(self.types.get(type_name).cloned())
    }

    fn constraint_set(&self, set_id: &str) -> Result<Option<ConstraintSet>> {
        Ok(self.sets.get(set_id).cloned())
    }

    fn profile_defaults(&self) -> ProfileDefaults {
        self.profiles.clone()
    }
}
