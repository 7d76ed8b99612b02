//! Activation profile state.

use std::collections::HashSet;

/// The implicit profile of checks that declare no profiles of their own.
pub const DEFAULT_PROFILE: &str = "default";

/// Tracks which activation profiles are currently enabled.
///
/// The state is an "all enabled by default" flag plus an enabled and a
/// disabled set; which set a toggle mutates depends on the flag. Checks,
/// exclusions, and conditions that declare no profiles belong to the
/// implicit [`DEFAULT_PROFILE`].
///
/// # Examples
///
/// ```rust
/// use vigil_guard::core::ProfileState;
///
/// let mut profiles = ProfileState::new();
/// assert!(profiles.is_enabled("strict"));
///
/// profiles.disable_all();
/// profiles.enable("strict");
/// assert!(profiles.is_enabled("strict"));
/// assert!(!profiles.is_enabled("default"));
/// ```
#[derive(Debug, Clone)]
pub struct ProfileState {
    all_enabled_by_default: bool,
    enabled: HashSet<String>,
    disabled: HashSet<String>,
}

impl Default for ProfileState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileState {
    /// Creates the initial state with every profile enabled.
    pub fn new() -> Self {
        Self {
            all_enabled_by_default: true,
            enabled: HashSet::new(),
            disabled: HashSet::new(),
        }
    }

    /// Enables a single profile.
    pub fn enable(&mut self, profile: &str) {
        if self.all_enabled_by_default {
            self.disabled.remove(profile);
        } else {
            self.enabled.insert(profile.to_string());
        }
    }

    /// Disables a single profile.
    pub fn disable(&mut self, profile: &str) {
        if self.all_enabled_by_default {
            self.disabled.insert(profile.to_string());
        } else {
            self.enabled.remove(profile);
        }
    }

    /// Enables all profiles, discarding prior toggles.
    pub fn enable_all(&mut self) {
        self.all_enabled_by_default = true;
        self.enabled.clear();
        self.disabled.clear();
    }

    /// Disables all profiles, discarding prior toggles.
    pub fn disable_all(&mut self) {
        self.all_enabled_by_default = false;
        self.enabled.clear();
        self.disabled.clear();
    }

    /// Returns true if the named profile is enabled.
    pub fn is_enabled(&self, profile: &str) -> bool {
        if self.all_enabled_by_default {
            !self.disabled.contains(profile)
        } else {
            self.enabled.contains(profile)
        }
    }

    /// Returns true if any of the given profiles is enabled.
    ///
    /// An empty list tests the implicit [`DEFAULT_PROFILE`].
    pub fn is_any_enabled(&self, profiles: &[String]) -> bool {
        if profiles.is_empty() {
            self.is_enabled(DEFAULT_PROFILE)
        } else {
            profiles.iter().any(|p| self.is_enabled(p))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(profiles: &[&str]) -> Vec<String> {
        profiles.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_all_enabled_by_default() {
        let profiles = ProfileState::new();
        assert!(profiles.is_enabled("anything"));
        assert!(profiles.is_any_enabled(&[]));
    }

    #[test]
    fn test_disable_single() {
        let mut profiles = ProfileState::new();
        profiles.disable("strict");
        assert!(!profiles.is_enabled("strict"));
        assert!(profiles.is_enabled("lenient"));
        assert!(!profiles.is_any_enabled(&list(&["strict"])));
        assert!(profiles.is_any_enabled(&list(&["strict", "lenient"])));
    }

    #[test]
    fn test_disable_all_then_enable() {
        let mut profiles = ProfileState::new();
        profiles.disable_all();
        assert!(!profiles.is_enabled("strict"));
        assert!(!profiles.is_any_enabled(&[]));

        profiles.enable("strict");
        assert!(profiles.is_enabled("strict"));
        assert!(!profiles.is_enabled(DEFAULT_PROFILE));
    }

    #[test]
    fn test_enable_all_resets_toggles() {
        let mut profiles = ProfileState::new();
        profiles.disable("strict");
        profiles.enable_all();
        assert!(profiles.is_enabled("strict"));
    }

    #[test]
    fn test_empty_list_tests_default_profile() {
        let mut profiles = ProfileState::new();
        profiles.disable(DEFAULT_PROFILE);
        assert!(!profiles.is_any_enabled(&[]));
        assert!(profiles.is_any_enabled(&list(&["strict"])));
    }
}
