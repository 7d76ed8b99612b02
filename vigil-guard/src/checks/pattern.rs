//! Regular expression constraint.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::{Constraint, Context, EntityRef, Value};
use crate::error::{Result, VigilError};
use crate::validator::Validator;

/// Cache for compiled patterns, keyed by source text. Configuration
/// sources tend to repeat the same handful of patterns across types.
static REGEX_CACHE: Lazy<RwLock<HashMap<String, Regex>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

fn compile(pattern: &str) -> Result<Regex> {
    {
        let cache = REGEX_CACHE.read().map_err(|e| {
            VigilError::internal(format!("failed to acquire pattern cache lock: {e}"))
        })?;
        if let Some(regex) = cache.get(pattern) {
            return Ok(regex.clone());
        }
    }
    let regex = Regex::new(pattern)
        .map_err(|e| VigilError::configuration(format!("invalid pattern '{pattern}': {e}")))?;
    let mut cache = REGEX_CACHE.write().map_err(|e| {
        VigilError::internal(format!("failed to acquire pattern cache lock: {e}"))
    })?;
    cache.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

/// Checks a string value against a regular expression.
///
/// Null values satisfy the constraint; non-string values do not. The
/// pattern is compiled once at construction, and an invalid pattern is a
/// configuration error.
///
/// # Examples
///
/// ```rust
/// use vigil_guard::checks::PatternConstraint;
///
/// let iban = PatternConstraint::new(r"^[A-Z]{2}\d{2}[A-Z0-9]{1,30}$")?;
/// # Ok::<(), vigil_guard::VigilError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PatternConstraint {
    pattern: Regex,
}

impl PatternConstraint {
    /// Compiles the pattern, reusing a cached compilation when the same
    /// source text was seen before. Invalid patterns fail with a
    /// configuration error.
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: compile(pattern)?,
        })
    }
}

impl Constraint for PatternConstraint {
    fn name(&self) -> &str {
        "pattern"
    }

    fn satisfied(
        &self,
        _entity: Option<&EntityRef>,
        value: &Value,
        _context: &Context,
        _validator: &Validator,
    ) -> Result<bool> {
        if value.is_null() {
            return Ok(true);
        }
        match value.as_str() {
            Some(s) => Ok(self.pattern.is_match(s)),
            None => Ok(false),
        }
    }

    fn default_message(&self) -> String {
        "{context} does not match the pattern '{pattern}'".to_string()
    }

    fn message_variables(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        vars.insert("pattern".to_string(), self.pattern.as_str().to_string());
        vars
    }
}
