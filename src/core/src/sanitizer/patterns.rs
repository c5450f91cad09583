use regex::{RegexSet, RegexSetBuilder};

use crate::error_handling::types::ConfigError;

/// Key-name patterns that always trigger redaction. Matching is
/// case-insensitive and unanchored, so `X-Api-Key` and `userPassword` match.
pub const BUILTIN_PATTERNS: [&str; 10] = [
    "password",
    "passwd",
    "secret",
    "token",
    "api[_-]?key",
    "authorization",
    "bearer",
    "credential",
    "ssn",
    "credit[_-]?card",
];

/// Compiled set of sensitive key patterns.
#[derive(Debug, Clone)]
pub struct KeyMatcher {
    set: RegexSet,
}

impl KeyMatcher {
    /// Built-in patterns followed by `extra`.
    pub fn new(extra: &[String]) -> Result<Self, ConfigError> {
        let patterns = BUILTIN_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .chain(extra.iter().cloned());
        let set = RegexSetBuilder::new(patterns)
            .case_insensitive(true)
            .build()
            .map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;
        Ok(Self { set })
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        self.set.is_match(key)
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}
