//! Model identifiers
//!
//! Models are addressed as `"<provider>/<model>"`. The provider component is
//! derived for display and per-provider breaker/accounting keys; equality is
//! always by the full string.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque model identifier in the form `"<provider>/<model>"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    /// Create a model id; rejects empty or all-whitespace input
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::Validation("model id must not be empty".to_string()));
        }
        Ok(Self(id))
    }

    /// The full id string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The provider component (text before the first `/`), or the whole id
    /// when no separator is present. Display/grouping only.
    #[must_use]
    pub fn provider(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_prefix() {
        let id = ModelId::new("anthropic/claude-sonnet").unwrap();
        assert_eq!(id.provider(), "anthropic");
        assert_eq!(id.as_str(), "anthropic/claude-sonnet");
    }

    #[test]
    fn test_no_separator_falls_back_to_full_id() {
        let id = ModelId::new("local-model").unwrap();
        assert_eq!(id.provider(), "local-model");
    }

    #[test]
    fn test_empty_rejected() {
        assert!(ModelId::new("").is_err());
        assert!(ModelId::new("   ").is_err());
    }

    #[test]
    fn test_equality_by_full_string() {
        let a = ModelId::new("a/x").unwrap();
        let b = ModelId::new("a/x").unwrap();
        let c = ModelId::new("a/y").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_serde_transparent() {
        let id = ModelId::new("a/x").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"a/x\"");
        let back: ModelId = serde_json::from_str("\"b/y\"").unwrap();
        assert_eq!(back.as_str(), "b/y");
    }
}
