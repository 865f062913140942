//! Module identifiers
//!
//! Every module is addressed as `namespace/Name`, optionally narrowed to a
//! specific revision with an `@ref` suffix (branch, tag, or commit). Two
//! identifiers refer to the same module when namespace and name match; the
//! version reference only matters for conflict detection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier parsing errors
#[derive(Debug, Error)]
pub enum IdentifierError {
    #[error("invalid module id (expected namespace/Name[@ref]): {0}")]
    Invalid(String),
}

/// A parsed `namespace/Name[@ref]` module identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleIdentifier {
    /// Namespace the module is published under
    pub namespace: String,
    /// Bare module name
    pub name: String,
    /// Optional version reference (branch/tag/commit)
    pub reference: Option<String>,
}

impl ModuleIdentifier {
    /// Parse an identifier string. The reference, when present, must be
    /// non-empty; namespace and name may not contain `/` or `@`.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let invalid = || IdentifierError::Invalid(raw.to_string());

        let (path, reference) = match raw.split_once('@') {
            Some((_, r)) if r.is_empty() => return Err(invalid()),
            Some((p, r)) => (p, Some(r.to_string())),
            None => (raw, None),
        };

        let (namespace, name) = path.split_once('/').ok_or_else(invalid)?;
        if namespace.is_empty() || name.is_empty() || name.contains('/') {
            return Err(invalid());
        }

        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            reference,
        })
    }

    /// `namespace/Name` without the version reference. This is the globally
    /// unique key a module resolves under.
    pub fn qualified(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Whether two identifiers address the same module, regardless of the
    /// version reference.
    pub fn same_module(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.name == other.name
    }
}

impl fmt::Display for ModuleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reference {
            Some(r) => write!(f, "{}/{}@{}", self.namespace, self.name, r),
            None => write!(f, "{}/{}", self.namespace, self.name),
        }
    }
}

impl FromStr for ModuleIdentifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_without_reference() {
        let id = ModuleIdentifier::parse("org/BlinkLED").unwrap();
        assert_eq!(id.namespace, "org");
        assert_eq!(id.name, "BlinkLED");
        assert_eq!(id.reference, None);
        assert_eq!(id.qualified(), "org/BlinkLED");
    }

    #[test]
    fn test_parse_with_reference() {
        let id = ModuleIdentifier::parse("org/Motor@v1.2").unwrap();
        assert_eq!(id.reference.as_deref(), Some("v1.2"));
        assert_eq!(id.to_string(), "org/Motor@v1.2");
    }

    #[test]
    fn test_parse_rejects_malformed_ids() {
        for bad in ["Motor", "/Motor", "org/", "org/Motor@", "org/a/b", "@ref", ""] {
            assert!(ModuleIdentifier::parse(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_same_module_ignores_reference() {
        let a = ModuleIdentifier::parse("org/Motor@v1").unwrap();
        let b = ModuleIdentifier::parse("org/Motor@v2").unwrap();
        let c = ModuleIdentifier::parse("other/Motor").unwrap();
        assert!(a.same_module(&b));
        assert!(!a.same_module(&c));
    }
}
