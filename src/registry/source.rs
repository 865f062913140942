//! One module source index
//!
//! Handles loading, querying, and maintaining a single index document:
//! a required `namespace`, an optional `mirror_of` relationship, and the
//! ordered list of module fetch locations published under it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::fetch;

/// Registry index errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to load index: {0}")]
    LoadFailed(String),

    #[error("invalid index document: {0}")]
    InvalidIndex(String),

    #[error("index is missing the required namespace field: {0}")]
    MissingNamespace(String),

    #[error("failed to save index: {0}")]
    SaveFailed(String),
}

/// On-disk/on-wire shape of an index document.
///
/// `namespace` is required but kept optional here so its absence surfaces
/// as a distinct load failure instead of a generic parse error.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexDocument {
    namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mirror_of: Option<String>,
    #[serde(default)]
    modules: Vec<String>,
}

/// One loaded module source: a namespaced index of fetch locations.
#[derive(Debug, Clone)]
pub struct RegistrySource {
    /// Where the index document was loaded from (path or URL)
    pub location: String,
    /// Trust key carried for a future verification step; never interpreted
    pub public_key: Option<String>,
    /// Lower loads first and wins ties during aggregation
    pub priority: i64,
    /// Namespace declared by the index
    pub namespace: String,
    /// Namespace this source republishes, when it is a mirror
    pub mirror_of: Option<String>,
    /// Fetch locations in declaration order, for document round-tripping
    module_locations: Vec<String>,
    /// Bare module name -> fetch location, in declaration order
    entries: IndexMap<String, String>,
}

impl RegistrySource {
    /// Load an index document from a local path or http(s) URL.
    pub fn load(
        location: &str,
        public_key: Option<String>,
        priority: i64,
    ) -> Result<Self, RegistryError> {
        let text = fetch::read_document(location)
            .map_err(|e| RegistryError::LoadFailed(format!("{location}: {e:#}")))?;
        Self::from_document(location, &text, public_key, priority)
    }

    /// Parse an already-fetched index document.
    pub fn from_document(
        location: &str,
        text: &str,
        public_key: Option<String>,
        priority: i64,
    ) -> Result<Self, RegistryError> {
        let doc: IndexDocument = serde_yaml::from_str(text)
            .map_err(|e| RegistryError::InvalidIndex(format!("{location}: {e}")))?;
        let namespace = doc
            .namespace
            .filter(|ns| !ns.is_empty())
            .ok_or_else(|| RegistryError::MissingNamespace(location.to_string()))?;

        let mut entries = IndexMap::new();
        for module_location in &doc.modules {
            let name = fetch::module_name_from_location(module_location);
            entries.insert(name, module_location.clone());
        }
        debug!(
            "loaded index {} (namespace {}, {} modules)",
            location,
            namespace,
            entries.len()
        );

        Ok(Self {
            location: location.to_string(),
            public_key,
            priority,
            namespace,
            mirror_of: doc.mirror_of,
            module_locations: doc.modules,
            entries,
        })
    }

    /// Namespace this source's modules resolve under: the mirrored
    /// namespace when the source is a mirror, its own otherwise.
    pub fn effective_namespace(&self) -> &str {
        self.mirror_of.as_deref().unwrap_or(&self.namespace)
    }

    /// `(bare name, fetch location)` pairs in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, location)| (name.as_str(), location.as_str()))
    }

    /// Fetch location of a bare module name in this source.
    pub fn location_of(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Append a fetch location unless it is already listed.
    /// Returns whether the index changed.
    pub fn add_module_location(&mut self, module_location: &str) -> bool {
        if self.module_locations.iter().any(|l| l == module_location) {
            warn!("repository already listed in index: {module_location}");
            return false;
        }
        self.module_locations.push(module_location.to_string());
        self.entries.insert(
            fetch::module_name_from_location(module_location),
            module_location.to_string(),
        );
        true
    }

    /// Serialize this source back to its index document form.
    pub fn to_document(&self) -> Result<String, RegistryError> {
        let doc = IndexDocument {
            namespace: Some(self.namespace.clone()),
            mirror_of: self.mirror_of.clone(),
            modules: self.module_locations.clone(),
        };
        serde_yaml::to_string(&doc)
            .map_err(|e| RegistryError::SaveFailed(format!("{}: {e}", self.location)))
    }

    /// Write the index document to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        let text = self.to_document()?;
        write_document(path, &text)
    }

    /// Write a starter index document.
    pub fn write_template(
        path: &Path,
        namespace: &str,
        mirror_of: Option<&str>,
    ) -> Result<(), RegistryError> {
        let doc = IndexDocument {
            namespace: Some(namespace.to_string()),
            mirror_of: mirror_of.map(str::to_string),
            modules: vec!["https://example.org/modules/Heartbeat.git".to_string()],
        };
        let text = serde_yaml::to_string(&doc)
            .map_err(|e| RegistryError::SaveFailed(format!("{}: {e}", path.display())))?;
        write_document(path, &text)
    }
}

fn write_document(path: &Path, text: &str) -> Result<(), RegistryError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| RegistryError::SaveFailed(format!("{}: {e}", parent.display())))?;
    }
    fs::write(path, text).map_err(|e| RegistryError::SaveFailed(format!("{}: {e}", path.display())))
}
