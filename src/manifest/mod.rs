//! Module manifest extraction
//!
//! Every module embeds its metadata as a YAML block inside its definition
//! file, fenced between a start marker and `=== END MANIFEST ===` inside a
//! block comment. Two historical start-marker spellings exist
//! (`=== MODULE MANIFEST ===` and `=== MODULE MANIFEST V2 ===`); both use
//! the same document syntax, V2 merely populates template arguments.
//!
//! Malformed metadata never escalates past this module: a module whose
//! manifest is missing or unparsable is treated as having no dependencies.

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, warn};

/// Ordered `name -> default value` mapping for constructor/template
/// arguments. Values may be strings, numbers, booleans, lists, or nested
/// mappings.
pub type ArgMap = IndexMap<String, Value>;

/// Manifest parsing errors
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest body is not a valid document: {0}")]
    InvalidBody(#[from] serde_yaml::Error),
}

/// Parsed metadata block for one module
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleManifest {
    /// Human-readable description
    pub description: String,
    /// Constructor argument defaults, in declaration order
    pub constructor_args: ArgMap,
    /// Template argument defaults, in declaration order (V2 manifests)
    pub template_args: ArgMap,
    /// Logical device names the module needs from its host
    pub required_hardware: Vec<String>,
    /// Module identifiers this module depends on, in declaration order
    pub depends: Vec<String>,
}

/// Raw document shape before field normalization
#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    module_description: String,
    #[serde(default)]
    constructor_args: Option<Value>,
    #[serde(default)]
    template_args: Option<Value>,
    #[serde(default)]
    required_hardware: Option<Value>,
    #[serde(default)]
    depends: Option<Value>,
}

fn manifest_block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?s)/\*\s*=== MODULE MANIFEST(?: V2)? ===\s*(.*?)\s*=== END MANIFEST ===\s*\*/",
        )
        .expect("manifest marker pattern is valid")
    })
}

impl ModuleManifest {
    /// Extract the manifest block from module source text.
    ///
    /// `Ok(None)` when no marker pair is present; `Err` when a block was
    /// found but its body does not parse as a key/value document.
    pub fn extract(source: &str) -> Result<Option<Self>, ManifestError> {
        let captures = match manifest_block_pattern().captures(source) {
            Some(c) => c,
            None => return Ok(None),
        };
        let body = strip_comment_decoration(&captures[1]);
        let raw: RawManifest = serde_yaml::from_str(&body)?;
        Ok(Some(Self::from_raw(raw)))
    }

    fn from_raw(raw: RawManifest) -> Self {
        Self {
            description: raw.module_description,
            constructor_args: normalize_args("constructor_args", raw.constructor_args.as_ref()),
            template_args: normalize_args("template_args", raw.template_args.as_ref()),
            required_hardware: normalize_names("required_hardware", raw.required_hardware.as_ref()),
            depends: normalize_names("depends", raw.depends.as_ref()),
        }
    }
}

/// Normalize an argument field into one ordered mapping.
///
/// Three source shapes are accepted: a mapping, a list of single-key
/// mappings (the list form exists to guarantee order in hand-written
/// documents), and a bare name, which maps to an empty default.
/// Unrecognized shapes are dropped with a warning.
fn normalize_args(field: &str, value: Option<&Value>) -> ArgMap {
    let mut args = ArgMap::new();
    match value {
        None | Some(Value::Null) => {}
        Some(Value::Mapping(map)) => {
            for (key, val) in map {
                insert_arg(field, &mut args, key, val);
            }
        }
        Some(Value::Sequence(items)) => {
            for item in items {
                match item {
                    Value::Mapping(map) => {
                        for (key, val) in map {
                            insert_arg(field, &mut args, key, val);
                        }
                    }
                    Value::String(name) => {
                        args.insert(name.clone(), Value::String(String::new()));
                    }
                    other => {
                        warn!("{field}: entry format not recognized, dropping: {other:?}");
                    }
                }
            }
        }
        Some(Value::String(name)) => {
            args.insert(name.clone(), Value::String(String::new()));
        }
        Some(other) => {
            warn!("{field}: format not recognized, dropping: {other:?}");
        }
    }
    args
}

fn insert_arg(field: &str, args: &mut ArgMap, key: &Value, value: &Value) {
    match key.as_str() {
        Some(key) => {
            args.insert(key.to_string(), value.clone());
        }
        None => warn!("{field}: non-string key dropped: {key:?}"),
    }
}

/// Normalize a name-list field: a bare string becomes a one-element list,
/// absence becomes an empty list. Non-string entries are dropped with a
/// warning.
fn normalize_names(field: &str, value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(name)) => vec![name.clone()],
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(name) => Some(name.clone()),
                Value::Null => None,
                other => {
                    warn!("{field}: entry format not recognized, dropping: {other:?}");
                    None
                }
            })
            .collect(),
        Some(other) => {
            warn!("{field}: format not recognized, dropping: {other:?}");
            Vec::new()
        }
    }
}

/// Strip a leading `*` gutter from every line of a comment block.
///
/// The gutter is only stripped when every non-empty line carries one, so
/// YAML content that legitimately starts with `*` (aliases) survives.
fn strip_comment_decoration(block: &str) -> String {
    let decorated = block.lines().all(|line| {
        let trimmed = line.trim_start();
        trimmed.is_empty() || trimmed.starts_with('*')
    });
    if !decorated {
        return block.to_string();
    }
    block
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            trimmed
                .strip_prefix("* ")
                .or_else(|| trimmed.strip_prefix('*'))
                .unwrap_or(trimmed)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Locates and loads manifests for synchronized modules.
///
/// A module named `Name` keeps its definition file at `<dir>/Name/Name.hpp`.
/// That deterministic path is the contract the synchronization collaborator
/// upholds, and it is what lets the resolver read a module's dependencies
/// right after the module is materialized.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    modules_dir: PathBuf,
}

impl ManifestStore {
    /// Create a store over the given modules directory.
    pub fn new<P: AsRef<Path>>(modules_dir: P) -> Self {
        Self {
            modules_dir: modules_dir.as_ref().to_path_buf(),
        }
    }

    /// Deterministic definition-file path for a module name.
    pub fn definition_path(&self, name: &str) -> PathBuf {
        self.modules_dir.join(name).join(format!("{name}.hpp"))
    }

    /// Load the manifest for a synchronized module.
    ///
    /// `None` when the definition file is missing, carries no manifest
    /// block, or carries one that does not parse; the parse failure is
    /// logged with its location and the module degrades to a leaf.
    pub fn load(&self, name: &str) -> Option<ModuleManifest> {
        let path = self.definition_path(name);
        let source = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                debug!("no definition file at {}: {}", path.display(), e);
                return None;
            }
        };
        match ModuleManifest::extract(&source) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!("failed to parse manifest in {}: {}", path.display(), e);
                None
            }
        }
    }
}
