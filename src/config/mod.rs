//! Run configuration documents
//!
//! Two YAML documents drive a run: `sources.yaml` lists the registry
//! indexes to aggregate and `modules.yaml` lists the root module requests.
//! Either may be given as a local path or an http(s) URL; URL documents
//! are materialized next to the modules directory before use, and missing
//! local files are created from starter templates so the user has
//! something concrete to edit.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::fetch;

const MODULES_FILE: &str = "modules.yaml";
const SOURCES_FILE: &str = "sources.yaml";

const MODULES_TEMPLATE: &str = "\
# Root module requests, one per entry: namespace/Name[@ref]
# Example:
#   - demo/Heartbeat
#   - your-namespace/YourModule@dev
modules:
  - demo/Heartbeat
";

const SOURCES_TEMPLATE: &str = "\
# Registry indexes to aggregate. Lower priority loads first and wins ties.
sources:
  - url: https://example.org/modules/index.yaml
    priority: 0
";

/// One registry index reference in `sources.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Index document location (path or URL)
    pub url: String,
    /// Lower loads first; defaults to 0
    #[serde(default)]
    pub priority: i64,
    /// Trust key carried for a future verification step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// `sources.yaml`: the ordered list of registry indexes to aggregate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
}

impl SourcesConfig {
    /// Load from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("invalid sources document {}", path.display()))
    }

    /// Save to a YAML file, creating parent directories.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        write_file(path, &serde_yaml::to_string(self)?)
    }

    /// Append a source unless its URL is already configured.
    /// Returns whether the configuration changed.
    pub fn add_source(&mut self, entry: SourceEntry) -> bool {
        if self.sources.iter().any(|s| s.url == entry.url) {
            warn!("source already configured: {}", entry.url);
            return false;
        }
        self.sources.push(entry);
        true
    }

    /// Write the commented starter document.
    pub fn write_template(path: &Path) -> Result<()> {
        write_file(path, SOURCES_TEMPLATE)
    }
}

/// `modules.yaml`: the root module requests fed to the resolver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModulesConfig {
    #[serde(default)]
    pub modules: Vec<String>,
}

impl ModulesConfig {
    /// Load from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("invalid modules document {}", path.display()))
    }

    /// Write the commented starter document.
    pub fn write_template(path: &Path) -> Result<()> {
        write_file(path, MODULES_TEMPLATE)
    }
}

/// The two documents of one run, loaded and ready.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub modules: ModulesConfig,
    pub sources: SourcesConfig,
}

/// Load the run configuration for a workspace.
///
/// URL locations are downloaded into `modules_dir` first so the workspace
/// keeps local copies. Missing local files are created from the starter
/// templates; in that case `Ok(None)` is returned and the caller should
/// stop so the user can edit them before the first real run.
pub fn load_run_config(
    config_location: &str,
    sources_location: &str,
    modules_dir: &Path,
) -> Result<Option<RunConfig>> {
    fs::create_dir_all(modules_dir)
        .with_context(|| format!("failed to create {}", modules_dir.display()))?;

    let mut created = false;
    let config_path = materialize(config_location, modules_dir, MODULES_FILE, &mut created, |p| {
        ModulesConfig::write_template(p)
    })?;
    let sources_path = materialize(
        sources_location,
        modules_dir,
        SOURCES_FILE,
        &mut created,
        |p| SourcesConfig::write_template(p),
    )?;
    if created {
        info!("starter configuration created; edit it and re-run");
        return Ok(None);
    }

    Ok(Some(RunConfig {
        modules: ModulesConfig::from_file(&config_path)?,
        sources: SourcesConfig::from_file(&sources_path)?,
    }))
}

/// Resolve one document location to a local path, downloading URL
/// documents and writing a template for missing local files.
fn materialize(
    location: &str,
    modules_dir: &Path,
    file_name: &str,
    created: &mut bool,
    write_template: impl Fn(&Path) -> Result<()>,
) -> Result<PathBuf> {
    if fetch::is_url(location) {
        let local = modules_dir.join(file_name);
        fetch::download_to(location, &local)?;
        return Ok(local);
    }
    let path = PathBuf::from(location);
    if !path.exists() {
        warn!(
            "configuration file not found, creating template: {}",
            path.display()
        );
        write_template(&path)?;
        *created = true;
    }
    Ok(path)
}

fn write_file(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}
