//! Document transport
//!
//! Registry indexes and run configuration are plain documents that may live
//! on local disk or behind http(s). Everything network-facing in the crate
//! goes through the helpers here.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Whether a location is an http(s) URL rather than a local path.
pub fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Read a document from a local path or an http(s) URL.
pub fn read_document(location: &str) -> Result<String> {
    if is_url(location) {
        let response = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed to build http client")?
            .get(location)
            .send()
            .with_context(|| format!("request failed: {location}"))?
            .error_for_status()
            .with_context(|| format!("request failed: {location}"))?;
        response
            .text()
            .with_context(|| format!("failed to read response body: {location}"))
    } else {
        fs::read_to_string(location).with_context(|| format!("failed to read {location}"))
    }
}

/// Download a document to a local file, creating parent directories. Used to
/// keep a local copy of URL-supplied configuration next to the workspace.
pub fn download_to(url: &str, dest: &Path) -> Result<()> {
    info!("downloading {} -> {}", url, dest.display());
    let body = read_document(url)?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(dest, body).with_context(|| format!("failed to write {}", dest.display()))?;
    Ok(())
}

/// Derive a module name from its fetch location: the trailing path segment,
/// with any `.git` suffix stripped.
pub fn module_name_from_location(location: &str) -> String {
    let trimmed = location.trim_end_matches('/');
    let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
    name.strip_suffix(".git").unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_name_from_location() {
        assert_eq!(
            module_name_from_location("https://github.com/org/BlinkLED.git"),
            "BlinkLED"
        );
        assert_eq!(
            module_name_from_location("https://example.org/repos/Motor/"),
            "Motor"
        );
        assert_eq!(module_name_from_location("../local/Servo"), "Servo");
        assert_eq!(module_name_from_location("Servo"), "Servo");
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.org/index.yaml"));
        assert!(is_url("http://example.org/index.yaml"));
        assert!(!is_url("Modules/sources.yaml"));
        assert!(!is_url("/abs/path/index.yaml"));
    }
}
