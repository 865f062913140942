//! Module content synchronization
//!
//! The resolver drives module fetching through the [`Synchronizer`]
//! boundary. Implementations must be idempotent (fetch-if-absent,
//! update-in-place otherwise) and must leave a module's content at
//! `<modules_dir>/<Name>`, the deterministic path the manifest store
//! reads from.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::info;

use crate::identifier::ModuleIdentifier;

/// Synchronization errors
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("git command failed: {0}")]
    GitCommand(String),

    #[error("synchronization failed: {0}")]
    Failed(String),
}

/// External collaborator that materializes a module's content locally.
pub trait Synchronizer {
    /// Fetch or update one module at its deterministic local path.
    ///
    /// Safe to call repeatedly for the same module; a later call updates
    /// the existing checkout in place.
    fn synchronize(
        &self,
        module: &ModuleIdentifier,
        fetch_location: &str,
        version_ref: Option<&str>,
    ) -> Result<(), SyncError>;
}

/// Synchronizer backed by the system git command.
///
/// Each module lives in its own clone at `<modules_dir>/<Name>`; an
/// existing clone is fetched and pulled instead of re-cloned, which is
/// what makes re-running after a fixed configuration cheap.
#[derive(Debug, Clone)]
pub struct GitSynchronizer {
    modules_dir: PathBuf,
}

impl GitSynchronizer {
    pub fn new<P: AsRef<Path>>(modules_dir: P) -> Self {
        Self {
            modules_dir: modules_dir.as_ref().to_path_buf(),
        }
    }

    fn run_git(args: &[&OsStr], workdir: Option<&Path>) -> Result<(), SyncError> {
        let rendered = args
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        let mut command = Command::new("git");
        command.args(args);
        if let Some(dir) = workdir {
            command.current_dir(dir);
        }
        let status = command
            .status()
            .map_err(|e| SyncError::GitCommand(format!("git {rendered}: {e}")))?;
        if !status.success() {
            return Err(SyncError::GitCommand(format!(
                "git {rendered} exited with {status}"
            )));
        }
        Ok(())
    }
}

impl Synchronizer for GitSynchronizer {
    fn synchronize(
        &self,
        module: &ModuleIdentifier,
        fetch_location: &str,
        version_ref: Option<&str>,
    ) -> Result<(), SyncError> {
        let target = self.modules_dir.join(&module.name);

        if target.join(".git").is_dir() {
            info!("updating module {}", module.qualified());
            Self::run_git(&[OsStr::new("fetch"), OsStr::new("--all")], Some(&target))?;
            Self::run_git(&[OsStr::new("pull")], Some(&target))?;
            if let Some(reference) = version_ref {
                Self::run_git(
                    &[OsStr::new("checkout"), OsStr::new(reference)],
                    Some(&target),
                )?;
            }
        } else {
            info!("cloning module {}", module.qualified());
            fs::create_dir_all(&self.modules_dir).map_err(|e| {
                SyncError::Failed(format!("{}: {e}", self.modules_dir.display()))
            })?;
            let mut args: Vec<&OsStr> =
                vec![OsStr::new("clone"), OsStr::new("--recurse-submodules")];
            if let Some(reference) = version_ref {
                args.push(OsStr::new("--branch"));
                args.push(OsStr::new(reference));
            }
            args.push(OsStr::new(fetch_location));
            args.push(target.as_os_str());
            Self::run_git(&args, None)?;
            if let Some(reference) = version_ref {
                Self::run_git(
                    &[OsStr::new("checkout"), OsStr::new(reference)],
                    Some(&target),
                )?;
            }
        }

        Ok(())
    }
}
