//! Recursive dependency resolution
//!
//! Expands a set of requested modules into their full transitive closure,
//! synchronizing each module exactly once and holding the whole graph to a
//! single version per module. Modules are synchronized in depth-first,
//! left-to-right order of first encounter; downstream consumers depend on
//! that order, so it is part of the contract.

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::identifier::{IdentifierError, ModuleIdentifier};
use crate::manifest::{ManifestStore, ModuleManifest};
use crate::registry::AggregatedIndex;
use crate::sync::{SyncError, Synchronizer};

/// Fatal resolution failures. Each aborts the whole run; modules already
/// synchronized before the failure point stay on disk.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    InvalidIdentifier(#[from] IdentifierError),

    #[error("module {module} not found in any configured registry (requested via {chain})")]
    ModuleNotFound { module: String, chain: String },

    #[error(
        "dependency conflict: module '{module}' is requested in multiple versions:\n  \
         - version '{first}' (chain: {first_chain})\n  \
         - version '{second}' (chain: {second_chain})\n\
         all requesters of a module must agree on one version"
    )]
    VersionConflict {
        module: String,
        first: String,
        second: String,
        first_chain: String,
        second_chain: String,
    },

    #[error("failed to synchronize {module}: {source}")]
    SyncFailed {
        module: String,
        #[source]
        source: SyncError,
    },
}

/// One resolved module, in first-encounter order.
#[derive(Debug, Clone)]
pub struct ResolvedModule {
    /// The module, carrying the version reference the graph settled on
    pub identifier: ModuleIdentifier,
    /// Its manifest; `None` for manifest-less leaf modules
    pub manifest: Option<ModuleManifest>,
}

/// Record of one module's first resolution.
#[derive(Debug)]
struct SeenModule {
    /// Identifier with the stored version reference (upgradable in place)
    identifier: ModuleIdentifier,
    /// Request chain that first resolved this module, kept verbatim so a
    /// later conflict can replay it in the diagnostic
    chain: Vec<String>,
    manifest: Option<ModuleManifest>,
}

/// Book-keeping for one resolve run. Created empty per invocation and
/// discarded afterwards; the seen-table doubles as the ordered result.
#[derive(Debug, Default)]
struct ResolutionState {
    seen: IndexMap<String, SeenModule>,
    path: Vec<String>,
}

/// Walks the dependency graph, driving synchronization through the
/// injected collaborator and reading manifests to discover further edges.
pub struct DependencyResolver<'a> {
    index: &'a AggregatedIndex,
    manifests: &'a ManifestStore,
    synchronizer: &'a dyn Synchronizer,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(
        index: &'a AggregatedIndex,
        manifests: &'a ManifestStore,
        synchronizer: &'a dyn Synchronizer,
    ) -> Self {
        Self {
            index,
            manifests,
            synchronizer,
        }
    }

    /// Resolve and synchronize the given root requests and every
    /// transitive dependency, in depth-first left-to-right order.
    pub fn resolve(&self, roots: &[String]) -> Result<Vec<ResolvedModule>, ResolveError> {
        let mut state = ResolutionState::default();
        for request in roots {
            self.visit(request, &mut state)?;
        }
        info!("resolved {} modules", state.seen.len());
        Ok(state
            .seen
            .into_values()
            .map(|seen| ResolvedModule {
                identifier: seen.identifier,
                manifest: seen.manifest,
            })
            .collect())
    }

    fn visit(&self, request: &str, state: &mut ResolutionState) -> Result<(), ResolveError> {
        let identifier = ModuleIdentifier::parse(request)?;
        let qualified = identifier.qualified();

        if let Some(previous) = state.seen.get_mut(&qualified) {
            match (&previous.identifier.reference, &identifier.reference) {
                (Some(first), Some(second)) if first != second => {
                    return Err(ResolveError::VersionConflict {
                        module: qualified,
                        first: first.clone(),
                        second: second.clone(),
                        first_chain: previous.chain.join(" -> "),
                        second_chain: render_chain(&state.path, request),
                    });
                }
                (None, Some(second)) => {
                    // More specific wins, but the module was already
                    // synchronized and expanded at its default reference;
                    // the on-disk content may not correspond to this one.
                    warn!(
                        "module {} was synchronized without a version; \
                         recording later reference '{}' without re-fetching",
                        qualified, second
                    );
                    previous.identifier.reference = Some(second.clone());
                }
                _ => {}
            }
            return Ok(());
        }

        let mut chain = state.path.clone();
        chain.push(request.to_string());
        state.seen.insert(
            qualified.clone(),
            SeenModule {
                identifier: identifier.clone(),
                chain,
                manifest: None,
            },
        );

        let location = match self.index.resolve_location(&qualified) {
            Some(location) => location.to_string(),
            None => {
                return Err(ResolveError::ModuleNotFound {
                    module: qualified,
                    chain: render_chain(&state.path, request),
                });
            }
        };

        self.synchronizer
            .synchronize(&identifier, &location, identifier.reference.as_deref())
            .map_err(|e| ResolveError::SyncFailed {
                module: qualified.clone(),
                source: e,
            })?;

        let manifest = match self.manifests.load(&identifier.name) {
            Some(manifest) => manifest,
            None => {
                warn!("no manifest found for {qualified}; treating it as a leaf module");
                return Ok(());
            }
        };

        let depends = manifest.depends.clone();
        if let Some(entry) = state.seen.get_mut(&qualified) {
            entry.manifest = Some(manifest);
        }

        state.path.push(request.to_string());
        for dependency in &depends {
            if dependency.is_empty() {
                continue;
            }
            self.visit(dependency, state)?;
        }
        state.path.pop();

        Ok(())
    }
}

fn render_chain(path: &[String], request: &str) -> String {
    if path.is_empty() {
        request.to_string()
    } else {
        format!("{} -> {}", path.join(" -> "), request)
    }
}
