//! modsync - multi-source module registry aggregation and recursive
//! dependency synchronization
//!
//! This crate fetches independently-versioned component modules from
//! namespaced registry indexes into a local workspace, following the
//! dependency declarations embedded in each module's manifest block.
//!
//! ## Pipeline
//!
//! 1. **Registries**: every configured source index is loaded and merged
//!    into one namespace-qualified lookup, honoring priority ordering and
//!    mirror relationships ([`registry`]).
//! 2. **Manifests**: each module embeds a YAML metadata block in its
//!    definition file; two historical marker spellings are accepted
//!    ([`manifest`]).
//! 3. **Resolution**: root requests are expanded depth-first into the
//!    full transitive closure, each module is synchronized exactly once,
//!    and the whole graph is held to a single version per module
//!    ([`resolver`]).
//!
//! ## Design Principles
//!
//! 1. **One snapshot per run**: the aggregated index is built once and
//!    read-only afterwards; resolution state lives and dies with one
//!    resolve call.
//! 2. **Injected synchronization**: module content is materialized
//!    through the [`sync::Synchronizer`] boundary, which must be
//!    idempotent so re-running after a fixed configuration is cheap.
//! 3. **Tolerant metadata, strict versions**: malformed manifests degrade
//!    to dependency-free leaves with a warning; version conflicts abort
//!    the run with both request chains.

pub mod config;
pub mod fetch;
pub mod identifier;
pub mod logging;
pub mod manifest;
pub mod registry;
pub mod resolver;
pub mod sync;

pub use identifier::{IdentifierError, ModuleIdentifier};
pub use manifest::{ManifestStore, ModuleManifest};
pub use registry::{AggregatedIndex, RegistryError, RegistrySource};
pub use resolver::{DependencyResolver, ResolveError, ResolvedModule};
pub use sync::{GitSynchronizer, SyncError, Synchronizer};
