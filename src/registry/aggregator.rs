//! Multi-source aggregation
//!
//! Merges every configured source index into one namespace-qualified
//! lookup table. Sources load in ascending priority order; the first
//! source to publish a qualified name owns its chosen fetch location,
//! and every other publisher of the same name is retained as a candidate
//! for diagnostics.

use indexmap::IndexMap;
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::config::SourceEntry;
use crate::registry::source::RegistrySource;

/// One `(fetch location, owning source)` pair for a qualified name.
#[derive(Debug, Clone)]
struct Candidate {
    location: String,
    source: usize,
}

/// The read-only merged lookup built once per run.
///
/// Invariant: every qualified name in the chosen mapping also appears in
/// the candidates mapping, and its chosen location is that name's first
/// candidate in priority order.
#[derive(Debug)]
pub struct AggregatedIndex {
    sources: Vec<RegistrySource>,
    chosen: IndexMap<String, Candidate>,
    candidates: IndexMap<String, Vec<Candidate>>,
}

impl AggregatedIndex {
    /// Load every configured source and merge them.
    ///
    /// A source that fails to load (unreachable, or missing its namespace)
    /// is logged and skipped; aggregation proceeds with the remainder.
    pub fn load(entries: &[SourceEntry]) -> Self {
        let mut sources = Vec::new();
        for entry in entries {
            match RegistrySource::load(&entry.url, entry.public_key.clone(), entry.priority) {
                Ok(source) => sources.push(source),
                Err(e) => warn!("skipping source {}: {}", entry.url, e),
            }
        }
        Self::from_sources(sources)
    }

    /// Merge already-loaded sources. Sorting by priority is stable, so
    /// equal priorities keep their input order.
    pub fn from_sources(mut sources: Vec<RegistrySource>) -> Self {
        sources.sort_by_key(|source| source.priority);

        let mut chosen: IndexMap<String, Candidate> = IndexMap::new();
        let mut candidates: IndexMap<String, Vec<Candidate>> = IndexMap::new();
        for (index, source) in sources.iter().enumerate() {
            let namespace = source.effective_namespace();
            for (name, location) in source.entries() {
                let qualified = format!("{namespace}/{name}");
                let candidate = Candidate {
                    location: location.to_string(),
                    source: index,
                };
                candidates
                    .entry(qualified.clone())
                    .or_default()
                    .push(candidate.clone());
                chosen.entry(qualified).or_insert(candidate);
            }
        }

        info!(
            "aggregated {} modules from {} sources",
            chosen.len(),
            sources.len()
        );
        Self {
            sources,
            chosen,
            candidates,
        }
    }

    /// Chosen fetch location for a qualified name.
    pub fn resolve_location(&self, qualified: &str) -> Option<&str> {
        self.chosen.get(qualified).map(|c| c.location.as_str())
    }

    /// Source that owns the chosen fetch location for a qualified name.
    pub fn resolve_source(&self, qualified: &str) -> Option<&RegistrySource> {
        self.chosen.get(qualified).map(|c| &self.sources[c.source])
    }

    /// Every `(fetch location, source)` candidate for a qualified name,
    /// in priority order.
    pub fn candidates_for(&self, qualified: &str) -> Vec<(&str, &RegistrySource)> {
        self.candidates
            .get(qualified)
            .map(|list| {
                list.iter()
                    .map(|c| (c.location.as_str(), &self.sources[c.source]))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All qualified names known to the aggregation, sorted.
    pub fn all_qualified_names(&self) -> BTreeSet<String> {
        self.chosen.keys().cloned().collect()
    }

    /// The loaded sources, in priority order.
    pub fn sources(&self) -> &[RegistrySource] {
        &self.sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn source(namespace: &str, mirror_of: Option<&str>, priority: i64, names: &[&str]) -> RegistrySource {
        let mut doc = format!("namespace: {namespace}\n");
        if let Some(mirrored) = mirror_of {
            doc.push_str(&format!("mirror_of: {mirrored}\n"));
        }
        doc.push_str("modules:\n");
        for name in names {
            doc.push_str(&format!("  - https://{namespace}.example/{name}.git\n"));
        }
        RegistrySource::from_document(
            &format!("test://{namespace}"),
            &doc,
            None,
            priority,
        )
        .unwrap()
    }

    #[test]
    fn test_lowest_priority_source_wins() {
        let index = AggregatedIndex::from_sources(vec![
            source("org", None, 5, &["Motor"]),
            source("mirror", Some("org"), 0, &["Motor"]),
        ]);
        assert_eq!(
            index.resolve_location("org/Motor"),
            Some("https://mirror.example/Motor.git")
        );
        assert_eq!(index.candidates_for("org/Motor").len(), 2);
    }

    #[test]
    fn test_priority_ties_keep_input_order() {
        let index = AggregatedIndex::from_sources(vec![
            source("org", None, 0, &["Motor"]),
            source("mirror", Some("org"), 0, &["Motor"]),
        ]);
        assert_eq!(
            index.resolve_location("org/Motor"),
            Some("https://org.example/Motor.git")
        );
    }

    #[test]
    fn test_mirror_contributes_under_mirrored_namespace() {
        let index = AggregatedIndex::from_sources(vec![source("m", Some("org"), 0, &["Servo"])]);
        assert_eq!(index.resolve_location("m/Servo"), None);
        assert!(index.resolve_location("org/Servo").is_some());
        assert_eq!(
            index.all_qualified_names(),
            BTreeSet::from(["org/Servo".to_string()])
        );
    }

    #[test]
    fn test_resolve_source_reports_the_owning_registry() {
        let index = AggregatedIndex::from_sources(vec![
            source("mirror", Some("org"), 0, &["Motor"]),
            source("org", None, 1, &["Motor"]),
        ]);
        let owner = index.resolve_source("org/Motor").unwrap();
        assert_eq!(owner.namespace, "mirror");
        assert_eq!(owner.mirror_of.as_deref(), Some("org"));
    }

    proptest! {
        /// Every chosen entry is the first candidate for its name, and that
        /// candidate's priority is minimal among all candidates.
        #[test]
        fn prop_chosen_is_first_candidate_by_priority(
            layout in proptest::collection::vec(
                (0i64..4, proptest::collection::vec("[A-D]", 1..4)),
                0..6,
            )
        ) {
            let sources: Vec<RegistrySource> = layout
                .iter()
                .enumerate()
                .map(|(i, (priority, names))| {
                    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
                    source(&format!("ns{i}"), Some("org"), *priority, &name_refs)
                })
                .collect();
            let index = AggregatedIndex::from_sources(sources);

            for qualified in index.all_qualified_names() {
                let candidates = index.candidates_for(&qualified);
                prop_assert!(!candidates.is_empty());
                let chosen = index.resolve_location(&qualified).unwrap();
                prop_assert_eq!(chosen, candidates[0].0);
                let min_priority = candidates.iter().map(|(_, s)| s.priority).min().unwrap();
                prop_assert_eq!(candidates[0].1.priority, min_priority);
            }
        }
    }
}
