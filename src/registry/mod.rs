//! Registry loading and aggregation
//!
//! A registry ("source") is one published index mapping bare module names
//! to fetch locations under a namespace. Multiple registries are merged
//! into a single namespace-qualified lookup by the aggregator.

pub mod aggregator;
pub mod source;

pub use aggregator::AggregatedIndex;
pub use source::{RegistryError, RegistrySource};
