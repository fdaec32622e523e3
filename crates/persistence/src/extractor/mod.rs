//! Index entry extraction.
//!
//! The store does not decide what a resource is searchable by. It asks an
//! [`IndexExtractor`] for the [`IndexEntrySet`] of each resource it writes and
//! persists exactly that set.
//!
//! - [`IndexExtractor`] - the strategy interface; closures implement it
//! - [`IndexRegistry`] - index definitions keyed by resource type and name
//! - [`PathIndexExtractor`] - evaluates registry definitions against JSON bodies
//!
//! # Example
//!
//! ```
//! use helios_resource_store::extractor::IndexExtractor;
//! use helios_resource_store::types::{IndexEntrySet, Resource, TokenIndex};
//! use serde_json::json;
//!
//! let extractor = |resource: &Resource| {
//!     let mut set = IndexEntrySet::new();
//!     if let Some(gender) = resource.content()["gender"].as_str() {
//!         set.tokens.push(TokenIndex::new("gender", "", gender));
//!     }
//!     set
//! };
//!
//! let patient = Resource::new("Patient", "p1", json!({"gender": "female"}));
//! assert_eq!(extractor.extract(&patient).tokens.len(), 1);
//! ```

mod path;
mod registry;

pub use path::PathIndexExtractor;
pub use registry::{IndexDefinition, IndexRegistry, RegistryError};

use crate::types::{IndexEntrySet, Resource};

/// Computes the index entries of a resource.
///
/// Implementations must be total and free of side effects: the store may call
/// `extract` more than once for the same resource (for example during reindex).
pub trait IndexExtractor: Send + Sync {
    /// Returns the entries to persist for `resource`.
    fn extract(&self, resource: &Resource) -> IndexEntrySet;
}

impl<F> IndexExtractor for F
where
    F: Fn(&Resource) -> IndexEntrySet + Send + Sync,
{
    fn extract(&self, resource: &Resource) -> IndexEntrySet {
        self(resource)
    }
}

/// Extractor that produces no entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndexExtractor;

impl IndexExtractor for NoIndexExtractor {
    fn extract(&self, _resource: &Resource) -> IndexEntrySet {
        IndexEntrySet::new()
    }
}
