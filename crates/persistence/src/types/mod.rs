//! Core types for the resource store.
//!
//! - [`Resource`], [`ResourceKey`] - identified JSON resources
//! - [`IndexEntrySet`] and the four entry kinds - what the extractor produces
//! - [`IndexCriteria`] - exact-match criteria for typed lookups
//! - [`RawQuery`], [`Predicate`] - composite read-only queries
//!
//! # Examples
//!
//! ```
//! use helios_resource_store::types::{IndexCriteria, IndexKind, Resource, TokenIndex};
//! use serde_json::json;
//!
//! let patient = Resource::new(
//!     "Patient",
//!     "p1",
//!     json!({"identifier": [{"system": "ssn", "value": "123-45"}]}),
//! );
//! assert_eq!(patient.key().to_string(), "Patient/p1");
//!
//! let criteria: IndexCriteria = TokenIndex::new("identifier", "ssn", "123-45").into();
//! assert_eq!(criteria.kind(), IndexKind::Token);
//! ```

mod index;
mod query;
mod resource;

pub use index::{
    IndexCriteria, IndexEntrySet, IndexKind, QuantityIndex, ReferenceIndex, StringIndex,
    TokenIndex, canonical_decimal,
};
pub use query::{Predicate, RawQuery};
pub use resource::{Resource, ResourceKey};

use serde::{Deserialize, Serialize};

/// Result of a single upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    /// Key of the written resource.
    pub key: ResourceKey,
    /// True if no resource existed under the key before the write.
    pub created: bool,
    /// Number of index rows written across all four tables.
    pub index_rows: usize,
}

/// Result of re-running the extractor over a resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexSummary {
    /// Resource type that was reindexed.
    pub resource_type: String,
    /// Number of resources processed.
    pub resources: usize,
    /// Number of index rows written.
    pub index_rows: usize,
}
