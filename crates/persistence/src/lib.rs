//! Helios Indexed Resource Store
//!
//! This crate provides a local, embedded store for clinical resources (typed,
//! identified JSON documents) with four kinds of secondary index: string,
//! token, reference and quantity. Callers run typed lookups against the
//! indexes without a document database.
//!
//! # Features
//!
//! - **Atomic replace**: every upsert rewrites the resource row and all of its
//!   index rows in one transaction, so stale index rows never survive
//! - **Typed lookups**: exact-match lookups per index kind, deduplicated
//! - **Composite queries**: read-only `And`/`Or`/`Not` over index lookups of
//!   one resource type, compiled to parameterised SQL
//! - **Pluggable strategies**: the codec and the index extractor are traits
//!
//! # Backend Features
//!
//! - `sqlite` (default) - SQLite with in-memory and file modes
//! - `cli` - the `resource-store` command-line tool
//!
//! # Architecture
//!
//! - [`types`] - Resources, keys, index entries and query predicates
//! - [`codec`] - Resource body encoding
//! - [`extractor`] - Index entry extraction and index definitions
//! - [`error`] - Error types for all operations
//! - [`core`] - Storage traits
//! - [`backends`] - Backend implementations
//!
//! # Quick Start
//!
//! ```no_run
//! use helios_resource_store::backends::sqlite::SqliteBackend;
//! use helios_resource_store::core::ResourceStore;
//! use helios_resource_store::types::Resource;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteBackend::in_memory()?;
//! store.init_schema()?;
//!
//! store.upsert(&Resource::new(
//!     "Patient",
//!     "p1",
//!     json!({
//!         "identifier": [{"system": "ssn", "value": "123-45"}],
//!         "managingOrganization": {"reference": "Organization/o1"}
//!     }),
//! ))?;
//!
//! let by_ssn = store.find_by_token("Patient", "identifier", "ssn", "123-45")?;
//! let by_org = store.find_by_reference("Patient", "organization", "Organization/o1")?;
//! assert_eq!(by_ssn, by_org);
//! # Ok(())
//! # }
//! ```
//!
//! # Custom Extraction
//!
//! Any `Fn(&Resource) -> IndexEntrySet` is an extractor:
//!
//! ```no_run
//! use helios_resource_store::backends::sqlite::SqliteBackend;
//! use helios_resource_store::types::{IndexEntrySet, Resource, StringIndex};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteBackend::in_memory()?.with_extractor(|r: &Resource| {
//!     IndexEntrySet::new().with_string(StringIndex::new("id", r.id()))
//! });
//! store.init_schema()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod codec;
pub mod core;
pub mod error;
pub mod extractor;
pub mod types;

// Re-export commonly used types at crate root
pub use codec::{JsonCodec, ResourceCodec};
pub use error::{StorageError, StorageResult};
pub use extractor::{IndexExtractor, PathIndexExtractor};
pub use types::{IndexCriteria, IndexEntrySet, RawQuery, Resource, ResourceKey};

// Re-export core traits
pub use core::{ResourceStore, Transaction, TransactionProvider};

#[cfg(feature = "sqlite")]
pub use backends::sqlite::SqliteBackend;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
