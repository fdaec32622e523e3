//! SQLite backend implementation.
//!
//! Supports in-memory databases (for tests and scratch work) and file-based
//! databases. Every write is a `BEGIN IMMEDIATE` transaction on a pooled
//! connection, so same-key writers are serialized by SQLite itself.
//!
//! # Example
//!
//! ```no_run
//! use helios_resource_store::backends::sqlite::SqliteBackend;
//! use helios_resource_store::core::ResourceStore;
//! use helios_resource_store::types::Resource;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::open("./data/resources.db")?;
//! backend.init_schema()?;
//!
//! backend.upsert(&Resource::new(
//!     "Patient",
//!     "p1",
//!     json!({"managingOrganization": {"reference": "Organization/o1"}}),
//! ))?;
//!
//! let patients = backend.find_by_reference("Patient", "organization", "Organization/o1")?;
//! assert_eq!(patients.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE resources (
//!     resource_type TEXT NOT NULL,
//!     id TEXT NOT NULL,
//!     data TEXT NOT NULL,          -- codec output
//!     last_updated TEXT NOT NULL,
//!     PRIMARY KEY (resource_type, id)
//! );
//!
//! -- One table per index kind, each with
//! --   FOREIGN KEY (resource_type, resource_id)
//! --       REFERENCES resources(resource_type, id) ON DELETE CASCADE
//! CREATE TABLE string_index (resource_type, resource_id, path, value);
//! CREATE TABLE token_index (resource_type, resource_id, path, system, value);
//! CREATE TABLE reference_index (resource_type, resource_id, path, value);
//! CREATE TABLE quantity_index (
//!     resource_type, resource_id, name, path, system,
//!     value_text,    -- canonical decimal, exact match
//!     value_number,  -- REAL, range predicates
//!     unit
//! );
//! ```

mod backend;
mod index_tables;
mod query_builder;
mod schema;
mod storage;
mod tables;
mod transaction;

pub use backend::{SqliteBackend, SqliteBackendConfig};
pub use query_builder::MAX_PREDICATE_DEPTH;
pub use schema::SCHEMA_VERSION;
pub use transaction::SqliteTransaction;
