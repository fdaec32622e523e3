//! Test infrastructure for the resource store.
//!
//! Provides resource fixtures and backend constructors shared by the
//! integration tests.

#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::*;

use helios_resource_store::backends::sqlite::SqliteBackend;

/// Creates an in-memory backend with the default codec and extractor.
pub fn create_test_backend() -> SqliteBackend {
    let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
    backend.init_schema().expect("Failed to initialize schema");
    backend
}
