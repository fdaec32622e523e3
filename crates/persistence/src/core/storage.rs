//! The resource store trait.

use crate::error::StorageResult;
use crate::types::{
    IndexCriteria, QuantityIndex, RawQuery, ReferenceIndex, Resource, ResourceKey, StringIndex,
    TokenIndex, UpsertOutcome,
};

/// Storage of resources and their secondary indexes.
///
/// Every write is one atomic unit covering the resource row and all of its
/// index rows: after `upsert` returns, the stored index rows are exactly what
/// the extractor produced for the new body, and after `delete` returns no
/// index row refers to the key.
///
/// Absence is never an error. `get` returns `None` and lookups return an
/// empty `Vec` for unknown types, paths or values.
///
/// # Example
///
/// ```no_run
/// use helios_resource_store::backends::sqlite::SqliteBackend;
/// use helios_resource_store::core::ResourceStore;
/// use helios_resource_store::types::Resource;
/// use serde_json::json;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SqliteBackend::in_memory()?;
/// store.init_schema()?;
///
/// store.upsert(&Resource::new(
///     "Patient",
///     "p1",
///     json!({"identifier": [{"system": "ssn", "value": "123-45"}]}),
/// ))?;
///
/// let found = store.find_by_token("Patient", "identifier", "ssn", "123-45")?;
/// assert_eq!(found.len(), 1);
/// # Ok(())
/// # }
/// ```
pub trait ResourceStore: Send + Sync {
    /// Returns a human-readable name for this backend.
    fn backend_name(&self) -> &'static str;

    /// Inserts or replaces a resource together with its index rows.
    ///
    /// # Errors
    ///
    /// * `StorageError::Validation` - if the type or id is empty
    /// * `StorageError::Encoding` - if the codec rejects the resource; nothing is written
    fn upsert(&self, resource: &Resource) -> StorageResult<UpsertOutcome>;

    /// Upserts a batch as a single atomic unit.
    ///
    /// Every resource is encoded and extracted before anything is written, so
    /// an encoding failure aborts the whole batch with no partial effect.
    /// Outcomes are returned in input order. A key repeated within the batch
    /// is written twice; the last occurrence wins.
    fn upsert_all(&self, resources: &[Resource]) -> StorageResult<Vec<UpsertOutcome>>;

    /// Deletes a resource and all of its index rows.
    ///
    /// Returns `false` if nothing was stored under the key.
    fn delete(&self, resource_type: &str, id: &str) -> StorageResult<bool>;

    /// Reads a resource by key.
    fn get(&self, resource_type: &str, id: &str) -> StorageResult<Option<Resource>>;

    /// Returns true if a resource is stored under the key.
    fn exists(&self, resource_type: &str, id: &str) -> StorageResult<bool> {
        Ok(self.get(resource_type, id)?.is_some())
    }

    /// Counts stored resources of a type.
    fn count(&self, resource_type: &str) -> StorageResult<u64>;

    /// Lists the ids of stored resources of a type, in ascending order.
    fn list_ids(&self, resource_type: &str) -> StorageResult<Vec<String>>;

    /// Returns the distinct resources of a type with an index entry exactly
    /// matching `criteria`.
    fn find_by_index(
        &self,
        resource_type: &str,
        criteria: &IndexCriteria,
    ) -> StorageResult<Vec<Resource>>;

    /// Looks up by string index.
    fn find_by_string(
        &self,
        resource_type: &str,
        path: &str,
        value: &str,
    ) -> StorageResult<Vec<Resource>> {
        self.find_by_index(resource_type, &StringIndex::new(path, value).into())
    }

    /// Looks up by token index. An empty `system` matches only entries with an
    /// empty system.
    fn find_by_token(
        &self,
        resource_type: &str,
        path: &str,
        system: &str,
        value: &str,
    ) -> StorageResult<Vec<Resource>> {
        self.find_by_index(resource_type, &TokenIndex::new(path, system, value).into())
    }

    /// Looks up by reference index.
    fn find_by_reference(
        &self,
        resource_type: &str,
        path: &str,
        value: &str,
    ) -> StorageResult<Vec<Resource>> {
        self.find_by_index(resource_type, &ReferenceIndex::new(path, value).into())
    }

    /// Looks up by quantity index using exact decimal equality.
    fn find_by_quantity(
        &self,
        resource_type: &str,
        criteria: &QuantityIndex,
    ) -> StorageResult<Vec<Resource>> {
        self.find_by_index(resource_type, &criteria.clone().into())
    }

    /// Runs a composite query and returns the matching keys, ordered by id.
    ///
    /// # Errors
    ///
    /// * `StorageError::Query` - if the predicate is malformed
    fn raw_query(&self, query: &RawQuery) -> StorageResult<Vec<ResourceKey>>;

    /// Runs a composite query and returns the matching resources.
    fn raw_query_resources(&self, query: &RawQuery) -> StorageResult<Vec<Resource>>;
}
