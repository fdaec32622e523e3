//! ResourceStore implementation for SQLite.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior, params_from_iter};

use crate::codec::ResourceCodec;
use crate::core::ResourceStore;
use crate::error::{EncodingError, StorageResult};
use crate::extractor::IndexExtractor;
use crate::types::{
    IndexCriteria, IndexEntrySet, RawQuery, ReindexSummary, Resource, ResourceKey, UpsertOutcome,
};

use super::SqliteBackend;
use super::index_tables::{
    self, IndexTable, QuantityIndexTable, ReferenceIndexTable, StringIndexTable, TokenIndexTable,
};
use super::query_builder;
use super::tables;

/// A resource that has been encoded and extracted but not yet written.
#[derive(Debug)]
pub(super) struct PreparedWrite {
    pub key: ResourceKey,
    pub body: String,
    pub entries: IndexEntrySet,
}

impl SqliteBackend {
    /// Validates, encodes and extracts a resource. Nothing is written.
    pub(super) fn prepare(&self, resource: &Resource) -> StorageResult<PreparedWrite> {
        prepare_with(self.codec.as_ref(), self.extractor.as_ref(), resource)
    }

    /// Returns the index entries currently stored for a resource, or `None`
    /// if the resource does not exist.
    pub fn index_entries(
        &self,
        resource_type: &str,
        id: &str,
    ) -> StorageResult<Option<IndexEntrySet>> {
        let key = ResourceKey::new(resource_type, id);
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;

        if !tables::exists(&tx, &key)? {
            return Ok(None);
        }
        let entries = index_tables::read_all(&tx, &key)?;
        tx.commit()?;
        Ok(Some(entries))
    }

    /// Returns when a resource was last written.
    pub fn last_updated(
        &self,
        resource_type: &str,
        id: &str,
    ) -> StorageResult<Option<DateTime<Utc>>> {
        let conn = self.get_connection()?;
        tables::last_updated(&conn, &ResourceKey::new(resource_type, id))
    }

    /// Re-runs the extractor over every stored resource of a type.
    ///
    /// Each resource's index rows are replaced in their own atomic unit; the
    /// resource rows are not rewritten. A body that fails to decode aborts the
    /// reindex, leaving resources processed so far reindexed.
    pub fn reindex(&self, resource_type: &str) -> StorageResult<ReindexSummary> {
        let mut conn = self.get_connection()?;
        let ids = tables::list_ids(&conn, resource_type)?;

        let mut summary = ReindexSummary {
            resource_type: resource_type.to_string(),
            ..Default::default()
        };

        for id in ids {
            let key = ResourceKey::new(resource_type, id);
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            // Deleted since the id list was read.
            let Some(resource) = load_resource(&tx, self.codec.as_ref(), &key)? else {
                continue;
            };

            let entries = self.extractor.extract(&resource);
            index_tables::delete_all(&tx, &key)?;
            summary.index_rows += index_tables::insert_all(&tx, &key, &entries)?;
            tx.commit()?;
            summary.resources += 1;
        }

        tracing::info!(
            "Reindexed {} {} resources ({} index rows)",
            summary.resources,
            resource_type,
            summary.index_rows
        );
        Ok(summary)
    }
}

pub(super) fn prepare_with(
    codec: &dyn ResourceCodec,
    extractor: &dyn IndexExtractor,
    resource: &Resource,
) -> StorageResult<PreparedWrite> {
    let key = resource.key();
    key.validate()?;
    let body = codec.encode(resource)?;
    let entries = extractor.extract(resource);
    Ok(PreparedWrite { key, body, entries })
}

/// Replaces the resource row and all index rows of `write.key`.
///
/// Must run inside a write transaction.
pub(super) fn write_resource(
    conn: &Connection,
    write: &PreparedWrite,
) -> StorageResult<UpsertOutcome> {
    index_tables::delete_all(conn, &write.key)?;
    let created = !tables::delete(conn, &write.key)?;

    tables::insert(conn, &write.key, &write.body)?;
    let index_rows = index_tables::insert_all(conn, &write.key, &write.entries)?;

    tracing::debug!(
        "Upserted {} ({}, {} index rows)",
        write.key,
        if created { "created" } else { "replaced" },
        index_rows
    );

    Ok(UpsertOutcome {
        key: write.key.clone(),
        created,
        index_rows,
    })
}

/// Removes a resource and all of its index rows.
///
/// Must run inside a write transaction.
pub(super) fn remove_resource(conn: &Connection, key: &ResourceKey) -> StorageResult<bool> {
    let index_rows = index_tables::delete_all(conn, key)?;
    let removed = tables::delete(conn, key)?;
    if removed {
        tracing::debug!("Deleted {} ({} index rows)", key, index_rows);
    }
    Ok(removed)
}

/// Reads and decodes a resource.
pub(super) fn load_resource(
    conn: &Connection,
    codec: &dyn ResourceCodec,
    key: &ResourceKey,
) -> StorageResult<Option<Resource>> {
    let Some(body) = tables::get(conn, key)? else {
        return Ok(None);
    };

    let resource = codec.decode(&body)?;
    if resource.key() != *key {
        return Err(EncodingError::KeyMismatch {
            expected: key.to_string(),
            actual: resource.key().to_string(),
        }
        .into());
    }
    Ok(Some(resource))
}

fn lookup_keys(
    conn: &Connection,
    resource_type: &str,
    criteria: &IndexCriteria,
) -> StorageResult<Vec<ResourceKey>> {
    match criteria {
        IndexCriteria::String(entry) => StringIndexTable::lookup(conn, resource_type, entry),
        IndexCriteria::Token(entry) => TokenIndexTable::lookup(conn, resource_type, entry),
        IndexCriteria::Reference(entry) => ReferenceIndexTable::lookup(conn, resource_type, entry),
        IndexCriteria::Quantity(entry) => QuantityIndexTable::lookup(conn, resource_type, entry),
    }
}

fn query_keys(conn: &Connection, query: &RawQuery) -> StorageResult<Vec<ResourceKey>> {
    let compiled = query_builder::compile(query)?;
    let mut stmt = conn.prepare(&compiled.sql)?;
    let keys = stmt
        .query_map(params_from_iter(compiled.params.iter()), |row| {
            Ok(ResourceKey::new(
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(keys)
}

/// Loads the resources for `keys`, skipping keys with no stored row.
fn load_all(
    conn: &Connection,
    codec: &dyn ResourceCodec,
    keys: &[ResourceKey],
) -> StorageResult<Vec<Resource>> {
    let mut resources = Vec::with_capacity(keys.len());
    for key in keys {
        if let Some(resource) = load_resource(conn, codec, key)? {
            resources.push(resource);
        }
    }
    Ok(resources)
}

impl ResourceStore for SqliteBackend {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn upsert(&self, resource: &Resource) -> StorageResult<UpsertOutcome> {
        let write = self.prepare(resource)?;

        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = write_resource(&tx, &write)?;
        tx.commit()?;

        Ok(outcome)
    }

    fn upsert_all(&self, resources: &[Resource]) -> StorageResult<Vec<UpsertOutcome>> {
        let writes = resources
            .iter()
            .map(|r| self.prepare(r))
            .collect::<StorageResult<Vec<_>>>()?;

        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcomes = writes
            .iter()
            .map(|w| write_resource(&tx, w))
            .collect::<StorageResult<Vec<_>>>()?;
        tx.commit()?;

        tracing::debug!("Upserted batch of {} resources", outcomes.len());
        Ok(outcomes)
    }

    fn delete(&self, resource_type: &str, id: &str) -> StorageResult<bool> {
        let key = ResourceKey::new(resource_type, id);

        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let removed = remove_resource(&tx, &key)?;
        tx.commit()?;

        Ok(removed)
    }

    fn get(&self, resource_type: &str, id: &str) -> StorageResult<Option<Resource>> {
        let conn = self.get_connection()?;
        load_resource(&conn, self.codec.as_ref(), &ResourceKey::new(resource_type, id))
    }

    fn exists(&self, resource_type: &str, id: &str) -> StorageResult<bool> {
        let conn = self.get_connection()?;
        tables::exists(&conn, &ResourceKey::new(resource_type, id))
    }

    fn count(&self, resource_type: &str) -> StorageResult<u64> {
        let conn = self.get_connection()?;
        tables::count(&conn, resource_type)
    }

    fn list_ids(&self, resource_type: &str) -> StorageResult<Vec<String>> {
        let conn = self.get_connection()?;
        tables::list_ids(&conn, resource_type)
    }

    fn find_by_index(
        &self,
        resource_type: &str,
        criteria: &IndexCriteria,
    ) -> StorageResult<Vec<Resource>> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;

        let keys = lookup_keys(&tx, resource_type, criteria)?;
        let resources = load_all(&tx, self.codec.as_ref(), &keys)?;
        tx.commit()?;

        Ok(resources)
    }

    fn raw_query(&self, query: &RawQuery) -> StorageResult<Vec<ResourceKey>> {
        let conn = self.get_connection()?;
        query_keys(&conn, query)
    }

    fn raw_query_resources(&self, query: &RawQuery) -> StorageResult<Vec<Resource>> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;

        let keys = query_keys(&tx, query)?;
        let resources = load_all(&tx, self.codec.as_ref(), &keys)?;
        tx.commit()?;

        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StorageError, ValidationError};
    use crate::types::{Predicate, QuantityIndex, ReferenceIndex, StringIndex, TokenIndex};
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::str::FromStr;

    fn create_test_backend() -> SqliteBackend {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().unwrap();
        backend
    }

    fn patient(id: &str, ssn: &str) -> Resource {
        Resource::new(
            "Patient",
            id,
            json!({
                "identifier": [{"system": "ssn", "value": ssn}],
                "name": [{"family": "Smith"}],
                "managingOrganization": {"reference": "Organization/o1"}
            }),
        )
    }

    #[test]
    fn test_upsert_and_get() {
        let backend = create_test_backend();
        let p1 = patient("p1", "123-45");

        let outcome = backend.upsert(&p1).unwrap();
        assert!(outcome.created);
        assert_eq!(outcome.key, ResourceKey::new("Patient", "p1"));
        assert_eq!(outcome.index_rows, 3);

        assert_eq!(backend.get("Patient", "p1").unwrap(), Some(p1));
        assert_eq!(backend.get("Patient", "missing").unwrap(), None);
    }

    #[test]
    fn test_reupsert_replaces() {
        let backend = create_test_backend();
        backend.upsert(&patient("p1", "123-45")).unwrap();
        let outcome = backend.upsert(&patient("p1", "999-99")).unwrap();
        assert!(!outcome.created);

        assert!(
            backend
                .find_by_token("Patient", "identifier", "ssn", "123-45")
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            backend
                .find_by_token("Patient", "identifier", "ssn", "999-99")
                .unwrap()
                .len(),
            1
        );
        assert_eq!(backend.count("Patient").unwrap(), 1);
    }

    #[test]
    fn test_upsert_rejects_empty_id() {
        let backend = create_test_backend();
        let bad = Resource::new("Patient", "", json!({}));
        assert!(matches!(
            backend.upsert(&bad),
            Err(StorageError::Validation(ValidationError::EmptyResourceId { .. }))
        ));
    }

    #[test]
    fn test_delete() {
        let backend = create_test_backend();
        backend.upsert(&patient("p1", "123-45")).unwrap();

        assert!(backend.delete("Patient", "p1").unwrap());
        assert!(!backend.delete("Patient", "p1").unwrap());
        assert!(!backend.exists("Patient", "p1").unwrap());
        assert!(
            backend
                .find_by_reference("Patient", "organization", "Organization/o1")
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_index_entries() {
        let backend = create_test_backend();
        backend.upsert(&patient("p1", "123-45")).unwrap();

        let entries = backend.index_entries("Patient", "p1").unwrap().unwrap();
        assert_eq!(
            entries.tokens,
            vec![TokenIndex::new("identifier", "ssn", "123-45")]
        );
        assert_eq!(entries.strings, vec![StringIndex::new("name", "Smith")]);
        assert_eq!(
            entries.references,
            vec![ReferenceIndex::new("organization", "Organization/o1")]
        );
        assert!(backend.index_entries("Patient", "p2").unwrap().is_none());
    }

    #[test]
    fn test_find_by_quantity() {
        let backend = create_test_backend();
        backend
            .upsert(&Resource::new(
                "Observation",
                "o1",
                json!({"valueQuantity": {"value": 5.40, "unit": "mg", "system": "ucum"}}),
            ))
            .unwrap();

        let criteria = QuantityIndex::new(
            "value-quantity",
            "value-quantity",
            "ucum",
            Decimal::from_str("5.4").unwrap(),
            "mg",
        );
        let found = backend.find_by_quantity("Observation", &criteria).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), "o1");
    }

    #[test]
    fn test_raw_query() {
        let backend = create_test_backend();
        backend.upsert(&patient("p1", "123-45")).unwrap();
        backend.upsert(&patient("p2", "555-55")).unwrap();

        let query = RawQuery::new(
            "Patient",
            Predicate::and(vec![
                Predicate::matches(ReferenceIndex::new("organization", "Organization/o1")),
                Predicate::not(Predicate::matches(TokenIndex::new(
                    "identifier",
                    "ssn",
                    "123-45",
                ))),
            ]),
        );
        assert_eq!(
            backend.raw_query(&query).unwrap(),
            vec![ResourceKey::new("Patient", "p2")]
        );

        let resources = backend.raw_query_resources(&query).unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].id(), "p2");
    }

    #[test]
    fn test_reindex_with_new_extractor() {
        let backend = create_test_backend();
        backend.upsert(&patient("p1", "123-45")).unwrap();

        let backend = backend.with_extractor(|r: &Resource| {
            IndexEntrySet::new().with_string(StringIndex::new("id", r.id()))
        });
        let summary = backend.reindex("Patient").unwrap();
        assert_eq!(summary.resources, 1);
        assert_eq!(summary.index_rows, 1);

        assert!(
            backend
                .find_by_token("Patient", "identifier", "ssn", "123-45")
                .unwrap()
                .is_empty()
        );
        assert_eq!(backend.find_by_string("Patient", "id", "p1").unwrap().len(), 1);
    }

    #[test]
    fn test_last_updated() {
        let backend = create_test_backend();
        assert!(backend.last_updated("Patient", "p1").unwrap().is_none());
        backend.upsert(&patient("p1", "123-45")).unwrap();
        assert!(backend.last_updated("Patient", "p1").unwrap().is_some());
    }
}
