//! The resource table.
//!
//! One row per `(resource_type, id)` holding the encoded body. Functions here
//! have no index side effects; keeping index rows consistent is the job of the
//! callers in `storage`.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{BackendError, StorageError, StorageResult};
use crate::types::ResourceKey;

/// Inserts a resource row, stamping `last_updated`.
///
/// The key must not already be present.
pub(crate) fn insert(conn: &Connection, key: &ResourceKey, body: &str) -> StorageResult<()> {
    let last_updated = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO resources (resource_type, id, data, last_updated) VALUES (?1, ?2, ?3, ?4)",
        params![key.resource_type, key.id, body, last_updated],
    )?;
    Ok(())
}

/// Reads the encoded body stored under a key.
pub(crate) fn get(conn: &Connection, key: &ResourceKey) -> StorageResult<Option<String>> {
    let body = conn
        .query_row(
            "SELECT data FROM resources WHERE resource_type = ?1 AND id = ?2",
            params![key.resource_type, key.id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(body)
}

/// Deletes a resource row. Returns true if a row was removed.
pub(crate) fn delete(conn: &Connection, key: &ResourceKey) -> StorageResult<bool> {
    let removed = conn.execute(
        "DELETE FROM resources WHERE resource_type = ?1 AND id = ?2",
        params![key.resource_type, key.id],
    )?;
    Ok(removed > 0)
}

pub(crate) fn exists(conn: &Connection, key: &ResourceKey) -> StorageResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM resources WHERE resource_type = ?1 AND id = ?2",
            params![key.resource_type, key.id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn count(conn: &Connection, resource_type: &str) -> StorageResult<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM resources WHERE resource_type = ?1",
        [resource_type],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

pub(crate) fn list_ids(conn: &Connection, resource_type: &str) -> StorageResult<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT id FROM resources WHERE resource_type = ?1 ORDER BY id")?;
    let ids = stmt
        .query_map([resource_type], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// Reads the last-updated timestamp of a resource.
pub(crate) fn last_updated(
    conn: &Connection,
    key: &ResourceKey,
) -> StorageResult<Option<DateTime<Utc>>> {
    let stamp: Option<String> = conn
        .query_row(
            "SELECT last_updated FROM resources WHERE resource_type = ?1 AND id = ?2",
            params![key.resource_type, key.id],
            |row| row.get(0),
        )
        .optional()?;

    stamp
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    StorageError::Backend(BackendError::Internal {
                        backend_name: "sqlite".to_string(),
                        message: format!("Invalid last_updated for {}: {}", key, e),
                        source: None,
                    })
                })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::sqlite::schema::initialize_schema;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_insert_get_delete() {
        let conn = conn();
        let key = ResourceKey::new("Patient", "p1");

        assert_eq!(get(&conn, &key).unwrap(), None);
        insert(&conn, &key, r#"{"resourceType":"Patient","id":"p1"}"#).unwrap();
        assert!(exists(&conn, &key).unwrap());
        assert_eq!(
            get(&conn, &key).unwrap().as_deref(),
            Some(r#"{"resourceType":"Patient","id":"p1"}"#)
        );

        assert!(delete(&conn, &key).unwrap());
        assert!(!delete(&conn, &key).unwrap());
        assert!(!exists(&conn, &key).unwrap());
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let conn = conn();
        let key = ResourceKey::new("Patient", "p1");
        insert(&conn, &key, "{}").unwrap();
        assert!(insert(&conn, &key, "{}").is_err());
    }

    #[test]
    fn test_count_and_list_ids() {
        let conn = conn();
        for id in ["b", "a", "c"] {
            insert(&conn, &ResourceKey::new("Patient", id), "{}").unwrap();
        }
        insert(&conn, &ResourceKey::new("Observation", "a"), "{}").unwrap();

        assert_eq!(count(&conn, "Patient").unwrap(), 3);
        assert_eq!(count(&conn, "Encounter").unwrap(), 0);
        assert_eq!(list_ids(&conn, "Patient").unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_last_updated() {
        let conn = conn();
        let key = ResourceKey::new("Patient", "p1");
        assert!(last_updated(&conn, &key).unwrap().is_none());

        let before = Utc::now();
        insert(&conn, &key, "{}").unwrap();
        let stamp = last_updated(&conn, &key).unwrap().unwrap();
        assert!(stamp >= before - chrono::Duration::seconds(1));
    }
}
