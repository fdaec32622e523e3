//! SQLite schema definitions.

use rusqlite::Connection;

use crate::error::{BackendError, StorageError, StorageResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
///
/// Idempotent: an up-to-date database is left untouched. A database written
/// by a newer schema version is refused.
pub fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(migration_error(format!(
            "database schema version {} is newer than supported version {}",
            current_version, SCHEMA_VERSION
        )));
    }

    if current_version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
        tracing::info!("Initialized resource store schema v{}", SCHEMA_VERSION);
    }

    Ok(())
}

/// Get the current schema version (0 for a fresh database).
pub fn get_schema_version(conn: &Connection) -> StorageResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| migration_error(format!("Failed to create schema_version table: {}", e)))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> StorageResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| migration_error(format!("Failed to clear schema_version: {}", e)))?;

    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
        .map_err(|e| migration_error(format!("Failed to set schema_version: {}", e)))?;

    Ok(())
}

fn create_schema_v1(conn: &Connection) -> StorageResult<()> {
    let tables = [
        (
            "resources",
            "CREATE TABLE IF NOT EXISTS resources (
                resource_type TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                last_updated TEXT NOT NULL,
                PRIMARY KEY (resource_type, id)
            )",
        ),
        (
            "string_index",
            "CREATE TABLE IF NOT EXISTS string_index (
                resource_type TEXT NOT NULL,
                resource_id TEXT NOT NULL,
                path TEXT NOT NULL,
                value TEXT NOT NULL,
                FOREIGN KEY (resource_type, resource_id)
                    REFERENCES resources(resource_type, id) ON DELETE CASCADE
            )",
        ),
        (
            "token_index",
            "CREATE TABLE IF NOT EXISTS token_index (
                resource_type TEXT NOT NULL,
                resource_id TEXT NOT NULL,
                path TEXT NOT NULL,
                system TEXT NOT NULL,
                value TEXT NOT NULL,
                FOREIGN KEY (resource_type, resource_id)
                    REFERENCES resources(resource_type, id) ON DELETE CASCADE
            )",
        ),
        (
            "reference_index",
            "CREATE TABLE IF NOT EXISTS reference_index (
                resource_type TEXT NOT NULL,
                resource_id TEXT NOT NULL,
                path TEXT NOT NULL,
                value TEXT NOT NULL,
                FOREIGN KEY (resource_type, resource_id)
                    REFERENCES resources(resource_type, id) ON DELETE CASCADE
            )",
        ),
        (
            "quantity_index",
            "CREATE TABLE IF NOT EXISTS quantity_index (
                resource_type TEXT NOT NULL,
                resource_id TEXT NOT NULL,
                name TEXT NOT NULL,
                path TEXT NOT NULL,
                system TEXT NOT NULL,
                value_text TEXT NOT NULL,
                value_number REAL,
                unit TEXT NOT NULL,
                FOREIGN KEY (resource_type, resource_id)
                    REFERENCES resources(resource_type, id) ON DELETE CASCADE
            )",
        ),
    ];

    for (name, sql) in &tables {
        conn.execute(sql, [])
            .map_err(|e| migration_error(format!("Failed to create {} table: {}", name, e)))?;
    }

    create_indexes(conn)
}

fn create_indexes(conn: &Connection) -> StorageResult<()> {
    let indexes = [
        // Lookup indexes
        "CREATE INDEX IF NOT EXISTS idx_string_lookup ON string_index(resource_type, path, value)",
        "CREATE INDEX IF NOT EXISTS idx_token_lookup ON token_index(resource_type, path, system, value)",
        "CREATE INDEX IF NOT EXISTS idx_reference_lookup ON reference_index(resource_type, path, value)",
        "CREATE INDEX IF NOT EXISTS idx_quantity_lookup ON quantity_index(resource_type, name, path, system, unit, value_text)",
        "CREATE INDEX IF NOT EXISTS idx_quantity_number ON quantity_index(resource_type, name, path, value_number)",
        // Owner indexes for delete-then-insert
        "CREATE INDEX IF NOT EXISTS idx_string_owner ON string_index(resource_type, resource_id)",
        "CREATE INDEX IF NOT EXISTS idx_token_owner ON token_index(resource_type, resource_id)",
        "CREATE INDEX IF NOT EXISTS idx_reference_owner ON reference_index(resource_type, resource_id)",
        "CREATE INDEX IF NOT EXISTS idx_quantity_owner ON quantity_index(resource_type, resource_id)",
    ];

    for index_sql in &indexes {
        conn.execute(index_sql, [])
            .map_err(|e| migration_error(format!("Failed to create index: {}", e)))?;
    }

    Ok(())
}

fn migration_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::MigrationError { message })
}
