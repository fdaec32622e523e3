//! Transaction support for SQLite backend.

use std::sync::Arc;

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;

use crate::codec::ResourceCodec;
use crate::core::{Transaction, TransactionProvider};
use crate::error::{StorageError, StorageResult, TransactionError};
use crate::extractor::IndexExtractor;
use crate::types::{Resource, ResourceKey, UpsertOutcome};

use super::SqliteBackend;
use super::storage::{load_resource, prepare_with, remove_resource, write_resource};

/// A SQLite write transaction.
///
/// Holds a pooled connection with an open `BEGIN IMMEDIATE` transaction for
/// its whole lifetime.
pub struct SqliteTransaction {
    conn: PooledConnection<SqliteConnectionManager>,
    codec: Arc<dyn ResourceCodec>,
    extractor: Arc<dyn IndexExtractor>,
    active: bool,
    writes: usize,
}

impl std::fmt::Debug for SqliteTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTransaction")
            .field("active", &self.active)
            .field("writes", &self.writes)
            .finish()
    }
}

impl SqliteTransaction {
    fn new(
        conn: PooledConnection<SqliteConnectionManager>,
        codec: Arc<dyn ResourceCodec>,
        extractor: Arc<dyn IndexExtractor>,
    ) -> StorageResult<Self> {
        conn.execute("BEGIN IMMEDIATE", []).map_err(|e| {
            StorageError::Transaction(TransactionError::RolledBack {
                reason: format!("Failed to begin transaction: {}", e),
            })
        })?;

        Ok(Self {
            conn,
            codec,
            extractor,
            active: true,
            writes: 0,
        })
    }

    fn ensure_active(&self) -> StorageResult<()> {
        if self.active {
            Ok(())
        } else {
            Err(StorageError::Transaction(
                TransactionError::InvalidTransaction,
            ))
        }
    }

    /// Rolls back after a failed statement so the connection returns clean.
    fn abort<T>(&mut self, err: StorageError) -> StorageResult<T> {
        if self.active {
            let _ = self.conn.execute("ROLLBACK", []);
            self.active = false;
        }
        Err(err)
    }
}

impl Transaction for SqliteTransaction {
    fn upsert(&mut self, resource: &Resource) -> StorageResult<UpsertOutcome> {
        self.ensure_active()?;

        // Encoding failures leave the transaction usable; nothing was written.
        let write = prepare_with(self.codec.as_ref(), self.extractor.as_ref(), resource)?;

        match write_resource(&self.conn, &write) {
            Ok(outcome) => {
                self.writes += 1;
                Ok(outcome)
            }
            Err(e) => self.abort(e),
        }
    }

    fn delete(&mut self, resource_type: &str, id: &str) -> StorageResult<bool> {
        self.ensure_active()?;

        match remove_resource(&self.conn, &ResourceKey::new(resource_type, id)) {
            Ok(removed) => {
                self.writes += 1;
                Ok(removed)
            }
            Err(e) => self.abort(e),
        }
    }

    fn get(&mut self, resource_type: &str, id: &str) -> StorageResult<Option<Resource>> {
        self.ensure_active()?;
        load_resource(
            &self.conn,
            self.codec.as_ref(),
            &ResourceKey::new(resource_type, id),
        )
    }

    fn commit(mut self) -> StorageResult<()> {
        self.ensure_active()?;

        if let Err(e) = self.conn.execute("COMMIT", []) {
            let reason = format!("Failed to commit transaction: {}", e);
            return self.abort(StorageError::Transaction(TransactionError::RolledBack {
                reason,
            }));
        }
        self.active = false;

        tracing::debug!("Committed transaction ({} writes)", self.writes);
        Ok(())
    }

    fn rollback(mut self) -> StorageResult<()> {
        self.ensure_active()?;

        self.conn.execute("ROLLBACK", []).map_err(|e| {
            StorageError::Transaction(TransactionError::RolledBack {
                reason: format!("Failed to rollback transaction: {}", e),
            })
        })?;
        self.active = false;

        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        // If transaction wasn't explicitly committed or rolled back, roll it back
        if self.active {
            let _ = self.conn.execute("ROLLBACK", []);
        }
    }
}

impl TransactionProvider for SqliteBackend {
    type Transaction = SqliteTransaction;

    fn begin_transaction(&self) -> StorageResult<Self::Transaction> {
        let conn = self.get_connection()?;
        SqliteTransaction::new(conn, self.codec.clone(), self.extractor.clone())
    }
}
