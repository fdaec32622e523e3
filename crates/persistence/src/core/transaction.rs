//! Explicit transactions.

use crate::error::StorageResult;
use crate::types::{Resource, UpsertOutcome};

use super::ResourceStore;

/// An open atomic unit of work.
///
/// Writes made through the transaction become visible to other callers only
/// on [`commit`](Transaction::commit). Dropping an active transaction rolls it
/// back.
///
/// # Example
///
/// ```no_run
/// use helios_resource_store::backends::sqlite::SqliteBackend;
/// use helios_resource_store::core::{Transaction, TransactionProvider};
/// use helios_resource_store::types::Resource;
/// use serde_json::json;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SqliteBackend::in_memory()?;
/// store.init_schema()?;
///
/// let mut tx = store.begin_transaction()?;
/// tx.upsert(&Resource::new("Organization", "o1", json!({"name": "Acme"})))?;
/// tx.upsert(&Resource::new(
///     "Patient",
///     "p1",
///     json!({"managingOrganization": {"reference": "Organization/o1"}}),
/// ))?;
/// tx.commit()?;
/// # Ok(())
/// # }
/// ```
pub trait Transaction: Send {
    /// Upserts a resource within this transaction.
    fn upsert(&mut self, resource: &Resource) -> StorageResult<UpsertOutcome>;

    /// Deletes a resource within this transaction.
    fn delete(&mut self, resource_type: &str, id: &str) -> StorageResult<bool>;

    /// Reads a resource, seeing this transaction's uncommitted writes.
    fn get(&mut self, resource_type: &str, id: &str) -> StorageResult<Option<Resource>>;

    /// Commits all writes.
    fn commit(self) -> StorageResult<()>
    where
        Self: Sized;

    /// Discards all writes.
    fn rollback(self) -> StorageResult<()>
    where
        Self: Sized;

    /// Returns whether the transaction can still be used.
    fn is_active(&self) -> bool;
}

/// Stores that can open explicit transactions.
pub trait TransactionProvider: ResourceStore {
    /// The transaction type returned by this provider.
    type Transaction: Transaction;

    /// Begins a new write transaction.
    ///
    /// # Errors
    ///
    /// * `StorageError::Transaction(RolledBack)` - if the write lock cannot be taken
    /// * `StorageError::Backend` - if no connection can be acquired
    fn begin_transaction(&self) -> StorageResult<Self::Transaction>;

    /// Runs `f` inside a transaction, committing on `Ok` and rolling back on `Err`.
    fn with_transaction<F, R>(&self, f: F) -> StorageResult<R>
    where
        F: FnOnce(&mut Self::Transaction) -> StorageResult<R>,
    {
        let mut tx = self.begin_transaction()?;
        match f(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                tx.rollback()?;
                Err(e)
            }
        }
    }
}
