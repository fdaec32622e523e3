//! Core storage traits.
//!
//! - [`ResourceStore`] - upsert, delete, get and indexed lookups
//! - [`Transaction`] / [`TransactionProvider`] - explicit atomic units
//!
//! ```text
//! ResourceStore
//!     └── TransactionProvider
//! ```
//!
//! All calls are synchronous and block on the underlying database. Callers on
//! an async runtime should dispatch them with `spawn_blocking` or similar.

mod storage;
mod transaction;

pub use storage::ResourceStore;
pub use transaction::{Transaction, TransactionProvider};
