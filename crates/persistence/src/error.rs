//! Error types for the resource store.
//!
//! All engine operations return [`StorageError`], which groups failures by
//! category: encoding, validation, composite query, transaction and backend.
//! Absence of a resource is not an error; lookups report it as `None` or as an
//! empty result set.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Encoding or decoding of a resource body failed.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// The resource key is unusable.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A composite query could not be compiled.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Transaction state errors.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Backend-specific errors.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StorageError {
    /// Returns true if the underlying store could not be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StorageError::Backend(
                BackendError::Unavailable { .. }
                    | BackendError::ConnectionFailed { .. }
                    | BackendError::PoolExhausted { .. }
            )
        )
    }
}

/// Errors raised by a [`ResourceCodec`](crate::codec::ResourceCodec).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// The resource content cannot be encoded (for example, it is not an object).
    #[error("invalid resource {resource_type}/{id}: {message}")]
    InvalidResource {
        resource_type: String,
        id: String,
        message: String,
    },

    /// Serialization failed.
    #[error("failed to encode {resource_type}/{id}: {message}")]
    Serialize {
        resource_type: String,
        id: String,
        message: String,
    },

    /// The stored body could not be parsed.
    #[error("failed to decode resource: {message}")]
    Deserialize { message: String },

    /// A decoded body does not belong to the row it was read from.
    #[error("decoded resource {actual} does not match stored key {expected}")]
    KeyMismatch { expected: String, actual: String },
}

/// Errors related to resource keys.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Resource type is empty.
    #[error("resource type must not be empty")]
    EmptyResourceType,

    /// Resource id is empty.
    #[error("resource id must not be empty for type {resource_type}")]
    EmptyResourceId { resource_type: String },
}

/// Errors raised while compiling a composite query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// An `And`/`Or` node has no operands.
    #[error("empty {operator} predicate")]
    EmptyOperands { operator: &'static str },

    /// A quantity range has a lower bound above its upper bound.
    #[error("invalid quantity range for {name}: low {low} is greater than high {high}")]
    InvalidRange {
        name: String,
        low: String,
        high: String,
    },

    /// Predicate tree exceeds the supported depth.
    #[error("predicate nesting exceeds maximum depth of {max_depth}")]
    TooDeep { max_depth: usize },
}

/// Errors related to transactions.
#[derive(Error, Debug)]
pub enum TransactionError {
    /// Transaction was rolled back.
    #[error("transaction rolled back: {reason}")]
    RolledBack { reason: String },

    /// Transaction is no longer valid (already committed or rolled back).
    #[error("transaction no longer valid")]
    InvalidTransaction,
}

/// Errors originating from the database backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend is currently unavailable.
    #[error("backend unavailable: {backend_name}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// Schema creation or version bookkeeping failed.
    #[error("schema migration failed: {message}")]
    MigrationError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl From<serde_json::Error> for EncodingError {
    fn from(err: serde_json::Error) -> Self {
        EncodingError::Deserialize {
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for StorageError {
    fn from(_err: r2d2::Error) -> Self {
        StorageError::Backend(BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        })
    }
}
