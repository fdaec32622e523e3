//! SQLite backend implementation.

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};

use crate::codec::{JsonCodec, ResourceCodec};
use crate::error::{BackendError, StorageError, StorageResult};
use crate::extractor::{IndexExtractor, PathIndexExtractor};

use super::schema;

/// SQLite-backed resource store.
///
/// Holds a connection pool, the codec used for resource bodies and the
/// extractor that computes index entries. Defaults are [`JsonCodec`] and a
/// [`PathIndexExtractor`] over the built-in index definitions.
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteBackendConfig,
    is_memory: bool,
    pub(super) codec: Arc<dyn ResourceCodec>,
    pub(super) extractor: Arc<dyn IndexExtractor>,
}

impl Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .finish_non_exhaustive()
    }
}

/// Configuration for the SQLite backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteBackendConfig {
    /// Maximum number of connections in the pool. In-memory stores always use one.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Enable WAL mode for file databases.
    #[serde(default = "default_true")]
    pub enable_wal: bool,

    /// Enable foreign key constraints.
    #[serde(default = "default_true")]
    pub enable_foreign_keys: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

impl SqliteBackendConfig {
    /// Reads configuration from `HELIOS_STORE_*` environment variables,
    /// falling back to defaults for unset or unparsable values.
    pub fn from_env() -> Self {
        fn var<T: std::str::FromStr>(name: &str) -> Option<T> {
            std::env::var(name).ok().and_then(|v| v.parse().ok())
        }
        fn flag(name: &str) -> Option<bool> {
            std::env::var(name)
                .ok()
                .map(|v| v.to_lowercase() == "true" || v == "1")
        }

        Self {
            max_connections: var("HELIOS_STORE_MAX_CONNECTIONS")
                .unwrap_or_else(default_max_connections),
            min_connections: var("HELIOS_STORE_MIN_CONNECTIONS")
                .unwrap_or_else(default_min_connections),
            connection_timeout_ms: var("HELIOS_STORE_CONNECTION_TIMEOUT_MS")
                .unwrap_or_else(default_connection_timeout_ms),
            busy_timeout_ms: var("HELIOS_STORE_BUSY_TIMEOUT_MS")
                .unwrap_or_else(default_busy_timeout_ms),
            enable_wal: flag("HELIOS_STORE_ENABLE_WAL").unwrap_or(true),
            enable_foreign_keys: flag("HELIOS_STORE_ENABLE_FOREIGN_KEYS").unwrap_or(true),
        }
    }
}

impl SqliteBackend {
    /// Creates a new in-memory SQLite backend.
    ///
    /// The database lives in a single pooled connection that is never reaped,
    /// so it survives for the lifetime of the backend. Holding an explicit
    /// transaction blocks every other call on an in-memory store until it ends.
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_config(":memory:", SqliteBackendConfig::default())
    }

    /// Opens or creates a file-based SQLite database.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::with_config(path, SqliteBackendConfig::default())
    }

    /// Creates a backend with custom configuration.
    pub fn with_config<P: AsRef<Path>>(
        path: P,
        config: SqliteBackendConfig,
    ) -> StorageResult<Self> {
        let is_memory = path.as_ref().to_string_lossy() == ":memory:";

        let manager = if is_memory {
            SqliteConnectionManager::memory()
        } else {
            SqliteConnectionManager::file(path.as_ref())
        };
        let busy_timeout = Duration::from_millis(u64::from(config.busy_timeout_ms));
        let foreign_keys = config.enable_foreign_keys;
        let manager = manager.with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            if foreign_keys {
                conn.execute_batch("PRAGMA foreign_keys = ON")?;
            }
            Ok(())
        });

        let builder = Pool::builder()
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms));
        let builder = if is_memory {
            builder
                .max_size(1)
                .min_idle(Some(1))
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            let max_size = config.max_connections.max(1);
            builder
                .max_size(max_size)
                .min_idle(Some(config.min_connections.min(max_size)))
        };

        let pool = builder.build(manager).map_err(|e| {
            StorageError::Backend(BackendError::ConnectionFailed {
                backend_name: "sqlite".to_string(),
                message: e.to_string(),
            })
        })?;

        let backend = Self {
            pool,
            config,
            is_memory,
            codec: Arc::new(JsonCodec::new()),
            extractor: Arc::new(PathIndexExtractor::with_defaults()),
        };

        backend.configure_journal()?;

        Ok(backend)
    }

    /// Replaces the codec used for resource bodies.
    pub fn with_codec<C: ResourceCodec + 'static>(mut self, codec: C) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Replaces the index extractor.
    ///
    /// Existing index rows are not touched; call
    /// [`reindex`](SqliteBackend::reindex) to rebuild them.
    pub fn with_extractor<E: IndexExtractor + 'static>(mut self, extractor: E) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Initialize the database schema.
    pub fn init_schema(&self) -> StorageResult<()> {
        let conn = self.get_connection()?;
        schema::initialize_schema(&conn)
    }

    /// Get a connection from the pool.
    ///
    /// A checkout that times out surfaces as `BackendError::PoolExhausted`.
    pub(crate) fn get_connection(
        &self,
    ) -> StorageResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn configure_journal(&self) -> StorageResult<()> {
        if !self.config.enable_wal || self.is_memory {
            return Ok(());
        }

        let conn = self.get_connection()?;
        let mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| {
                StorageError::Backend(BackendError::Internal {
                    backend_name: "sqlite".to_string(),
                    message: format!("Failed to enable WAL mode: {}", e),
                    source: Some(Box::new(e)),
                })
            })?;
        tracing::debug!("SQLite journal mode: {}", mode);
        Ok(())
    }

    /// Runs a trivial statement to verify the database is reachable.
    pub fn health_check(&self) -> StorageResult<()> {
        let conn = self.get_connection().map_err(|_| {
            StorageError::Backend(BackendError::Unavailable {
                backend_name: "sqlite".to_string(),
                message: "Failed to get connection".to_string(),
            })
        })?;
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|e| {
                StorageError::Backend(BackendError::Internal {
                    backend_name: "sqlite".to_string(),
                    message: format!("Health check failed: {}", e),
                    source: None,
                })
            })?;
        Ok(())
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// Returns the backend configuration.
    pub fn config(&self) -> &SqliteBackendConfig {
        &self.config
    }

    /// Returns the codec.
    pub fn codec(&self) -> &Arc<dyn ResourceCodec> {
        &self.codec
    }

    /// Returns the index extractor.
    pub fn extractor(&self) -> &Arc<dyn IndexExtractor> {
        &self.extractor
    }
}
