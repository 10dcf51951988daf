//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                    busy/locked → Conflict                      │
//! │       │                    pool/io     → ConnectionFailed/PoolExhausted│
//! │       ▼                                                                 │
//! │  PurchaseError (bookstock-core) ← What checkout callers see            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Frontend displays user-friendly message                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bookstock_core::{PurchaseError, ValidationError};
use thiserror::Error;

/// SQLite result codes that mean "another connection got there first".
///
/// BUSY (5), LOCKED (6), BUSY_RECOVERY (261), LOCKED_SHAREDCACHE (262),
/// BUSY_SNAPSHOT (517), BUSY_TIMEOUT (773).
const SQLITE_CONFLICT_CODES: &[&str] = &["5", "6", "261", "262", "517", "773"];

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A concurrent writer invalidated what this operation read.
    ///
    /// ## When This Occurs
    /// - A versioned UPDATE matched zero rows
    /// - SQLite reported BUSY/LOCKED, or BUSY_SNAPSHOT when a read
    ///   transaction tried to become a write transaction
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// CHECK / UNIQUE / NOT NULL constraint violation.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be opened or created
    /// - Pool has been closed
    /// - I/O error talking to the file
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use past the acquire timeout).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read or parsed.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Input rejected before touching the database.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// True for errors a retry with a fresh snapshot can fix.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Conflict(_))
    }

    /// True when the store itself is unreachable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DbError::ConnectionFailed(_) | DbError::PoolExhausted)
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → busy/locked codes → Conflict
///                               constraint codes  → ConstraintViolation
///                               other             → QueryFailed
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// PoolClosed / Io / crashed   → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();
                let code = db_err.code().map(|c| c.to_string());

                let is_conflict = code
                    .as_deref()
                    .map(|c| SQLITE_CONFLICT_CODES.contains(&c))
                    .unwrap_or(false)
                    || msg.contains("database is locked")
                    || msg.contains("database table is locked");

                if is_conflict {
                    DbError::Conflict(msg)
                } else if msg.contains("constraint failed") {
                    DbError::ConstraintViolation(msg)
                } else {
                    DbError::QueryFailed(msg)
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),

            sqlx::Error::WorkerCrashed => {
                DbError::ConnectionFailed("SQLite worker thread crashed".to_string())
            }

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<toml::de::Error> for DbError {
    fn from(err: toml::de::Error) -> Self {
        DbError::ConfigLoadFailed(err.to_string())
    }
}

/// How a storage failure reaches a checkout caller.
///
/// Conflicts only get here if they escape the ledger's retry loop, so they
/// count as a single exhausted attempt.
impl From<DbError> for PurchaseError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { id, .. } => PurchaseError::NotFound(id),
            DbError::Conflict(_) => PurchaseError::TransientConflict { attempts: 1 },
            DbError::Validation(v) => PurchaseError::InvalidInput(v),
            other => PurchaseError::Unavailable(other.to_string()),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================
