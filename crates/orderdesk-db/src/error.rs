//! # Database Error Types
//!
//! Error types for sessions, repositories and the unit of work.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)      ValidationError (orderdesk-core)      │
//! │       │                                │                                │
//! │       ▼                                ▼                                │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Caller (HTTP handler, CLI) maps to its own status codes               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Absence of an entity is not an error: `get_by_id` returns `Option`.

use orderdesk_core::{EntityId, EntityKind, ValidationError};
use thiserror::Error;

/// Unit of work and store errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// A repository call that can never succeed.
    ///
    /// ## When This Occurs
    /// - `add` of an entity that already carries an identity
    /// - `update` / `remove` of an entity that was never persisted
    ///
    /// An unknown identity found at commit time is reported separately as
    /// [`DbError::UnknownEntity`]; [`DbError::is_invalid_operation`] covers both.
    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    /// A staged update or delete named an identity the store does not have.
    ///
    /// Raised at commit time; the whole batch is rolled back.
    #[error("{entity} {id} does not exist")]
    UnknownEntity { entity: EntityKind, id: EntityId },

    /// The unit of work was disposed.
    #[error("Session is closed")]
    SessionClosed,

    /// Unique constraint violation.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting an order for a client that does not exist
    /// - Deleting a product that order lines still reference
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),

    /// Entity failed its field rules before staging.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A staged payload could not be encoded or decoded.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbError {
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        DbError::InvalidOperation {
            message: message.into(),
        }
    }

    pub fn unknown_entity(entity: EntityKind, id: EntityId) -> Self {
        DbError::UnknownEntity { entity, id }
    }

    /// Whether the caller asked for something that cannot be done: a
    /// misuse caught when staging, or an unknown identity caught at commit.
    pub fn is_invalid_operation(&self) -> bool {
        matches!(
            self,
            DbError::InvalidOperation { .. } | DbError::UnknownEntity { .. }
        )
    }

    /// Whether the error came from the store rather than from the caller.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            DbError::UniqueViolation { .. }
                | DbError::ForeignKeyViolation { .. }
                | DbError::ConnectionFailed(_)
                | DbError::MigrationFailed(_)
                | DbError::QueryFailed(_)
                | DbError::TransactionFailed(_)
                | DbError::PoolExhausted
                | DbError::Internal(_)
        )
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::PoolClosed     → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_failure_classification() {
        assert!(DbError::PoolExhausted.is_store_failure());
        assert!(DbError::ForeignKeyViolation {
            message: "FOREIGN KEY constraint failed".to_string()
        }
        .is_store_failure());

        assert!(!DbError::SessionClosed.is_store_failure());
        assert!(!DbError::unknown_entity(EntityKind::Client, 9).is_store_failure());
    }

    #[test]
    fn test_invalid_operation_covers_unknown_identity() {
        assert!(DbError::invalid_operation("already persisted").is_invalid_operation());
        assert!(DbError::unknown_entity(EntityKind::Order, 3).is_invalid_operation());

        assert!(!DbError::SessionClosed.is_invalid_operation());
        assert!(!DbError::PoolExhausted.is_invalid_operation());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            DbError::unknown_entity(EntityKind::Product, 42).to_string(),
            "Product 42 does not exist"
        );

        let err: DbError = ValidationError::Required {
            field: "name".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "name is required");
    }

    #[test]
    fn test_pool_errors_map() {
        assert!(matches!(DbError::from(sqlx::Error::PoolTimedOut), DbError::PoolExhausted));
        assert!(matches!(
            DbError::from(sqlx::Error::PoolClosed),
            DbError::ConnectionFailed(_)
        ));
    }
}
