//! # Database Migrations
//!
//! Embedded SQL migrations creating the OrderDesk schema.
//!
//! ## Schema
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   clients ◄──────── orders ◄──────── order_details ────────► products   │
//! │   id                id                id                     id         │
//! │   name              client_id (FK)    order_id (FK)          name       │
//! │   email             order_date        product_id (FK)        description│
//! │                                       quantity               price      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## How Migrations Work
//! On startup the embedded migrations are compared with the rows of
//! `_sqlx_migrations`; pending ones run in filename order, each in its own
//! transaction, and are recorded with their checksum.
//!
//! ## Adding New Migrations
//!
//! 1. Create a new file in `migrations/sqlite/` with the next sequence number
//! 2. Name format: `NNN_description.sql` (e.g., `002_add_order_status.sql`)
//! 3. **NEVER** modify existing migrations - always add new ones

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Migrations from `migrations/sqlite`, embedded at compile time.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Migration counts for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStatus {
    pub total: usize,
    pub applied: usize,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.applied >= self.total
    }
}

/// Reports how many embedded migrations have been applied.
///
/// A database that has never been migrated reports zero applied.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<MigrationStatus> {
    let total = MIGRATOR.migrations.len();

    let tracked: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;

    let applied: i64 = if tracked == 0 {
        0
    } else {
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?
    };

    Ok(MigrationStatus {
        total,
        applied: applied as usize,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_status_before_and_after_migrating() {
        let db = Database::new(DbConfig::in_memory().run_migrations(false))
            .await
            .unwrap();

        let status = migration_status(db.pool()).await.unwrap();
        assert_eq!(status.applied, 0);
        assert!(!status.is_current());

        db.run_migrations().await.unwrap();
        db.run_migrations().await.unwrap();

        let status = migration_status(db.pool()).await.unwrap();
        assert!(status.total >= 1);
        assert!(status.is_current());
    }

    #[tokio::test]
    async fn test_schema_enforces_foreign_keys() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let result = sqlx::query("INSERT INTO orders (client_id, order_date) VALUES (1, '2024-03-01T00:00:00Z')")
            .execute(db.pool())
            .await;

        assert!(result.is_err());
    }
}
