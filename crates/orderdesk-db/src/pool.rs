//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  Process startup                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::from_env() / DbConfig::new(path)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       │ db.unit_of_work() per logical operation                        │
//! │       ▼                                                                 │
//! │  UnitOfWork 1 ──► borrows a connection per read / flush                │
//! │  UnitOfWork 2 ──► borrows a connection per read / flush                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled so readers don't block
//! the writer and the writer doesn't block readers.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::session::SqliteSession;
use crate::unit_of_work::UnitOfWork;

/// Environment variable naming the database file.
pub const ENV_DB_PATH: &str = "ORDERDESK_DB_PATH";

/// Environment variable overriding the pool size.
pub const ENV_DB_MAX_CONNECTIONS: &str = "ORDERDESK_DB_MAX_CONNECTIONS";

/// Environment variable turning migrations on connect on or off.
pub const ENV_DB_RUN_MIGRATIONS: &str = "ORDERDESK_DB_RUN_MIGRATIONS";

const DEFAULT_DB_PATH: &str = "orderdesk.db";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/orderdesk.db")
///     .max_connections(5)
///     .min_connections(1);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// ## Arguments
    /// * `path` - Path to the SQLite database file. Will be created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// Builds a configuration from `ORDERDESK_DB_*` environment variables.
    ///
    /// ## Variables
    /// | Variable                       | Default        |
    /// |--------------------------------|----------------|
    /// | `ORDERDESK_DB_PATH`            | `orderdesk.db` |
    /// | `ORDERDESK_DB_MAX_CONNECTIONS` | `5`            |
    /// | `ORDERDESK_DB_RUN_MIGRATIONS`  | `true`         |
    ///
    /// Unparseable values are logged and the default is kept.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config =
            DbConfig::new(lookup(ENV_DB_PATH).unwrap_or_else(|| DEFAULT_DB_PATH.to_string()));

        if let Some(raw) = lookup(ENV_DB_MAX_CONNECTIONS) {
            match raw.trim().parse::<u32>() {
                Ok(max) if max > 0 => config.max_connections = max,
                _ => warn!(variable = ENV_DB_MAX_CONNECTIONS, value = %raw, "Ignoring invalid value"),
            }
        }

        if let Some(raw) = lookup(ENV_DB_RUN_MIGRATIONS) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => config.run_migrations = true,
                "0" | "false" | "no" => config.run_migrations = false,
                _ => warn!(variable = ENV_DB_RUN_MIGRATIONS, value = %raw, "Ignoring invalid value"),
            }
        }

        config
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let db = Database::new(DbConfig::in_memory()).await?;
    /// // Database is isolated, dropped with the pool
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the SQLite pool; hands out units of work.
///
/// Cheap to clone: clones share the pool.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::from_env()).await?;
///
/// let mut uow = db.unit_of_work();
/// let clients = uow.clients()?.get_all().await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous (balance of safety/speed)
    ///    - Foreign keys enabled
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        // sqlite://path creates file if not exists
        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default
            .foreign_keys(true)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations. Idempotent.
    ///
    /// Called by `new()` when `run_migrations` is set.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens a unit of work with its own session over this pool.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let mut uow = db.unit_of_work();
    /// uow.products()?.add(Product::new("Pen", None, Money::from_cents(150)))?;
    /// uow.save_changes().await?;
    /// ```
    pub fn unit_of_work(&self) -> UnitOfWork<SqliteSession> {
        UnitOfWork::new(SqliteSession::new(self.pool.clone()))
    }

    /// Closes the database connection pool.
    ///
    /// After calling close, every session over this pool fails with
    /// `ConnectionFailed`.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use orderdesk_core::Client;

    #[tokio::test]
    async fn test_in_memory_database() {
        let config = DbConfig::in_memory();
        let db = Database::new(config).await.unwrap();

        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .run_migrations(false);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert!(!config.run_migrations);
    }

    #[test]
    fn test_config_from_lookup() {
        let config = DbConfig::from_lookup(|key| match key {
            ENV_DB_PATH => Some("/var/lib/orderdesk/data.db".to_string()),
            ENV_DB_MAX_CONNECTIONS => Some("12".to_string()),
            ENV_DB_RUN_MIGRATIONS => Some("false".to_string()),
            _ => None,
        });

        assert_eq!(config.database_path, PathBuf::from("/var/lib/orderdesk/data.db"));
        assert_eq!(config.max_connections, 12);
        assert!(!config.run_migrations);
    }

    #[test]
    fn test_config_from_lookup_keeps_defaults_on_bad_values() {
        let config = DbConfig::from_lookup(|key| match key {
            ENV_DB_MAX_CONNECTIONS => Some("lots".to_string()),
            ENV_DB_RUN_MIGRATIONS => Some("maybe".to_string()),
            _ => None,
        });

        assert_eq!(config.database_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.max_connections, 5);
        assert!(config.run_migrations);
    }

    #[tokio::test]
    async fn test_closed_pool_fails_reads() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;

        assert!(!db.health_check().await);

        let mut uow = db.unit_of_work();
        let err = uow.clients().unwrap().get_all().await.unwrap_err();
        assert!(matches!(err, DbError::ConnectionFailed(_)));
    }

    #[tokio::test]
    async fn test_unit_of_work_commits_to_pool() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut uow = db.unit_of_work();
        uow.clients()
            .unwrap()
            .add(Client::new("Ana", "ana@example.com"))
            .unwrap();
        uow.save_changes().await.unwrap();
        uow.dispose();

        let mut other = db.unit_of_work();
        assert_eq!(other.clients().unwrap().count().await.unwrap(), 1);
    }
}
