//! # orderdesk-db: Persistence Layer for OrderDesk
//!
//! A generic repository and unit of work over SQLite (via sqlx) or an
//! in-memory store.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        OrderDesk Data Flow                              │
//! │                                                                         │
//! │  Caller (service, controller, seed binary)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   orderdesk-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  UnitOfWork   │    │ Repository<T> │    │   Reports    │  │   │
//! │  │   │  one session  │───►│ CRUD + find   │◄───│ LINQ-style   │  │   │
//! │  │   │  one commit   │    │ staged writes │    │ queries      │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │                                                     │   │
//! │  │   ┌───────▼───────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Session     │    │   Database    │    │  Migrations  │  │   │
//! │  │   │ Sqlite/Memory │◄───│   (pool.rs)   │    │  (embedded)  │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (WAL) or MemoryStore                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`session`] - Store access: SQLite and in-memory sessions
//! - [`repository`] - Generic repository over any entity type
//! - [`unit_of_work`] - Repository cache plus atomic commit
//! - [`reports`] - Report queries run through a unit of work
//!
//! ## Usage
//!
//! ```rust,ignore
//! use orderdesk_core::{Client, Order};
//! use orderdesk_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::from_env()).await?;
//! let mut uow = db.unit_of_work();
//!
//! let ana = uow.clients()?.add(Client::new("Ana", "ana@example.com"))?;
//! uow.save_changes().await?;
//!
//! let ana_id = uow.assigned_id(ana).unwrap();
//! uow.orders()?.add(Order::new(ana_id, chrono::Utc::now()))?;
//! uow.save_changes().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod reports;
pub mod repository;
pub mod session;
pub mod unit_of_work;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use reports::Reports;
pub use repository::{Pending, Repository};
pub use session::{
    ChangeOp, ChangeSet, FlushReport, MemorySession, MemoryStore, PendingKey, Record, Session,
    SqliteSession,
};
pub use unit_of_work::UnitOfWork;
