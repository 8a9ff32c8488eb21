//! # Sessions
//!
//! A session is the unit of work's only path to a store. It reads committed
//! state and applies a whole batch of staged changes atomically.
//!
//! ## Session Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Session (trait)                                 │
//! │                                                                         │
//! │  fetch_all::<T>()             every row of T's table, ordered by id     │
//! │  fetch_by_id::<T>(id)         Option<T>                                 │
//! │  fetch_where::<T>(&pred)      rows matching a typed predicate           │
//! │  count::<T>()                 row count                                 │
//! │  flush(&ChangeSet)            all changes or none → FlushReport         │
//! │  close()                      idempotent; later calls → SessionClosed   │
//! │                                                                         │
//! │  ┌──────────────────────┐          ┌──────────────────────┐            │
//! │  │    SqliteSession     │          │    MemorySession     │            │
//! │  │  pooled connections  │          │  shared tables under │            │
//! │  │  flush = sqlx tx     │          │  one tokio Mutex     │            │
//! │  │  predicate → SQL     │          │  predicate → matches │            │
//! │  └──────────────────────┘          └──────────────────────┘            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Change Sets
//! Repositories stage typed entities. At commit the unit of work erases them
//! into [`Change`]s (table, operation, identity, column values, JSON payload,
//! references) and hands them over in registration order.

pub mod memory;
pub mod sql;
pub mod sqlite;

use std::fmt;
use std::future::Future;

use orderdesk_core::{Entity, EntityId, EntityKind, Predicate, Reference, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::FromRow;

use crate::error::DbResult;

pub use memory::{MemorySession, MemoryStore};
pub use sqlite::SqliteSession;

// =============================================================================
// Record
// =============================================================================

/// An entity both sessions can read and write.
///
/// Blanket-implemented for every entity that derives serde and `FromRow`.
pub trait Record:
    Entity + Serialize + DeserializeOwned + for<'r> FromRow<'r, SqliteRow> + Unpin
{
}

impl<T> Record for T where
    T: Entity + Serialize + DeserializeOwned + for<'r> FromRow<'r, SqliteRow> + Unpin
{
}

// =============================================================================
// Change Set
// =============================================================================

/// Ticket returned by `Repository::add`, resolved to the store-assigned
/// identity by `UnitOfWork::assigned_id` after a successful commit.
///
/// Keys are issued in registration order across every repository of one
/// unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PendingKey(u64);

impl PendingKey {
    pub(crate) fn new(sequence: u64) -> Self {
        PendingKey(sequence)
    }
}

impl fmt::Display for PendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// One staged change, erased from its entity type.
#[derive(Debug, Clone)]
pub struct Change {
    pub key: PendingKey,
    pub kind: EntityKind,
    pub op: ChangeOp,
    /// Target identity; unassigned for inserts.
    pub id: EntityId,
    /// Non-identity columns; empty for deletes.
    pub columns: Vec<(&'static str, Value)>,
    /// Full serialized entity; `Null` for deletes.
    pub payload: serde_json::Value,
    pub references: Vec<Reference>,
}

impl Change {
    /// Builds an insert or update from a typed entity.
    pub fn write<T: Record>(key: PendingKey, op: ChangeOp, entity: &T) -> DbResult<Self> {
        Ok(Change {
            key,
            kind: T::KIND,
            op,
            id: entity.id(),
            columns: entity.columns(),
            payload: serde_json::to_value(entity)?,
            references: entity.references(),
        })
    }

    pub fn delete(key: PendingKey, kind: EntityKind, id: EntityId) -> Self {
        Change {
            key,
            kind,
            op: ChangeOp::Delete,
            id,
            columns: Vec::new(),
            payload: serde_json::Value::Null,
            references: Vec::new(),
        }
    }
}

/// An ordered batch of changes applied atomically by [`Session::flush`].
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    /// Builds a change set, ordering changes by registration.
    pub fn new(mut changes: Vec<Change>) -> Self {
        changes.sort_by_key(|c| c.key);
        ChangeSet { changes }
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }
}

/// Outcome of a successful flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Rows inserted, updated or deleted.
    pub affected: u64,
    /// Identity assigned to each inserted change.
    pub inserted: Vec<(PendingKey, EntityId)>,
}

// =============================================================================
// Session Trait
// =============================================================================

/// Store access shared by every repository of one unit of work.
///
/// Reads see committed state only. `flush` is all-or-nothing: on error, and
/// when its future is dropped before completion, the store keeps its
/// pre-flush state.
pub trait Session: Send + Sync + 'static {
    fn fetch_all<T: Record>(&self) -> impl Future<Output = DbResult<Vec<T>>> + Send;

    fn fetch_by_id<T: Record>(
        &self,
        id: EntityId,
    ) -> impl Future<Output = DbResult<Option<T>>> + Send;

    fn fetch_where<T: Record>(
        &self,
        predicate: &Predicate<T::Field>,
    ) -> impl Future<Output = DbResult<Vec<T>>> + Send;

    fn count<T: Record>(&self) -> impl Future<Output = DbResult<u64>> + Send;

    fn flush(&self, changes: &ChangeSet) -> impl Future<Output = DbResult<FlushReport>> + Send;

    /// Releases the session. Idempotent.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use orderdesk_core::{Money, OrderDetail, Product};

    #[test]
    fn test_change_set_orders_by_registration() {
        let set = ChangeSet::new(vec![
            Change::delete(PendingKey::new(3), EntityKind::Client, 1),
            Change::delete(PendingKey::new(1), EntityKind::Order, 2),
            Change::delete(PendingKey::new(2), EntityKind::Product, 3),
        ]);

        let kinds: Vec<_> = set.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![EntityKind::Order, EntityKind::Product, EntityKind::Client]
        );
    }

    #[test]
    fn test_write_change_carries_columns_and_references() {
        let detail = OrderDetail::new(4, 9, 2);
        let change = Change::write(PendingKey::new(1), ChangeOp::Insert, &detail).unwrap();

        assert_eq!(change.kind, EntityKind::OrderDetail);
        assert_eq!(change.columns.len(), 3);
        assert_eq!(change.references.len(), 2);
        assert_eq!(change.payload["quantity"], 2);

        let product = Product::new("Pen", None, Money::from_cents(150)).with_id(5);
        let change = Change::write(PendingKey::new(2), ChangeOp::Update, &product).unwrap();
        assert_eq!(change.id, 5);
        assert!(change.references.is_empty());
    }
}
