//! # Generic Repository
//!
//! One repository implementation serving every entity type.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository<'u, T, S>                                 │
//! │                                                                         │
//! │  Caller                                                                 │
//! │       │                                                                 │
//! │       │  uow.products()?.find(&Predicate::between(Price, 10, 50))      │
//! │       ▼                                                                 │
//! │  Repository<Product, S>                                                 │
//! │  ├── reads ──────────► session (committed state only)                   │
//! │  │     get_all, get_by_id, find, find_by, count                        │
//! │  │                                                                      │
//! │  └── writes ─────────► Tracker<Product> (owned by the unit of work)     │
//! │        add, update, remove, remove_by_id                               │
//! │              │                                                          │
//! │              ▼                                                          │
//! │        UnitOfWork::save_changes ──► ChangeSet ──► session.flush         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A repository handle borrows its unit of work mutably, so it cannot
//! outlive it and no two handles exist at once. Staged state lives in the
//! unit of work's tracker, so a later handle for the same type sees it.

use std::any::Any;

use orderdesk_core::{Entity, EntityId, Predicate, UNASSIGNED_ID};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::session::{Change, ChangeOp, PendingKey, Record, Session};

// =============================================================================
// Change Tracking
// =============================================================================

/// One staged change of a typed repository.
#[derive(Debug, Clone)]
pub struct Pending<T> {
    pub key: PendingKey,
    pub op: ChangeOp,
    /// Target identity; unassigned for inserts.
    pub id: EntityId,
    /// The staged entity; `None` for deletions.
    pub entity: Option<T>,
}

/// Type-erased view of a tracker, so the unit of work can hold one per
/// entity kind in a single map.
pub(crate) trait ChangeTracker: Send + Sync {
    fn changes(&self) -> DbResult<Vec<Change>>;

    fn clear(&mut self);

    fn len(&self) -> usize;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Staged changes of one entity type, in registration order.
#[derive(Debug)]
pub(crate) struct Tracker<T> {
    pending: Vec<Pending<T>>,
}

impl<T> Default for Tracker<T> {
    fn default() -> Self {
        Tracker {
            pending: Vec::new(),
        }
    }
}

impl<T: Record> ChangeTracker for Tracker<T> {
    fn changes(&self) -> DbResult<Vec<Change>> {
        self.pending
            .iter()
            .map(|p| match &p.entity {
                Some(entity) => Change::write(p.key, p.op, entity),
                None => Ok(Change::delete(p.key, T::KIND, p.id)),
            })
            .collect()
    }

    fn clear(&mut self) {
        self.pending.clear();
    }

    fn len(&self) -> usize {
        self.pending.len()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// =============================================================================
// Repository
// =============================================================================

/// CRUD and predicate access to one entity type.
///
/// Obtained from [`UnitOfWork`](crate::UnitOfWork) accessors.
///
/// ## Usage
/// ```rust,ignore
/// let mut uow = db.unit_of_work();
///
/// let key = uow.clients()?.add(Client::new("Ana", "ana@example.com"))?;
/// uow.save_changes().await?;
///
/// let id = uow.assigned_id(key).unwrap();
/// let ana = uow.clients()?.get_by_id(id).await?;
/// ```
pub struct Repository<'u, T, S> {
    session: &'u S,
    tracker: &'u mut Tracker<T>,
    sequence: &'u mut u64,
    unit_of_work: Uuid,
}

impl<'u, T: Record, S: Session> Repository<'u, T, S> {
    pub(crate) fn new(
        session: &'u S,
        tracker: &'u mut Tracker<T>,
        sequence: &'u mut u64,
        unit_of_work: Uuid,
    ) -> Self {
        Repository {
            session,
            tracker,
            sequence,
            unit_of_work,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Every stored entity, ordered by identity.
    pub async fn get_all(&self) -> DbResult<Vec<T>> {
        self.session.fetch_all().await
    }

    /// The stored entity with this identity, if any.
    pub async fn get_by_id(&self, id: EntityId) -> DbResult<Option<T>> {
        self.session.fetch_by_id(id).await
    }

    /// Stored entities matching a typed predicate.
    ///
    /// The in-memory session evaluates the predicate directly; the SQLite
    /// session translates it to a WHERE clause. Both agree on results.
    pub async fn find(&self, predicate: &Predicate<T::Field>) -> DbResult<Vec<T>> {
        debug!(
            unit_of_work = %self.unit_of_work,
            entity = %T::KIND,
            "Finding by predicate"
        );
        self.session.fetch_where(predicate).await
    }

    /// Stored entities for which `keep` returns true.
    ///
    /// Evaluated in memory over [`get_all`](Self::get_all).
    pub async fn find_by(&self, keep: impl Fn(&T) -> bool) -> DbResult<Vec<T>> {
        let all = self.get_all().await?;
        Ok(all.into_iter().filter(|e| keep(e)).collect())
    }

    pub async fn count(&self) -> DbResult<u64> {
        self.session.count::<T>().await
    }

    // =========================================================================
    // Staged Writes
    // =========================================================================

    /// Stages an insertion. The store assigns the identity at commit;
    /// resolve it with [`UnitOfWork::assigned_id`](crate::UnitOfWork::assigned_id).
    pub fn add(&mut self, entity: T) -> DbResult<PendingKey> {
        if entity.is_persisted() {
            return Err(DbError::invalid_operation(format!(
                "cannot add {} {}: identity is assigned by the store",
                T::KIND,
                entity.id()
            )));
        }
        entity.validate()?;

        let key = self.stage(ChangeOp::Insert, UNASSIGNED_ID, Some(entity));
        Ok(key)
    }

    /// Stages a modification of a stored entity.
    ///
    /// An entity without identity is rejected here; an identity the store
    /// does not know fails the whole commit.
    pub fn update(&mut self, entity: T) -> DbResult<()> {
        if !entity.is_persisted() {
            return Err(DbError::invalid_operation(format!(
                "cannot update {} that was never persisted",
                T::KIND
            )));
        }
        entity.validate()?;

        self.stage(ChangeOp::Update, entity.id(), Some(entity));
        Ok(())
    }

    /// Stages a deletion of a stored entity.
    pub fn remove(&mut self, entity: &T) -> DbResult<()> {
        self.remove_by_id(entity.id())
    }

    /// Stages a deletion by identity.
    pub fn remove_by_id(&mut self, id: EntityId) -> DbResult<()> {
        if id == UNASSIGNED_ID {
            return Err(DbError::invalid_operation(format!(
                "cannot remove {} that was never persisted",
                T::KIND
            )));
        }

        self.stage(ChangeOp::Delete, id, None);
        Ok(())
    }

    /// Changes staged for this entity type since the last commit.
    pub fn pending(&self) -> &[Pending<T>] {
        &self.tracker.pending
    }

    fn stage(&mut self, op: ChangeOp, id: EntityId, entity: Option<T>) -> PendingKey {
        *self.sequence += 1;
        let key = PendingKey::new(*self.sequence);

        debug!(
            unit_of_work = %self.unit_of_work,
            entity = %T::KIND,
            id = id,
            key = %key,
            op = ?op,
            "Staged change"
        );

        self.tracker.pending.push(Pending {
            key,
            op,
            id,
            entity,
        });
        key
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use orderdesk_core::{Client, ClientField, EntityKind, Money, Product, ValidationError};

    use crate::session::MemoryStore;

    #[test]
    fn test_tracker_erases_changes_in_order() {
        let mut tracker = Tracker::<Product>::default();
        tracker.pending.push(Pending {
            key: PendingKey::new(4),
            op: ChangeOp::Insert,
            id: UNASSIGNED_ID,
            entity: Some(Product::new("Pen", None, Money::from_cents(150))),
        });
        tracker.pending.push(Pending {
            key: PendingKey::new(7),
            op: ChangeOp::Delete,
            id: 3,
            entity: None,
        });

        let changes = tracker.changes().unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].op, ChangeOp::Insert);
        assert_eq!(changes[1].kind, EntityKind::Product);
        assert_eq!(changes[1].id, 3);

        tracker.clear();
        assert_eq!(ChangeTracker::len(&tracker), 0);
    }

    #[tokio::test]
    async fn test_add_rejects_identified_and_invalid_entities() {
        let store = MemoryStore::new();
        let mut uow = store.unit_of_work();
        let mut clients = uow.clients().unwrap();

        let err = clients
            .add(Client::new("Ana", "ana@example.com").with_id(3))
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidOperation { .. }));

        let err = clients.add(Client::new("  ", "ana@example.com")).unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation(ValidationError::Required { .. })
        ));

        assert!(clients.pending().is_empty());
    }

    #[tokio::test]
    async fn test_unassigned_update_and_remove_fail_immediately() {
        let store = MemoryStore::new();
        let mut uow = store.unit_of_work();
        let mut clients = uow.clients().unwrap();

        assert!(matches!(
            clients.update(Client::new("Ana", "ana@example.com")),
            Err(DbError::InvalidOperation { .. })
        ));
        assert!(matches!(
            clients.remove_by_id(UNASSIGNED_ID),
            Err(DbError::InvalidOperation { .. })
        ));
    }

    #[tokio::test]
    async fn test_keys_follow_registration_order_across_repositories() {
        let store = MemoryStore::new();
        let mut uow = store.unit_of_work();

        let first = uow
            .clients()
            .unwrap()
            .add(Client::new("Ana", "ana@example.com"))
            .unwrap();
        let second = uow
            .products()
            .unwrap()
            .add(Product::new("Pen", None, Money::from_cents(150)))
            .unwrap();
        let third = uow
            .clients()
            .unwrap()
            .add(Client::new("Bruno", "bruno@example.com"))
            .unwrap();

        assert!(first < second && second < third);
        assert_eq!(uow.clients().unwrap().pending().len(), 2);
    }

    #[tokio::test]
    async fn test_find_and_find_by_read_committed_rows() {
        let store = MemoryStore::new();
        let mut uow = store.unit_of_work();

        {
            let mut clients = uow.clients().unwrap();
            clients.add(Client::new("Ana Lima", "ana@example.com")).unwrap();
            clients.add(Client::new("Bruno", "bruno@example.com")).unwrap();
        }
        uow.save_changes().await.unwrap();

        // staged, not visible
        uow.clients()
            .unwrap()
            .add(Client::new("Ana Souza", "souza@example.com"))
            .unwrap();

        let clients = uow.clients().unwrap();
        let found = clients
            .find(&Predicate::contains(ClientField::Name, "Ana"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        let found = clients.find_by(|c| c.email.starts_with('b')).await.unwrap();
        assert_eq!(found[0].name, "Bruno");

        assert_eq!(clients.count().await.unwrap(), 2);
    }
}
