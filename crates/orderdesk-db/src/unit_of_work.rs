//! # Unit of Work
//!
//! Repositories for every entity type sharing one session and one commit.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        UnitOfWork<S: Session>                           │
//! │                                                                         │
//! │  db.unit_of_work() / store.unit_of_work()                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  clients() / products() / orders() / order_details() / repository::<T>()│
//! │       │   first access creates the tracker for that kind; later calls  │
//! │       │   reach the same tracker                                       │
//! │       ▼                                                                 │
//! │  add / update / remove ──► trackers (registration order via keys)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  save_changes()                                                         │
//! │       ├── ok  → trackers cleared, assigned ids recorded, rows affected  │
//! │       └── err → store untouched, staged changes kept, error returned    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  dispose() / Drop → session closed exactly once                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Staged entities referencing each other must be committed in separate
//! batches, because identities exist only after a flush.

use std::collections::HashMap;

use orderdesk_core::{Client, EntityId, EntityKind, Order, OrderDetail, Product};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{ChangeTracker, Repository, Tracker};
use crate::session::{ChangeSet, PendingKey, Record, Session};

/// Repositories plus a single atomic commit over one session.
///
/// ## Example
/// ```rust,ignore
/// let mut uow = db.unit_of_work();
///
/// let client = uow.clients()?.add(Client::new("Ana", "ana@example.com"))?;
/// uow.save_changes().await?;
///
/// let client_id = uow.assigned_id(client).unwrap();
/// uow.orders()?.add(Order::new(client_id, Utc::now()))?;
/// uow.save_changes().await?;
/// ```
pub struct UnitOfWork<S: Session> {
    id: Uuid,
    session: Option<S>,
    trackers: HashMap<EntityKind, Box<dyn ChangeTracker>>,
    sequence: u64,
    assigned: HashMap<PendingKey, EntityId>,
}

impl<S: Session> UnitOfWork<S> {
    pub fn new(session: S) -> Self {
        let id = Uuid::new_v4();
        debug!(unit_of_work = %id, "Unit of work opened");

        UnitOfWork {
            id,
            session: Some(session),
            trackers: HashMap::new(),
            sequence: 0,
            assigned: HashMap::new(),
        }
    }

    /// Correlation id recorded on this unit of work's log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    // =========================================================================
    // Repositories
    // =========================================================================

    pub fn clients(&mut self) -> DbResult<Repository<'_, Client, S>> {
        self.repository()
    }

    pub fn products(&mut self) -> DbResult<Repository<'_, Product, S>> {
        self.repository()
    }

    pub fn orders(&mut self) -> DbResult<Repository<'_, Order, S>> {
        self.repository()
    }

    pub fn order_details(&mut self) -> DbResult<Repository<'_, OrderDetail, S>> {
        self.repository()
    }

    /// Repository for any entity type, created on first access.
    ///
    /// Fails with `SessionClosed` once the unit of work is disposed.
    pub fn repository<T: Record>(&mut self) -> DbResult<Repository<'_, T, S>> {
        let session = self.session.as_ref().ok_or(DbError::SessionClosed)?;

        let tracker = self
            .trackers
            .entry(T::KIND)
            .or_insert_with(|| {
                debug!(unit_of_work = %self.id, entity = %T::KIND, "Repository created");
                Box::new(Tracker::<T>::default()) as Box<dyn ChangeTracker>
            })
            .as_any_mut()
            .downcast_mut::<Tracker<T>>()
            .ok_or_else(|| {
                DbError::Internal(format!("tracker for {} has the wrong type", T::KIND))
            })?;

        Ok(Repository::new(
            session,
            tracker,
            &mut self.sequence,
            self.id,
        ))
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Applies every staged change as one atomic batch.
    ///
    /// ## Returns
    /// * `Ok(n)` - rows inserted, updated or deleted (0 when nothing was staged)
    /// * `Err(e)` - nothing applied; staged changes are kept
    pub async fn save_changes(&mut self) -> DbResult<u64> {
        let session = self.session.as_ref().ok_or(DbError::SessionClosed)?;

        let mut changes = Vec::new();
        for tracker in self.trackers.values() {
            changes.extend(tracker.changes()?);
        }

        if changes.is_empty() {
            debug!(unit_of_work = %self.id, "Nothing to save");
            return Ok(0);
        }

        let set = ChangeSet::new(changes);
        let report = match session.flush(&set).await {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    unit_of_work = %self.id,
                    changes = set.len(),
                    error = %e,
                    "Save failed, nothing applied"
                );
                return Err(e);
            }
        };

        for tracker in self.trackers.values_mut() {
            tracker.clear();
        }
        self.assigned.extend(report.inserted);

        info!(
            unit_of_work = %self.id,
            changes = set.len(),
            affected = report.affected,
            "Changes saved"
        );
        Ok(report.affected)
    }

    pub fn has_changes(&self) -> bool {
        self.pending_count() > 0
    }

    /// Drops every staged change without touching the store.
    pub fn discard_changes(&mut self) {
        let discarded = self.pending_count();
        for tracker in self.trackers.values_mut() {
            tracker.clear();
        }

        if discarded > 0 {
            debug!(unit_of_work = %self.id, discarded, "Discarded staged changes");
        }
    }

    /// Identity the store assigned to a committed `add`.
    ///
    /// `None` until the commit that carried the key succeeds.
    pub fn assigned_id(&self, key: PendingKey) -> Option<EntityId> {
        self.assigned.get(&key).copied()
    }

    fn pending_count(&self) -> usize {
        self.trackers.values().map(|t| t.len()).sum()
    }

    // =========================================================================
    // Disposal
    // =========================================================================

    /// Closes the session. Idempotent; also runs on drop.
    ///
    /// Staged changes are discarded.
    pub fn dispose(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        let pending = self.pending_count();
        if pending > 0 {
            warn!(
                unit_of_work = %self.id,
                pending,
                "Disposing with unsaved changes"
            );
        }

        self.trackers.clear();
        session.close();
        debug!(unit_of_work = %self.id, "Unit of work disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.session.is_none()
    }
}

impl<S: Session> Drop for UnitOfWork<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use orderdesk_core::{ClientField, Entity, Money, Predicate, ProductField, Value};
    use std::time::Duration;

    use crate::pool::{Database, DbConfig};
    use crate::session::MemoryStore;

    async fn sqlite() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn order_date() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    // =========================================================================
    // Shared scenarios, run against both sessions
    // =========================================================================

    async fn add_then_get<S: Session>(mut uow: UnitOfWork<S>) {
        let ana = Client::new("Ana", "ana@example.com");
        let key = uow.clients().unwrap().add(ana.clone()).unwrap();

        assert_eq!(uow.assigned_id(key), None);
        assert_eq!(uow.save_changes().await.unwrap(), 1);
        assert!(!uow.has_changes());

        let id = uow.assigned_id(key).unwrap();
        let stored = uow.clients().unwrap().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored, ana.with_id(id));

        assert_eq!(uow.clients().unwrap().get_by_id(id + 100).await.unwrap(), None);
    }

    async fn update_all_fields<S: Session>(mut uow: UnitOfWork<S>) {
        let key = uow
            .products()
            .unwrap()
            .add(Product::new("Pen", None, Money::from_cents(150)))
            .unwrap();
        uow.save_changes().await.unwrap();
        let id = uow.assigned_id(key).unwrap();

        let changed = Product::new(
            "Fountain pen",
            Some("Steel nib".to_string()),
            Money::from_major(45),
        )
        .with_id(id);
        uow.products().unwrap().update(changed.clone()).unwrap();
        assert_eq!(uow.save_changes().await.unwrap(), 1);

        let stored = uow.products().unwrap().get_by_id(id).await.unwrap();
        assert_eq!(stored, Some(changed));
    }

    async fn dispose_twice<S: Session>(mut uow: UnitOfWork<S>) {
        uow.clients()
            .unwrap()
            .add(Client::new("Ana", "ana@example.com"))
            .unwrap();

        uow.dispose();
        uow.dispose();

        assert!(uow.is_disposed());
        assert!(!uow.has_changes());
        assert!(matches!(uow.clients(), Err(DbError::SessionClosed)));
        assert!(matches!(uow.save_changes().await, Err(DbError::SessionClosed)));
    }

    async fn violation_applies_nothing<S: Session>(
        mut uow: UnitOfWork<S>,
        fresh: UnitOfWork<S>,
    ) {
        uow.clients()
            .unwrap()
            .add(Client::new("Ana", "ana@example.com"))
            .unwrap();
        uow.orders()
            .unwrap()
            .add(Order::new(999, order_date()))
            .unwrap();

        let err = uow.save_changes().await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
        assert!(uow.has_changes());

        let mut fresh = fresh;
        assert_eq!(fresh.clients().unwrap().count().await.unwrap(), 0);
        assert_eq!(fresh.orders().unwrap().count().await.unwrap(), 0);

        uow.discard_changes();
        assert!(!uow.has_changes());
        assert_eq!(uow.save_changes().await.unwrap(), 0);
    }

    async fn unknown_identity_rolls_back<S: Session>(mut uow: UnitOfWork<S>) {
        uow.products()
            .unwrap()
            .add(Product::new("Pen", None, Money::from_cents(150)))
            .unwrap();
        uow.clients()
            .unwrap()
            .update(Client::new("Ghost", "ghost@example.com").with_id(41))
            .unwrap();

        let err = uow.save_changes().await.unwrap_err();
        assert!(matches!(
            err,
            DbError::UnknownEntity {
                entity: EntityKind::Client,
                id: 41
            }
        ));
        assert!(err.is_invalid_operation());
        assert_eq!(uow.products().unwrap().count().await.unwrap(), 0);

        uow.discard_changes();
        uow.clients().unwrap().remove_by_id(41).unwrap();
        assert!(matches!(
            uow.save_changes().await,
            Err(DbError::UnknownEntity { id: 41, .. })
        ));
    }

    async fn find_between<S: Session>(mut uow: UnitOfWork<S>) {
        {
            let mut products = uow.products().unwrap();
            products.add(Product::new("A", None, Money::from_major(5))).unwrap();
            products.add(Product::new("B", None, Money::from_major(25))).unwrap();
            products.add(Product::new("C", None, Money::from_major(60))).unwrap();
        }
        uow.save_changes().await.unwrap();

        let found = uow
            .products()
            .unwrap()
            .find(&Predicate::between(
                ProductField::Price,
                Money::from_major(10),
                Money::from_major(50),
            ))
            .await
            .unwrap();

        assert_eq!(found, vec![Product::new("B", None, Money::from_major(25)).with_id(2)]);
    }

    async fn deletes_follow_registration_order<S: Session>(mut uow: UnitOfWork<S>) {
        let client = uow
            .clients()
            .unwrap()
            .add(Client::new("Ana", "ana@example.com"))
            .unwrap();
        let product = uow
            .products()
            .unwrap()
            .add(Product::new("Pen", None, Money::from_cents(150)))
            .unwrap();
        uow.save_changes().await.unwrap();

        let client_id = uow.assigned_id(client).unwrap();
        let product_id = uow.assigned_id(product).unwrap();
        let order = uow
            .orders()
            .unwrap()
            .add(Order::new(client_id, order_date()))
            .unwrap();
        uow.save_changes().await.unwrap();

        let order_id = uow.assigned_id(order).unwrap();
        let detail = uow
            .order_details()
            .unwrap()
            .add(OrderDetail::new(order_id, product_id, 2))
            .unwrap();
        uow.save_changes().await.unwrap();
        let detail_id = uow.assigned_id(detail).unwrap();

        // parent first: rejected
        uow.orders().unwrap().remove_by_id(order_id).unwrap();
        uow.order_details().unwrap().remove_by_id(detail_id).unwrap();
        assert!(matches!(
            uow.save_changes().await,
            Err(DbError::ForeignKeyViolation { .. })
        ));
        uow.discard_changes();

        // child first: accepted
        uow.order_details().unwrap().remove_by_id(detail_id).unwrap();
        uow.orders().unwrap().remove_by_id(order_id).unwrap();
        assert_eq!(uow.save_changes().await.unwrap(), 2);
        assert_eq!(uow.orders().unwrap().count().await.unwrap(), 0);
    }

    async fn mismatched_types_never_match<S: Session>(mut uow: UnitOfWork<S>) {
        uow.clients()
            .unwrap()
            .add(Client::new("7", "seven@example.com"))
            .unwrap();
        uow.products()
            .unwrap()
            .add(Product::new("Pen", Some("5 pack".to_string()), Money::from_cents(150)))
            .unwrap();
        uow.save_changes().await.unwrap();

        for (predicate, expected) in [
            (Predicate::eq(ClientField::Name, 7_i64), 0),
            (Predicate::one_of(ClientField::Name, [7_i64]), 0),
            (Predicate::eq(ClientField::Name, 7_i64).not(), 1),
            (Predicate::eq(ClientField::Name, "7"), 1),
        ] {
            let found = uow.clients().unwrap().find(&predicate).await.unwrap();
            assert_eq!(found.len(), expected, "{predicate:?}");
        }

        for (predicate, expected) in [
            (Predicate::lt(ProductField::Price, "abc"), 0),
            (Predicate::between(ProductField::Price, 1_i64, "z"), 0),
            (Predicate::contains(ProductField::Price, "5"), 0),
            (Predicate::gt(ProductField::Description, 0_i64), 0),
            (Predicate::lt(ProductField::Price, "abc").not(), 1),
            (
                Predicate::In(ProductField::Id, vec![Value::from("1"), Value::from(1_i64)]),
                1,
            ),
        ] {
            let found = uow.products().unwrap().find(&predicate).await.unwrap();
            assert_eq!(found.len(), expected, "{predicate:?}");
        }
    }

    // =========================================================================
    // In-memory store
    // =========================================================================

    #[tokio::test]
    async fn test_memory_mismatched_types_never_match() {
        mismatched_types_never_match(MemoryStore::new().unit_of_work()).await;
    }

    #[tokio::test]
    async fn test_memory_add_then_get() {
        add_then_get(MemoryStore::new().unit_of_work()).await;
    }

    #[tokio::test]
    async fn test_memory_update_all_fields() {
        update_all_fields(MemoryStore::new().unit_of_work()).await;
    }

    #[tokio::test]
    async fn test_memory_dispose_twice() {
        dispose_twice(MemoryStore::new().unit_of_work()).await;
    }

    #[tokio::test]
    async fn test_memory_violation_applies_nothing() {
        let store = MemoryStore::new();
        violation_applies_nothing(store.unit_of_work(), store.unit_of_work()).await;
    }

    #[tokio::test]
    async fn test_memory_unknown_identity_rolls_back() {
        unknown_identity_rolls_back(MemoryStore::new().unit_of_work()).await;
    }

    #[tokio::test]
    async fn test_memory_find_between() {
        find_between(MemoryStore::new().unit_of_work()).await;
    }

    #[tokio::test]
    async fn test_memory_deletes_follow_registration_order() {
        deletes_follow_registration_order(MemoryStore::new().unit_of_work()).await;
    }

    #[tokio::test]
    async fn test_memory_failed_flush_keeps_staged_changes() {
        let store = MemoryStore::new();
        let mut uow = store.unit_of_work();

        let key = uow
            .clients()
            .unwrap()
            .add(Client::new("Ana", "ana@example.com"))
            .unwrap();

        store.fail_next_flush();
        assert!(matches!(
            uow.save_changes().await,
            Err(DbError::TransactionFailed(_))
        ));
        assert!(uow.has_changes());
        assert_eq!(uow.assigned_id(key), None);

        // retry commits the same batch
        assert_eq!(uow.save_changes().await.unwrap(), 1);
        assert_eq!(uow.assigned_id(key), Some(1));
    }

    #[tokio::test]
    async fn test_memory_drop_discards_staged_changes() {
        let store = MemoryStore::new();

        {
            let mut uow = store.unit_of_work();
            uow.clients()
                .unwrap()
                .add(Client::new("Ana", "ana@example.com"))
                .unwrap();
        }

        let mut uow = store.unit_of_work();
        assert_eq!(uow.clients().unwrap().count().await.unwrap(), 0);
    }

    // =========================================================================
    // SQLite
    // =========================================================================

    #[tokio::test]
    async fn test_sqlite_add_then_get() {
        add_then_get(sqlite().await.unit_of_work()).await;
    }

    #[tokio::test]
    async fn test_sqlite_update_all_fields() {
        update_all_fields(sqlite().await.unit_of_work()).await;
    }

    #[tokio::test]
    async fn test_sqlite_dispose_twice() {
        dispose_twice(sqlite().await.unit_of_work()).await;
    }

    #[tokio::test]
    async fn test_sqlite_violation_applies_nothing() {
        let db = sqlite().await;
        violation_applies_nothing(db.unit_of_work(), db.unit_of_work()).await;
    }

    #[tokio::test]
    async fn test_sqlite_unknown_identity_rolls_back() {
        unknown_identity_rolls_back(sqlite().await.unit_of_work()).await;
    }

    #[tokio::test]
    async fn test_sqlite_find_between() {
        find_between(sqlite().await.unit_of_work()).await;
    }

    #[tokio::test]
    async fn test_sqlite_deletes_follow_registration_order() {
        deletes_follow_registration_order(sqlite().await.unit_of_work()).await;
    }

    #[tokio::test]
    async fn test_sqlite_mismatched_types_never_match() {
        mismatched_types_never_match(sqlite().await.unit_of_work()).await;
    }

    #[tokio::test]
    async fn test_sqlite_cancelled_flush_applies_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::new(dir.path().join("orderdesk.db")).max_connections(2);
        let db = Database::new(config).await.unwrap();

        // Another writer holds the write lock, so the flush stalls inside its transaction
        let mut writer = db.pool().acquire().await.unwrap();
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *writer).await.unwrap();

        let mut uow = db.unit_of_work();
        uow.clients()
            .unwrap()
            .add(Client::new("Ana", "ana@example.com"))
            .unwrap();

        let saved = tokio::time::timeout(Duration::from_millis(200), uow.save_changes()).await;
        assert!(saved.is_err());
        assert!(uow.has_changes());

        sqlx::query("ROLLBACK").execute(&mut *writer).await.unwrap();
        drop(writer);

        let mut fresh = db.unit_of_work();
        assert_eq!(fresh.clients().unwrap().count().await.unwrap(), 0);

        assert_eq!(uow.save_changes().await.unwrap(), 1);
        assert_eq!(fresh.clients().unwrap().count().await.unwrap(), 1);
    }
}
