//! # SQLite Session
//!
//! Session over a shared `SqlitePool`.
//!
//! ## Connection Use
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  read  ──► pool.acquire ──► SELECT ... ──► connection back to pool      │
//! │                                                                         │
//! │  flush ──► pool.begin ─┬─► INSERT / UPDATE / DELETE (registration order)│
//! │                        │     update/delete with 0 rows → UnknownEntity  │
//! │                        │     constraint error        → mapped DbError   │
//! │                        │                                                │
//! │                        ├─► all ok  → COMMIT                             │
//! │                        └─► any err → transaction dropped → ROLLBACK     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No connection is held between calls, so a single-connection pool (the
//! in-memory configuration) serves any number of sequential units of work.

use std::sync::atomic::{AtomicBool, Ordering};

use orderdesk_core::{EntityId, Predicate};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::session::{sql, ChangeOp, ChangeSet, FlushReport, Record, Session};

/// Session borrowing connections from a SQLite pool.
#[derive(Debug)]
pub struct SqliteSession {
    pool: SqlitePool,
    closed: AtomicBool,
}

impl SqliteSession {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteSession {
            pool,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> DbResult<()> {
        if self.is_closed() {
            return Err(DbError::SessionClosed);
        }
        Ok(())
    }
}

impl Session for SqliteSession {
    async fn fetch_all<T: Record>(&self) -> DbResult<Vec<T>> {
        self.ensure_open()?;

        let query = format!("{} ORDER BY id", sql::select::<T>());
        let rows = sqlx::query_as::<_, T>(&query)
            .fetch_all(&self.pool)
            .await?;

        debug!(entity = %T::KIND, count = rows.len(), "Fetched all");
        Ok(rows)
    }

    async fn fetch_by_id<T: Record>(&self, id: EntityId) -> DbResult<Option<T>> {
        self.ensure_open()?;

        let query = format!("{} WHERE id = ?", sql::select::<T>());
        let row = sqlx::query_as::<_, T>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn fetch_where<T: Record>(&self, predicate: &Predicate<T::Field>) -> DbResult<Vec<T>> {
        self.ensure_open()?;

        let mut qb = QueryBuilder::<Sqlite>::new(sql::select::<T>());
        qb.push(" WHERE ");
        sql::push_predicate(&mut qb, predicate);
        qb.push(" ORDER BY id");

        let rows = qb.build_query_as::<T>().fetch_all(&self.pool).await?;

        debug!(entity = %T::KIND, count = rows.len(), "Fetched matching rows");
        Ok(rows)
    }

    async fn count<T: Record>(&self) -> DbResult<u64> {
        self.ensure_open()?;

        let query = format!("SELECT COUNT(*) FROM {}", T::KIND.table());
        let count: i64 = sqlx::query_scalar(&query).fetch_one(&self.pool).await?;

        Ok(count as u64)
    }

    async fn flush(&self, changes: &ChangeSet) -> DbResult<FlushReport> {
        self.ensure_open()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let mut report = FlushReport::default();

        for change in changes.iter() {
            match change.op {
                ChangeOp::Insert => {
                    let mut qb = sql::insert(change);
                    let result = qb.build().execute(&mut *tx).await?;

                    report.inserted.push((change.key, result.last_insert_rowid()));
                    report.affected += result.rows_affected();
                }
                ChangeOp::Update | ChangeOp::Delete => {
                    let mut qb = if change.op == ChangeOp::Update {
                        sql::update(change)
                    } else {
                        sql::delete(change)
                    };
                    let result = qb.build().execute(&mut *tx).await?;

                    // Dropping `tx` on this early return rolls the batch back
                    if result.rows_affected() == 0 {
                        return Err(DbError::unknown_entity(change.kind, change.id));
                    }
                    report.affected += result.rows_affected();
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(
            changes = changes.len(),
            affected = report.affected,
            "Flushed change set"
        );
        Ok(report)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("SQLite session closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::session::{Change, PendingKey};
    use orderdesk_core::{Client, Entity, EntityKind, Money, Product, ProductField};

    async fn session() -> (Database, SqliteSession) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let session = SqliteSession::new(db.pool().clone());
        (db, session)
    }

    fn insert<T: Record>(key: u64, entity: &T) -> Change {
        Change::write(PendingKey::new(key), ChangeOp::Insert, entity).unwrap()
    }

    #[tokio::test]
    async fn test_flush_assigns_ids_in_order() {
        let (_db, session) = session().await;

        let set = ChangeSet::new(vec![
            insert(1, &Client::new("Ana", "ana@example.com")),
            insert(2, &Client::new("Bruno", "bruno@example.com")),
        ]);
        let report = session.flush(&set).await.unwrap();

        assert_eq!(report.affected, 2);
        assert_eq!(
            report.inserted,
            vec![(PendingKey::new(1), 1), (PendingKey::new(2), 2)]
        );

        let clients: Vec<Client> = session.fetch_all().await.unwrap();
        assert_eq!(clients[1].name, "Bruno");
        assert_eq!(session.count::<Client>().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unknown_update_rolls_back_batch() {
        let (_db, session) = session().await;

        let ghost = Client::new("Ghost", "ghost@example.com").with_id(99);
        let set = ChangeSet::new(vec![
            insert(1, &Client::new("Ana", "ana@example.com")),
            Change::write(PendingKey::new(2), ChangeOp::Update, &ghost).unwrap(),
        ]);

        let err = session.flush(&set).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::UnknownEntity {
                entity: EntityKind::Client,
                id: 99
            }
        ));
        assert_eq!(session.count::<Client>().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fetch_where_translates_predicate() {
        let (_db, session) = session().await;

        let set = ChangeSet::new(vec![
            insert(1, &Product::new("A", None, Money::from_major(5))),
            insert(2, &Product::new("B", Some("Blue pen".into()), Money::from_major(25))),
            insert(3, &Product::new("C", Some(String::new()), Money::from_major(60))),
        ]);
        session.flush(&set).await.unwrap();

        let found: Vec<Product> = session
            .fetch_where(&Predicate::between(
                ProductField::Price,
                Money::from_major(10),
                Money::from_major(50),
            ))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "B");

        let blank: Vec<Product> = session
            .fetch_where(&Predicate::is_empty(ProductField::Description))
            .await
            .unwrap();
        assert_eq!(blank.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 3]);

        let upper: Vec<Product> = session
            .fetch_where(&Predicate::contains(ProductField::Description, "PEN"))
            .await
            .unwrap();
        assert!(upper.is_empty());
    }

    #[tokio::test]
    async fn test_closed_session_refuses_work() {
        let (_db, session) = session().await;

        session.close();
        session.close();

        assert!(session.is_closed());
        assert!(matches!(
            session.fetch_by_id::<Client>(1).await,
            Err(DbError::SessionClosed)
        ));
    }
}
