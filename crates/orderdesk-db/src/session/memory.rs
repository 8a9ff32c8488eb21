//! # In-Memory Session
//!
//! A process-local store with the same observable semantics as the SQLite
//! session. Used as the fake backing store in tests and for callers that
//! need a throwaway database.
//!
//! ## Flush Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lock(tables)                                                           │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  working = tables.clone()          copy-on-write                        │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  for change in set (registration order):                               │
//! │     insert → next id, references must resolve                           │
//! │     update → id must exist, references must resolve                     │
//! │     delete → id must exist, no row may still reference it              │
//! │     │                                                                   │
//! │     ├── any failure → return Err, `working` dropped, tables untouched   │
//! │     ▼                                                                   │
//! │  *tables = working                 swap; no await since the lock       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Referential checks run per change, like SQLite's immediate foreign keys,
//! so a batch that deletes a parent before its children fails in both
//! sessions.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use orderdesk_core::{EntityId, EntityKind, Predicate, Reference};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::session::{Change, ChangeOp, ChangeSet, FlushReport, Record, Session};
use crate::unit_of_work::UnitOfWork;

// =============================================================================
// Tables
// =============================================================================

#[derive(Debug, Clone)]
struct StoredRow {
    payload: serde_json::Value,
    references: Vec<Reference>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    rows: HashMap<EntityKind, BTreeMap<EntityId, StoredRow>>,
}

impl Tables {
    fn table(&self, kind: EntityKind) -> Option<&BTreeMap<EntityId, StoredRow>> {
        self.rows.get(&kind)
    }

    fn contains(&self, kind: EntityKind, id: EntityId) -> bool {
        self.table(kind).is_some_and(|t| t.contains_key(&id))
    }

    /// Next rowid: one past the largest live id, as SQLite allocates it.
    fn next_id(&self, kind: EntityKind) -> EntityId {
        self.table(kind)
            .and_then(|t| t.keys().next_back().copied())
            .unwrap_or(0)
            + 1
    }

    fn check_references(&self, change: &Change) -> DbResult<()> {
        match change
            .references
            .iter()
            .find(|r| !self.contains(r.kind, r.id))
        {
            Some(missing) => Err(DbError::ForeignKeyViolation {
                message: format!(
                    "{}.{} references missing {} {}",
                    change.kind.table(),
                    missing.field,
                    missing.kind,
                    missing.id
                ),
            }),
            None => Ok(()),
        }
    }

    fn check_unreferenced(&self, kind: EntityKind, id: EntityId) -> DbResult<()> {
        let referrer = self.rows.iter().find_map(|(referrer_kind, table)| {
            table
                .values()
                .flat_map(|row| row.references.iter())
                .find(|r| r.kind == kind && r.id == id)
                .map(|r| (*referrer_kind, r.field))
        });

        match referrer {
            Some((referrer_kind, field)) => Err(DbError::ForeignKeyViolation {
                message: format!(
                    "{} {} is still referenced by {}.{}",
                    kind,
                    id,
                    referrer_kind.table(),
                    field
                ),
            }),
            None => Ok(()),
        }
    }

    fn apply(&mut self, change: &Change, report: &mut FlushReport) -> DbResult<()> {
        match change.op {
            ChangeOp::Insert => {
                self.check_references(change)?;

                let id = self.next_id(change.kind);
                self.rows
                    .entry(change.kind)
                    .or_default()
                    .insert(id, stored(change, id));
                report.inserted.push((change.key, id));
            }
            ChangeOp::Update => {
                if !self.contains(change.kind, change.id) {
                    return Err(DbError::unknown_entity(change.kind, change.id));
                }
                self.check_references(change)?;

                self.rows
                    .entry(change.kind)
                    .or_default()
                    .insert(change.id, stored(change, change.id));
            }
            ChangeOp::Delete => {
                if !self.contains(change.kind, change.id) {
                    return Err(DbError::unknown_entity(change.kind, change.id));
                }
                self.check_unreferenced(change.kind, change.id)?;

                if let Some(table) = self.rows.get_mut(&change.kind) {
                    table.remove(&change.id);
                }
            }
        }

        report.affected += 1;
        Ok(())
    }

    fn decode<T: Record>(&self) -> DbResult<Vec<T>> {
        self.table(T::KIND)
            .into_iter()
            .flat_map(|t| t.values())
            .map(|row| serde_json::from_value(row.payload.clone()).map_err(DbError::from))
            .collect()
    }
}

/// Row snapshot of a written change, with its identity filled in.
fn stored(change: &Change, id: EntityId) -> StoredRow {
    let mut payload = change.payload.clone();
    if let Some(object) = payload.as_object_mut() {
        object.insert("id".to_string(), serde_json::Value::from(id));
    }

    StoredRow {
        payload,
        references: change.references.clone(),
    }
}

// =============================================================================
// Memory Store
// =============================================================================

/// Shared in-memory tables. Cloning shares the same data.
///
/// ## Usage
/// ```rust,ignore
/// let store = MemoryStore::new();
/// let mut uow = store.unit_of_work();
/// uow.clients()?.add(Client::new("Ana", "ana@example.com"))?;
/// uow.save_changes().await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_next_flush: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a session over this store.
    pub fn session(&self) -> MemorySession {
        MemorySession {
            store: self.clone(),
            closed: AtomicBool::new(false),
        }
    }

    /// Opens a unit of work over this store.
    pub fn unit_of_work(&self) -> UnitOfWork<MemorySession> {
        UnitOfWork::new(self.session())
    }

    /// Makes the next flush fail after applying its changes to the working
    /// copy, before they become visible. Test hook for atomicity.
    pub fn fail_next_flush(&self) {
        self.fail_next_flush.store(true, Ordering::SeqCst);
    }
}

// =============================================================================
// Memory Session
// =============================================================================

#[derive(Debug)]
pub struct MemorySession {
    store: MemoryStore,
    closed: AtomicBool,
}

impl MemorySession {
    fn ensure_open(&self) -> DbResult<()> {
        if self.is_closed() {
            return Err(DbError::SessionClosed);
        }
        Ok(())
    }
}

impl Session for MemorySession {
    async fn fetch_all<T: Record>(&self) -> DbResult<Vec<T>> {
        self.ensure_open()?;

        let tables = self.store.tables.lock().await;
        tables.decode()
    }

    async fn fetch_by_id<T: Record>(&self, id: EntityId) -> DbResult<Option<T>> {
        self.ensure_open()?;

        let tables = self.store.tables.lock().await;
        tables
            .table(T::KIND)
            .and_then(|t| t.get(&id))
            .map(|row| serde_json::from_value(row.payload.clone()))
            .transpose()
            .map_err(DbError::from)
    }

    async fn fetch_where<T: Record>(&self, predicate: &Predicate<T::Field>) -> DbResult<Vec<T>> {
        let rows: Vec<T> = self.fetch_all().await?;
        Ok(rows.into_iter().filter(|row| predicate.matches(row)).collect())
    }

    async fn count<T: Record>(&self) -> DbResult<u64> {
        self.ensure_open()?;

        let tables = self.store.tables.lock().await;
        Ok(tables.table(T::KIND).map_or(0, |t| t.len() as u64))
    }

    async fn flush(&self, changes: &ChangeSet) -> DbResult<FlushReport> {
        self.ensure_open()?;

        let mut tables = self.store.tables.lock().await;
        let mut working = tables.clone();
        let mut report = FlushReport::default();

        for change in changes.iter() {
            working.apply(change, &mut report)?;
        }

        if self.store.fail_next_flush.swap(false, Ordering::SeqCst) {
            warn!(changes = changes.len(), "Injected flush failure");
            return Err(DbError::TransactionFailed(
                "injected flush failure".to_string(),
            ));
        }

        *tables = working;

        debug!(
            changes = changes.len(),
            affected = report.affected,
            "Flushed change set"
        );
        Ok(report)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Memory session closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
