//! # Entity Metadata
//!
//! The shape-independent view of a persisted record that lets one repository
//! implementation serve every entity type.
//!
//! ## What a Repository Needs to Know
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Entity trait (per record type)                      │
//! │                                                                         │
//! │  KIND        → which table / in-memory collection                       │
//! │  Field       → typed attribute names (ClientField::Name, ...)           │
//! │  get(field)  → Value (Null | Integer | Text | Timestamp)                │
//! │  value_type  → the one non-null Value type a field holds               │
//! │  id/set_id   → store-assigned identity                                  │
//! │  references  → (kind, id) pairs the store must be able to resolve       │
//! │  validate    → field rules checked before staging                       │
//! │                                                                         │
//! │  Predicates are typed by `Field`, so a filter on an attribute the       │
//! │  entity does not have cannot be written.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;

use crate::money::Money;
use crate::validation::ValidationResult;
use crate::UNASSIGNED_ID;

/// Store-assigned entity identity.
pub type EntityId = i64;

// =============================================================================
// Entity Kind
// =============================================================================

/// Tag naming each entity type of the schema.
///
/// Used as the key of the unit of work's repository cache and to route
/// type-erased changes to the right table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Client,
    Product,
    Order,
    OrderDetail,
}

impl EntityKind {
    /// Human-readable entity name used in errors and logs.
    pub const fn name(self) -> &'static str {
        match self {
            EntityKind::Client => "Client",
            EntityKind::Product => "Product",
            EntityKind::Order => "Order",
            EntityKind::OrderDetail => "OrderDetail",
        }
    }

    /// Backing table name.
    pub const fn table(self) -> &'static str {
        match self {
            EntityKind::Client => "clients",
            EntityKind::Product => "products",
            EntityKind::Order => "orders",
            EntityKind::OrderDetail => "order_details",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Value
// =============================================================================

/// A dynamically typed attribute value.
///
/// ## Type Mapping
/// | Rust field             | Value       | SQLite column |
/// |------------------------|-------------|---------------|
/// | `EntityId`, `i32`      | `Integer`   | INTEGER       |
/// | `Money`                | `Integer`   | INTEGER cents |
/// | `String`               | `Text`      | TEXT          |
/// | `Option<String>`       | `Text`/`Null` | TEXT NULL   |
/// | `DateTime<Utc>`        | `Timestamp` | TEXT (RFC 3339) |
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

/// The non-null type of a [`Value`]; every field declares exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Integer,
    Text,
    Timestamp,
}

impl Value {
    /// Orders two values of the same type.
    ///
    /// Returns `None` when either side is null or the types differ; every
    /// predicate treats that as "does not match".
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The value's type, or `None` for null.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Integer(_) => Some(ValueType::Integer),
            Value::Text(_) => Some(ValueType::Text),
            Value::Timestamp(_) => Some(ValueType::Timestamp),
        }
    }

    /// Whether this value can be compared with a field of type `ty`.
    ///
    /// Null fits every field; it simply never compares equal or ordered.
    pub fn fits(&self, ty: ValueType) -> bool {
        self.value_type().map_or(true, |own| own == ty)
    }

    /// Borrows the text payload, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<Money> for Value {
    fn from(v: Money) -> Self {
        Value::Integer(v.cents())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// =============================================================================
// Field + Entity Traits
// =============================================================================

/// Typed attribute name of one entity type.
pub trait Field: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Every attribute, identity included, in column order.
    const ALL: &'static [Self];

    /// The identity attribute.
    const IDENTITY: Self;

    /// Column / attribute name.
    fn name(self) -> &'static str;

    /// Type of every non-null value this attribute holds.
    fn value_type(self) -> ValueType;
}

/// A reference held by one entity to another (a foreign key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reference {
    pub field: &'static str,
    pub kind: EntityKind,
    pub id: EntityId,
}

/// A persisted record with a store-assigned identity.
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
    /// The entity's typed attribute names.
    type Field: Field;

    /// Tag for this entity type.
    const KIND: EntityKind;

    /// Store-assigned identity, or [`UNASSIGNED_ID`] before the first flush.
    fn id(&self) -> EntityId;

    /// Sets the identity. Only sessions call this, after a flush.
    fn set_id(&mut self, id: EntityId);

    /// Reads one attribute.
    fn get(&self, field: Self::Field) -> Value;

    /// Other entities this one points at.
    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    /// Field rules; checked by repositories before a change is staged.
    fn validate(&self) -> ValidationResult<()> {
        Ok(())
    }

    /// Whether the store has assigned an identity yet.
    fn is_persisted(&self) -> bool {
        self.id() != UNASSIGNED_ID
    }

    /// Returns the entity with the given identity (fixtures and tests).
    fn with_id(mut self, id: EntityId) -> Self
    where
        Self: Sized,
    {
        self.set_id(id);
        self
    }

    /// Non-identity attributes in column order, for writing to a store.
    fn columns(&self) -> Vec<(&'static str, Value)> {
        Self::Field::ALL
            .iter()
            .copied()
            .filter(|f| *f != Self::Field::IDENTITY)
            .map(|f| (f.name(), self.get(f)))
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
