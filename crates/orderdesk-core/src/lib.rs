//! # orderdesk-core: Pure Domain Logic for OrderDesk
//!
//! This crate holds the entity model and the storage-independent query layer.
//! It has zero I/O dependencies; `orderdesk-db` builds persistence on top.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        OrderDesk Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Callers (services, controllers, CLIs)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 orderdesk-db (Unit of Work)                     │   │
//! │  │      Repository<T>, Session, SQLite + in-memory stores          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ orderdesk-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  entity   │  │ predicate │  │   query   │  │  reports  │  │   │
//! │  │   │  Entity   │  │ Predicate │  │  Query<T> │  │ LINQ-style│  │   │
//! │  │   │  Value    │  │ matches() │  │  Lookup   │  │  queries  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`entity`] - The `Entity` trait, `EntityKind`, dynamically typed `Value`
//! - [`types`] - Client, Product, Order, OrderDetail
//! - [`money`] - Money type with integer arithmetic
//! - [`predicate`] - Storage-independent filters
//! - [`query`] - Filter/join/order/group pipelines over fetched collections
//! - [`reports`] - Ready-made queries over the four entity collections
//! - [`validation`] - Field rules checked before anything is staged
//! - [`error`] - Validation error types
//!
//! ## Example Usage
//!
//! ```rust
//! use orderdesk_core::{Entity, Money, Predicate, Product, ProductField, Query};
//!
//! let products = vec![
//!     Product::new("A", None, Money::from_major(5)).with_id(1),
//!     Product::new("B", None, Money::from_major(25)).with_id(2),
//!     Product::new("C", None, Money::from_major(60)).with_id(3),
//! ];
//!
//! let in_range = Predicate::between(ProductField::Price, Money::from_major(10), Money::from_major(50));
//! let found = Query::new(products).filter(&in_range).into_vec();
//!
//! assert_eq!(found.len(), 1);
//! assert_eq!(found[0].name, "B");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod entity;
pub mod error;
pub mod money;
pub mod predicate;
pub mod query;
pub mod reports;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use entity::{Entity, EntityId, EntityKind, Field, Reference, Value, ValueType};
pub use error::ValidationError;
pub use money::Money;
pub use predicate::{Comparison, Predicate};
pub use query::{Direction, Group, Lookup, Query};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Identity carried by an entity that the store has not assigned yet.
///
/// SQLite row ids start at 1, so zero never names a stored row.
pub const UNASSIGNED_ID: EntityId = 0;

/// Maximum quantity of a single product on one order line.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum length of a client or product name.
pub const MAX_NAME_LENGTH: usize = 200;

/// Placeholder used when an order line points at a product that no longer exists.
pub const PRODUCT_NOT_FOUND: &str = "Product not found";

/// Placeholder used when an order points at a client that no longer exists.
pub const CLIENT_NOT_FOUND: &str = "Client not found";
