//! # Domain Types
//!
//! The four entities of the OrderDesk schema.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐        ┌─────────────────┐                        │
//! │  │     Client      │ 1    * │      Order      │                        │
//! │  │  ─────────────  │◄───────│  ─────────────  │                        │
//! │  │  id             │        │  id             │                        │
//! │  │  name           │        │  client_id (FK) │                        │
//! │  │  email          │        │  order_date     │                        │
//! │  └─────────────────┘        └────────┬────────┘                        │
//! │                                      │ 1                                │
//! │                                      │                                  │
//! │                                      │ *                                │
//! │  ┌─────────────────┐        ┌────────▼────────┐                        │
//! │  │    Product      │ 1    * │   OrderDetail   │                        │
//! │  │  ─────────────  │◄───────│  ─────────────  │                        │
//! │  │  id             │        │  id             │                        │
//! │  │  name           │        │  order_id (FK)  │                        │
//! │  │  description?   │        │  product_id (FK)│                        │
//! │  │  price (Money)  │        │  quantity       │                        │
//! │  └─────────────────┘        └─────────────────┘                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! `id` is assigned by the store when the entity is first flushed. Until
//! then it is [`crate::UNASSIGNED_ID`]. Constructors always start there.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, EntityKind, Field, Reference, Value, ValueType};
use crate::money::Money;
use crate::validation::{
    validate_email, validate_name, validate_price, validate_quantity, validate_reference,
    ValidationResult,
};
use crate::UNASSIGNED_ID;

// =============================================================================
// Client
// =============================================================================

/// A customer who places orders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Client {
    /// Store-assigned identity.
    pub id: EntityId,

    /// Display name.
    pub name: String,

    /// Contact email. Unique by convention only.
    pub email: String,
}

impl Client {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: UNASSIGNED_ID,
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Attributes of [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientField {
    Id,
    Name,
    Email,
}

impl Field for ClientField {
    const ALL: &'static [Self] = &[ClientField::Id, ClientField::Name, ClientField::Email];
    const IDENTITY: Self = ClientField::Id;

    fn name(self) -> &'static str {
        match self {
            ClientField::Id => "id",
            ClientField::Name => "name",
            ClientField::Email => "email",
        }
    }

    fn value_type(self) -> ValueType {
        match self {
            ClientField::Id => ValueType::Integer,
            ClientField::Name | ClientField::Email => ValueType::Text,
        }
    }
}

impl Entity for Client {
    type Field = ClientField;
    const KIND: EntityKind = EntityKind::Client;

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn get(&self, field: ClientField) -> Value {
        match field {
            ClientField::Id => self.id.into(),
            ClientField::Name => self.name.clone().into(),
            ClientField::Email => self.email.clone().into(),
        }
    }

    fn validate(&self) -> ValidationResult<()> {
        validate_name("name", &self.name)?;
        validate_email(&self.email)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product that can appear on order lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Store-assigned identity.
    pub id: EntityId,

    /// Display name.
    pub name: String,

    /// Optional long description.
    pub description: Option<String>,

    /// Unit price, never negative.
    pub price: Money,
}

impl Product {
    pub fn new(name: impl Into<String>, description: Option<String>, price: Money) -> Self {
        Self {
            id: UNASSIGNED_ID,
            name: name.into(),
            description,
            price,
        }
    }

    /// Whether the product carries a non-empty description.
    pub fn has_description(&self) -> bool {
        self.description.as_deref().is_some_and(|d| !d.is_empty())
    }
}

/// Attributes of [`Product`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductField {
    Id,
    Name,
    Description,
    Price,
}

impl Field for ProductField {
    const ALL: &'static [Self] = &[
        ProductField::Id,
        ProductField::Name,
        ProductField::Description,
        ProductField::Price,
    ];
    const IDENTITY: Self = ProductField::Id;

    fn name(self) -> &'static str {
        match self {
            ProductField::Id => "id",
            ProductField::Name => "name",
            ProductField::Description => "description",
            ProductField::Price => "price",
        }
    }

    fn value_type(self) -> ValueType {
        match self {
            ProductField::Id | ProductField::Price => ValueType::Integer,
            ProductField::Name | ProductField::Description => ValueType::Text,
        }
    }
}

impl Entity for Product {
    type Field = ProductField;
    const KIND: EntityKind = EntityKind::Product;

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn get(&self, field: ProductField) -> Value {
        match field {
            ProductField::Id => self.id.into(),
            ProductField::Name => self.name.clone().into(),
            ProductField::Description => self.description.clone().into(),
            ProductField::Price => self.price.into(),
        }
    }

    fn validate(&self) -> ValidationResult<()> {
        validate_name("name", &self.name)?;
        validate_price(self.price)
    }
}

// =============================================================================
// Order
// =============================================================================

/// An order placed by a client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    /// Store-assigned identity.
    pub id: EntityId,

    /// The client who placed the order.
    pub client_id: EntityId,

    /// When the order was placed (UTC).
    pub order_date: DateTime<Utc>,
}

impl Order {
    pub fn new(client_id: EntityId, order_date: DateTime<Utc>) -> Self {
        Self {
            id: UNASSIGNED_ID,
            client_id,
            order_date,
        }
    }
}

/// Attributes of [`Order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderField {
    Id,
    ClientId,
    OrderDate,
}

impl Field for OrderField {
    const ALL: &'static [Self] = &[OrderField::Id, OrderField::ClientId, OrderField::OrderDate];
    const IDENTITY: Self = OrderField::Id;

    fn name(self) -> &'static str {
        match self {
            OrderField::Id => "id",
            OrderField::ClientId => "client_id",
            OrderField::OrderDate => "order_date",
        }
    }

    fn value_type(self) -> ValueType {
        match self {
            OrderField::Id | OrderField::ClientId => ValueType::Integer,
            OrderField::OrderDate => ValueType::Timestamp,
        }
    }
}

impl Entity for Order {
    type Field = OrderField;
    const KIND: EntityKind = EntityKind::Order;

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn get(&self, field: OrderField) -> Value {
        match field {
            OrderField::Id => self.id.into(),
            OrderField::ClientId => self.client_id.into(),
            OrderField::OrderDate => self.order_date.into(),
        }
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference {
            field: "client_id",
            kind: EntityKind::Client,
            id: self.client_id,
        }]
    }

    fn validate(&self) -> ValidationResult<()> {
        validate_reference("client_id", self.client_id)
    }
}

// =============================================================================
// Order Detail
// =============================================================================

/// One product line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderDetail {
    /// Store-assigned identity.
    pub id: EntityId,

    pub order_id: EntityId,

    pub product_id: EntityId,

    /// Units ordered (1..=999).
    pub quantity: i32,
}

impl OrderDetail {
    pub fn new(order_id: EntityId, product_id: EntityId, quantity: i32) -> Self {
        Self {
            id: UNASSIGNED_ID,
            order_id,
            product_id,
            quantity,
        }
    }
}

/// Attributes of [`OrderDetail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderDetailField {
    Id,
    OrderId,
    ProductId,
    Quantity,
}

impl Field for OrderDetailField {
    const ALL: &'static [Self] = &[
        OrderDetailField::Id,
        OrderDetailField::OrderId,
        OrderDetailField::ProductId,
        OrderDetailField::Quantity,
    ];
    const IDENTITY: Self = OrderDetailField::Id;

    fn name(self) -> &'static str {
        match self {
            OrderDetailField::Id => "id",
            OrderDetailField::OrderId => "order_id",
            OrderDetailField::ProductId => "product_id",
            OrderDetailField::Quantity => "quantity",
        }
    }

    fn value_type(self) -> ValueType {
        ValueType::Integer
    }
}

impl Entity for OrderDetail {
    type Field = OrderDetailField;
    const KIND: EntityKind = EntityKind::OrderDetail;

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn get(&self, field: OrderDetailField) -> Value {
        match field {
            OrderDetailField::Id => self.id.into(),
            OrderDetailField::OrderId => self.order_id.into(),
            OrderDetailField::ProductId => self.product_id.into(),
            OrderDetailField::Quantity => self.quantity.into(),
        }
    }

    fn references(&self) -> Vec<Reference> {
        vec![
            Reference {
                field: "order_id",
                kind: EntityKind::Order,
                id: self.order_id,
            },
            Reference {
                field: "product_id",
                kind: EntityKind::Product,
                id: self.product_id,
            },
        ]
    }

    fn validate(&self) -> ValidationResult<()> {
        validate_reference("order_id", self.order_id)?;
        validate_reference("product_id", self.product_id)?;
        validate_quantity(self.quantity as i64)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use chrono::TimeZone;

    #[test]
    fn test_constructors_start_unassigned() {
        assert_eq!(Client::new("Ana", "ana@example.com").id, UNASSIGNED_ID);
        assert_eq!(Product::new("Pen", None, Money::from_cents(150)).id, UNASSIGNED_ID);
    }

    #[test]
    fn test_product_validation() {
        let ok = Product::new("Pen", None, Money::from_cents(150));
        assert!(ok.validate().is_ok());

        let negative = Product::new("Pen", None, Money::from_cents(-1));
        assert!(negative.validate().is_err());

        let unnamed = Product::new(" ", None, Money::zero());
        assert_eq!(
            unnamed.validate(),
            Err(ValidationError::Required {
                field: "name".to_string()
            })
        );
    }

    #[test]
    fn test_has_description() {
        let mut product = Product::new("Pen", Some(String::new()), Money::zero());
        assert!(!product.has_description());

        product.description = Some("Blue ink".to_string());
        assert!(product.has_description());
    }

    #[test]
    fn test_order_detail_references_and_quantity() {
        let detail = OrderDetail::new(4, 9, 2);
        let refs = detail.references();

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].kind, EntityKind::Order);
        assert_eq!(refs[1].id, 9);

        assert!(OrderDetail::new(4, 9, 0).validate().is_err());
        assert!(OrderDetail::new(0, 9, 1).validate().is_err());
    }

    #[test]
    fn test_order_get_timestamp() {
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let order = Order::new(1, date);

        assert_eq!(order.get(OrderField::OrderDate), Value::Timestamp(date));
        assert_eq!(order.get(OrderField::ClientId), Value::Integer(1));
    }

    #[test]
    fn test_serde_shape() {
        let product = Product::new("Pen", None, Money::from_cents(150)).with_id(3);
        let json = serde_json::to_value(&product).unwrap();

        assert_eq!(json["id"], 3);
        assert_eq!(json["price"], 150);
        assert!(json["description"].is_null());
    }
}
