//! # Report Queries
//!
//! Ready-made queries over the four entity collections. Every function is
//! pure: it takes collections already fetched through a unit of work and
//! returns entities or small projection rows.
//!
//! ## Catalogue
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Filters           clients_by_name, products_priced_above,             │
//! │                    products_in_price_range, products_by_description,   │
//! │                    products_without_description, orders_of_client,    │
//! │                    orders_in_date_range, orders_after, details_of_order│
//! │                                                                         │
//! │  Projections       order_product_lines, order_lines, client_names      │
//! │                                                                         │
//! │  Ordering          products_by_price, most_expensive_product,          │
//! │                    premium_products, clients_by_order_count,           │
//! │                    products_by_quantity_sold                           │
//! │                                                                         │
//! │  Joins             clients_with_orders, products_never_ordered,        │
//! │                    products_sold_to_client,                            │
//! │                    unique_products_sold_to_client,                     │
//! │                    clients_who_bought_product                          │
//! │                                                                         │
//! │  Aggregates        order_total_quantity, client_with_most_orders,      │
//! │                    price_statistics, price_bands                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The filters are also exposed as predicates (`*_predicate`) so a caller
//! holding a repository can push them down to the store with `find`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, Value};
use crate::money::Money;
use crate::predicate::Predicate;
use crate::query::{Direction, Lookup, Query};
use crate::types::{
    Client, ClientField, Order, OrderDetail, OrderDetailField, OrderField, Product, ProductField,
};
use crate::validation::{validate_price_range, ValidationResult};
use crate::{CLIENT_NOT_FOUND, PRODUCT_NOT_FOUND};

/// Lower bound of the "medium" price band.
pub const MEDIUM_PRICE_FLOOR: Money = Money::from_major(50);

/// Lower bound of the "expensive" price band.
pub const EXPENSIVE_PRICE_FLOOR: Money = Money::from_major(100);

// =============================================================================
// Report Rows
// =============================================================================

/// A product line of one order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductLine {
    pub product_name: String,
    pub quantity: i32,
}

/// A product line with the order it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: EntityId,
    pub product_name: String,
    pub quantity: i32,
}

/// A product line sold to a client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientProductLine {
    pub product_id: EntityId,
    pub product_name: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientRef {
    pub client_id: EntityId,
    pub client_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientOrderCount {
    pub client_id: EntityId,
    pub client_name: String,
    pub order_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderQuantity {
    pub order_id: EntityId,
    pub total_quantity: i64,
}

/// Aggregates over every product price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceStatistics {
    /// Rounded half away from zero to the cent.
    pub average: Money,
    pub min: Money,
    pub max: Money,
    pub count: usize,
}

/// Product counts per price band: `< 50`, `50..100`, `>= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceBands {
    pub cheap: usize,
    pub medium: usize,
    pub expensive: usize,
}

// =============================================================================
// Predicates
// =============================================================================

pub fn name_contains_predicate(text: &str) -> Predicate<ClientField> {
    Predicate::contains(ClientField::Name, text)
}

pub fn price_above_predicate(price: Money) -> Predicate<ProductField> {
    Predicate::gt(ProductField::Price, price)
}

pub fn description_contains_predicate(text: &str) -> Predicate<ProductField> {
    Predicate::contains(ProductField::Description, text)
}

pub fn client_orders_predicate(client_id: EntityId) -> Predicate<OrderField> {
    Predicate::eq(OrderField::ClientId, client_id)
}

pub fn date_range_predicate(start: DateTime<Utc>, end: DateTime<Utc>) -> Predicate<OrderField> {
    Predicate::between(OrderField::OrderDate, start, end)
}

pub fn order_details_predicate(order_id: EntityId) -> Predicate<OrderDetailField> {
    Predicate::eq(OrderDetailField::OrderId, order_id)
}

/// Priced above `min_price` with a description present.
pub fn premium_predicate(min_price: Money) -> Predicate<ProductField> {
    Predicate::gt(ProductField::Price, min_price)
        .and(Predicate::eq(ProductField::Description, Value::Null).not())
}

// =============================================================================
// Filters
// =============================================================================

pub fn clients_by_name(clients: Vec<Client>, text: &str) -> Vec<Client> {
    Query::new(clients)
        .filter(&name_contains_predicate(text))
        .into_vec()
}

pub fn products_priced_above(products: Vec<Product>, price: Money) -> Vec<Product> {
    Query::new(products)
        .filter(&price_above_predicate(price))
        .into_vec()
}

/// Products priced within `[min, max]`.
///
/// Fails with `InvalidRange` for a negative bound or `min > max`.
pub fn products_in_price_range(
    products: Vec<Product>,
    min: Money,
    max: Money,
) -> ValidationResult<Vec<Product>> {
    validate_price_range(min, max)?;

    Ok(Query::new(products)
        .filter(&Predicate::between(ProductField::Price, min, max))
        .into_vec())
}

pub fn products_by_description(products: Vec<Product>, text: &str) -> Vec<Product> {
    Query::new(products)
        .filter(&description_contains_predicate(text))
        .into_vec()
}

/// Products whose description is missing or empty.
pub fn products_without_description(products: Vec<Product>) -> Vec<Product> {
    Query::new(products)
        .filter(&Predicate::is_empty(ProductField::Description))
        .into_vec()
}

pub fn orders_of_client(orders: Vec<Order>, client_id: EntityId) -> Vec<Order> {
    Query::new(orders)
        .filter(&client_orders_predicate(client_id))
        .into_vec()
}

/// Orders placed within `[start, end]`.
pub fn orders_in_date_range(
    orders: Vec<Order>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<Order> {
    Query::new(orders)
        .filter(&date_range_predicate(start, end))
        .into_vec()
}

/// Orders placed strictly after `date`.
pub fn orders_after(orders: Vec<Order>, date: DateTime<Utc>) -> Vec<Order> {
    Query::new(orders)
        .filter(&Predicate::gt(OrderField::OrderDate, date))
        .into_vec()
}

pub fn details_of_order(details: Vec<OrderDetail>, order_id: EntityId) -> Vec<OrderDetail> {
    Query::new(details)
        .filter(&order_details_predicate(order_id))
        .into_vec()
}

// =============================================================================
// Projections
// =============================================================================

fn product_name(products: &Lookup<'_, EntityId, Product>, id: EntityId) -> String {
    products.field_or(&id, |p| p.name.clone(), PRODUCT_NOT_FOUND.to_string())
}

fn client_name(clients: &Lookup<'_, EntityId, Client>, id: EntityId) -> String {
    clients.field_or(&id, |c| c.name.clone(), CLIENT_NOT_FOUND.to_string())
}

/// Product name and quantity of every line of one order.
pub fn order_product_lines(
    details: Vec<OrderDetail>,
    products: &[Product],
    order_id: EntityId,
) -> Vec<ProductLine> {
    let by_id = Lookup::new(products, |p| p.id);

    Query::new(details)
        .filter(&order_details_predicate(order_id))
        .map(|d| ProductLine {
            product_name: product_name(&by_id, d.product_id),
            quantity: d.quantity,
        })
        .into_vec()
}

/// Every order line with its product name.
pub fn order_lines(details: Vec<OrderDetail>, products: &[Product]) -> Vec<OrderLine> {
    let by_id = Lookup::new(products, |p| p.id);

    Query::new(details)
        .map(|d| OrderLine {
            order_id: d.order_id,
            product_name: product_name(&by_id, d.product_id),
            quantity: d.quantity,
        })
        .into_vec()
}

pub fn client_names(clients: Vec<Client>) -> Vec<String> {
    Query::new(clients).map(|c| c.name).into_vec()
}

// =============================================================================
// Ordering
// =============================================================================

pub fn products_by_price(products: Vec<Product>, direction: Direction) -> Vec<Product> {
    Query::new(products)
        .order_by(|p| p.price, direction)
        .into_vec()
}

/// The highest-priced product; the earliest one on ties.
pub fn most_expensive_product(products: Vec<Product>) -> Option<Product> {
    Query::new(products)
        .order_by(|p| p.price, Direction::Descending)
        .first()
}

/// Up to `limit` products priced above `min_price` that carry a
/// description, most expensive first.
pub fn premium_products(products: Vec<Product>, min_price: Money, limit: usize) -> Vec<Product> {
    Query::new(products)
        .filter(&premium_predicate(min_price))
        .order_by(|p| p.price, Direction::Descending)
        .take(limit)
        .into_vec()
}

/// Clients sorted by number of orders, most active first.
pub fn clients_by_order_count(clients: Vec<Client>, orders: &[Order]) -> Vec<Client> {
    let mut counts: HashMap<EntityId, usize> = HashMap::new();
    for order in orders {
        *counts.entry(order.client_id).or_default() += 1;
    }

    Query::new(clients)
        .order_by(
            |c| counts.get(&c.id).copied().unwrap_or(0),
            Direction::Descending,
        )
        .into_vec()
}

/// Products sorted by total quantity sold, most popular first.
pub fn products_by_quantity_sold(products: Vec<Product>, details: &[OrderDetail]) -> Vec<Product> {
    let mut sold: HashMap<EntityId, i64> = HashMap::new();
    for detail in details {
        *sold.entry(detail.product_id).or_default() += detail.quantity as i64;
    }

    Query::new(products)
        .order_by(
            |p| sold.get(&p.id).copied().unwrap_or(0),
            Direction::Descending,
        )
        .into_vec()
}

// =============================================================================
// Joins
// =============================================================================

/// Clients that placed at least one order.
pub fn clients_with_orders(clients: Vec<Client>, orders: &[Order]) -> Vec<Client> {
    Query::new(clients)
        .semi_join(orders, |c| c.id, |o| o.client_id)
        .into_vec()
}

/// Products that appear on no order line.
pub fn products_never_ordered(products: Vec<Product>, details: &[OrderDetail]) -> Vec<Product> {
    Query::new(products)
        .anti_join(details, |p| p.id, |d| d.product_id)
        .into_vec()
}

/// Distinct product lines on the orders of one client, in order sequence.
pub fn products_sold_to_client(
    orders: &[Order],
    details: &[OrderDetail],
    products: &[Product],
    client_id: EntityId,
) -> Vec<ClientProductLine> {
    let by_id = Lookup::new(products, |p| p.id);

    let mut lines_by_order: HashMap<EntityId, Vec<&OrderDetail>> = HashMap::new();
    for detail in details {
        lines_by_order.entry(detail.order_id).or_default().push(detail);
    }

    orders
        .iter()
        .filter(|o| o.client_id == client_id)
        .flat_map(|o| lines_by_order.get(&o.id).into_iter().flatten())
        .map(|d| ClientProductLine {
            product_id: d.product_id,
            product_name: product_name(&by_id, d.product_id),
            quantity: d.quantity,
        })
        .collect::<Query<_>>()
        .distinct()
        .into_vec()
}

/// Distinct products bought by one client. Lines whose product no longer
/// exists are skipped.
pub fn unique_products_sold_to_client(
    orders: &[Order],
    details: &[OrderDetail],
    products: &[Product],
    client_id: EntityId,
) -> Vec<Product> {
    let client_orders = Query::new(orders.iter())
        .filter_by(|o| o.client_id == client_id)
        .into_vec();
    let by_id = Lookup::new(products, |p| p.id);

    Query::new(details.iter())
        .semi_join(&client_orders, |d| d.order_id, |o| o.id)
        .into_iter()
        .filter_map(|d| by_id.get(&d.product_id).cloned())
        .collect::<Query<_>>()
        .distinct()
        .into_vec()
}

/// Distinct clients with at least one order line for `product_id`.
pub fn clients_who_bought_product(
    details: &[OrderDetail],
    orders: &[Order],
    clients: &[Client],
    product_id: EntityId,
) -> Vec<ClientRef> {
    let order_by_id = Lookup::new(orders, |o| o.id);
    let client_by_id = Lookup::new(clients, |c| c.id);

    details
        .iter()
        .filter(|d| d.product_id == product_id)
        .filter_map(|d| order_by_id.get(&d.order_id))
        .map(|o| ClientRef {
            client_id: o.client_id,
            client_name: client_name(&client_by_id, o.client_id),
        })
        .collect::<Query<_>>()
        .distinct()
        .into_vec()
}

// =============================================================================
// Aggregates
// =============================================================================

/// Sum of quantities over the lines of one order (0 for an unknown order).
pub fn order_total_quantity(details: &[OrderDetail], order_id: EntityId) -> OrderQuantity {
    let total_quantity = details
        .iter()
        .filter(|d| d.order_id == order_id)
        .map(|d| d.quantity as i64)
        .sum();

    OrderQuantity {
        order_id,
        total_quantity,
    }
}

/// The client with the most orders. On ties, the client whose first order
/// appears earliest wins.
pub fn client_with_most_orders(orders: Vec<Order>, clients: &[Client]) -> Option<ClientOrderCount> {
    let by_id = Lookup::new(clients, |c| c.id);

    Query::new(orders)
        .group_by(|o| o.client_id)
        .order_by(|g| g.count(), Direction::Descending)
        .map(|g| ClientOrderCount {
            client_id: g.key,
            client_name: client_name(&by_id, g.key),
            order_count: g.count(),
        })
        .first()
}

/// Price aggregates, or `None` when there are no products.
pub fn price_statistics(products: &[Product]) -> Option<PriceStatistics> {
    let prices = || products.iter().map(|p| p.price);

    Some(PriceStatistics {
        average: Money::average(prices())?,
        min: prices().min()?,
        max: prices().max()?,
        count: products.len(),
    })
}

pub fn price_bands(products: &[Product]) -> PriceBands {
    products
        .iter()
        .fold(PriceBands::default(), |mut bands, p| {
            if p.price < MEDIUM_PRICE_FLOOR {
                bands.cheap += 1;
            } else if p.price < EXPENSIVE_PRICE_FLOOR {
                bands.medium += 1;
            } else {
                bands.expensive += 1;
            }
            bands
        })
}

// =============================================================================
// Unit Tests
// =============================================================================
