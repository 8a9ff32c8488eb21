//! # Report Runner
//!
//! Runs the `orderdesk_core::reports` queries through a unit of work.
//!
//! Single-table filters are pushed down to the session with `find`, so the
//! SQLite session answers them with a WHERE clause. Joins, groupings and
//! aggregates fetch the collections they need and evaluate in memory.

use chrono::{DateTime, Utc};
use orderdesk_core::reports::{
    self, ClientOrderCount, ClientProductLine, ClientRef, OrderLine, OrderQuantity, PriceBands,
    PriceStatistics, ProductLine,
};
use orderdesk_core::validation::validate_price_range;
use orderdesk_core::{
    Client, Direction, EntityId, Money, Order, OrderDetail, OrderDetailField, OrderField,
    Predicate, Product, ProductField,
};

use crate::error::DbResult;
use crate::session::Session;
use crate::unit_of_work::UnitOfWork;

/// Report queries over one unit of work.
///
/// ## Usage
/// ```rust,ignore
/// let mut uow = db.unit_of_work();
/// let best = uow.reports().client_with_most_orders().await?;
/// ```
pub struct Reports<'u, S: Session> {
    uow: &'u mut UnitOfWork<S>,
}

impl<S: Session> UnitOfWork<S> {
    pub fn reports(&mut self) -> Reports<'_, S> {
        Reports::new(self)
    }
}

impl<'u, S: Session> Reports<'u, S> {
    pub fn new(uow: &'u mut UnitOfWork<S>) -> Self {
        Reports { uow }
    }

    async fn all_clients(&mut self) -> DbResult<Vec<Client>> {
        self.uow.clients()?.get_all().await
    }

    async fn all_products(&mut self) -> DbResult<Vec<Product>> {
        self.uow.products()?.get_all().await
    }

    async fn all_orders(&mut self) -> DbResult<Vec<Order>> {
        self.uow.orders()?.get_all().await
    }

    async fn all_details(&mut self) -> DbResult<Vec<OrderDetail>> {
        self.uow.order_details()?.get_all().await
    }

    // =========================================================================
    // Filters
    // =========================================================================

    pub async fn clients_by_name(&mut self, text: &str) -> DbResult<Vec<Client>> {
        self.uow
            .clients()?
            .find(&reports::name_contains_predicate(text))
            .await
    }

    pub async fn products_priced_above(&mut self, price: Money) -> DbResult<Vec<Product>> {
        self.uow
            .products()?
            .find(&reports::price_above_predicate(price))
            .await
    }

    /// Products priced within `[min, max]`; the range is validated first.
    pub async fn products_in_price_range(
        &mut self,
        min: Money,
        max: Money,
    ) -> DbResult<Vec<Product>> {
        validate_price_range(min, max)?;

        self.uow
            .products()?
            .find(&Predicate::between(ProductField::Price, min, max))
            .await
    }

    pub async fn products_by_description(&mut self, text: &str) -> DbResult<Vec<Product>> {
        self.uow
            .products()?
            .find(&reports::description_contains_predicate(text))
            .await
    }

    pub async fn products_without_description(&mut self) -> DbResult<Vec<Product>> {
        self.uow
            .products()?
            .find(&Predicate::is_empty(ProductField::Description))
            .await
    }

    pub async fn orders_of_client(&mut self, client_id: EntityId) -> DbResult<Vec<Order>> {
        self.uow
            .orders()?
            .find(&reports::client_orders_predicate(client_id))
            .await
    }

    pub async fn orders_in_date_range(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<Order>> {
        self.uow
            .orders()?
            .find(&reports::date_range_predicate(start, end))
            .await
    }

    pub async fn orders_after(&mut self, date: DateTime<Utc>) -> DbResult<Vec<Order>> {
        self.uow
            .orders()?
            .find(&Predicate::gt(OrderField::OrderDate, date))
            .await
    }

    pub async fn details_of_order(&mut self, order_id: EntityId) -> DbResult<Vec<OrderDetail>> {
        self.uow
            .order_details()?
            .find(&reports::order_details_predicate(order_id))
            .await
    }

    // =========================================================================
    // Projections
    // =========================================================================

    pub async fn order_product_lines(&mut self, order_id: EntityId) -> DbResult<Vec<ProductLine>> {
        let details = self.details_of_order(order_id).await?;
        let products = self.all_products().await?;

        Ok(reports::order_product_lines(details, &products, order_id))
    }

    pub async fn order_lines(&mut self) -> DbResult<Vec<OrderLine>> {
        let details = self.all_details().await?;
        let products = self.all_products().await?;

        Ok(reports::order_lines(details, &products))
    }

    pub async fn client_names(&mut self) -> DbResult<Vec<String>> {
        Ok(reports::client_names(self.all_clients().await?))
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    pub async fn products_by_price(&mut self, direction: Direction) -> DbResult<Vec<Product>> {
        Ok(reports::products_by_price(self.all_products().await?, direction))
    }

    pub async fn most_expensive_product(&mut self) -> DbResult<Option<Product>> {
        Ok(reports::most_expensive_product(self.all_products().await?))
    }

    /// Up to `limit` described products priced above `min_price`, most
    /// expensive first.
    pub async fn premium_products(
        &mut self,
        min_price: Money,
        limit: usize,
    ) -> DbResult<Vec<Product>> {
        let candidates = self
            .uow
            .products()?
            .find(&reports::premium_predicate(min_price))
            .await?;

        Ok(reports::premium_products(candidates, min_price, limit))
    }

    pub async fn clients_by_order_count(&mut self) -> DbResult<Vec<Client>> {
        let clients = self.all_clients().await?;
        let orders = self.all_orders().await?;

        Ok(reports::clients_by_order_count(clients, &orders))
    }

    pub async fn products_by_quantity_sold(&mut self) -> DbResult<Vec<Product>> {
        let products = self.all_products().await?;
        let details = self.all_details().await?;

        Ok(reports::products_by_quantity_sold(products, &details))
    }

    // =========================================================================
    // Joins
    // =========================================================================

    pub async fn clients_with_orders(&mut self) -> DbResult<Vec<Client>> {
        let clients = self.all_clients().await?;
        let orders = self.all_orders().await?;

        Ok(reports::clients_with_orders(clients, &orders))
    }

    pub async fn products_never_ordered(&mut self) -> DbResult<Vec<Product>> {
        let products = self.all_products().await?;
        let details = self.all_details().await?;

        Ok(reports::products_never_ordered(products, &details))
    }

    pub async fn products_sold_to_client(
        &mut self,
        client_id: EntityId,
    ) -> DbResult<Vec<ClientProductLine>> {
        let orders = self.orders_of_client(client_id).await?;
        let details = self.all_details().await?;
        let products = self.all_products().await?;

        Ok(reports::products_sold_to_client(
            &orders, &details, &products, client_id,
        ))
    }

    pub async fn unique_products_sold_to_client(
        &mut self,
        client_id: EntityId,
    ) -> DbResult<Vec<Product>> {
        let orders = self.orders_of_client(client_id).await?;
        let details = self.all_details().await?;
        let products = self.all_products().await?;

        Ok(reports::unique_products_sold_to_client(
            &orders, &details, &products, client_id,
        ))
    }

    pub async fn clients_who_bought_product(
        &mut self,
        product_id: EntityId,
    ) -> DbResult<Vec<ClientRef>> {
        let details = self
            .uow
            .order_details()?
            .find(&Predicate::eq(OrderDetailField::ProductId, product_id))
            .await?;
        let orders = self.all_orders().await?;
        let clients = self.all_clients().await?;

        Ok(reports::clients_who_bought_product(
            &details, &orders, &clients, product_id,
        ))
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    pub async fn order_total_quantity(&mut self, order_id: EntityId) -> DbResult<OrderQuantity> {
        let details = self.details_of_order(order_id).await?;
        Ok(reports::order_total_quantity(&details, order_id))
    }

    pub async fn client_with_most_orders(&mut self) -> DbResult<Option<ClientOrderCount>> {
        let orders = self.all_orders().await?;
        let clients = self.all_clients().await?;

        Ok(reports::client_with_most_orders(orders, &clients))
    }

    /// `None` when there are no products.
    pub async fn price_statistics(&mut self) -> DbResult<Option<PriceStatistics>> {
        Ok(reports::price_statistics(&self.all_products().await?))
    }

    pub async fn price_bands(&mut self) -> DbResult<PriceBands> {
        Ok(reports::price_bands(&self.all_products().await?))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
