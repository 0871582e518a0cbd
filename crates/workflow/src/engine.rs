//! Order workflow engine.
//!
//! Placement reserves stock line by line, computes the total from prices
//! read under each product's lock, optionally charges payment, persists the
//! order and notifies observers. Any failure after the first reservation
//! credits back every line reserved so far, in reverse order.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{
    Money, NewOrder, Order, OrderId, OrderItem, OrderStatus, PaymentStatus, ProductId, UserId,
};
use domain::{CartService, CheckoutValidator, DomainError, InventoryLedger, StatusPolicy};
use serde::Deserialize;
use store::{OrderQuery, Store};

use crate::error::{PaymentError, Result, WorkflowError};
use crate::notify::Notifier;
use crate::payment::{PaymentDetails, PaymentGateway, normalize_method};

/// Message sent to observers after a paid order is committed.
pub const ORDER_PAID_MESSAGE: &str = "Order placed and payment completed.";

/// A requested order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl OrderLine {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Input for placing an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub user_id: UserId,
    pub items: Vec<OrderLine>,
    pub shipping_address: Option<String>,
    /// Recorded on the order. Required when the order is paid.
    pub payment_method: Option<String>,
}

impl OrderRequest {
    pub fn new(user_id: UserId, items: Vec<OrderLine>) -> Self {
        Self {
            user_id,
            items,
            shipping_address: None,
            payment_method: None,
        }
    }

    pub fn shipping_address(mut self, address: impl Into<String>) -> Self {
        self.shipping_address = Some(address.into());
        self
    }

    pub fn payment_method(mut self, method: impl Into<String>) -> Self {
        self.payment_method = Some(method.into());
        self
    }
}

/// A line whose stock has been debited for the order being placed.
#[derive(Debug, Clone, Copy)]
struct Reservation {
    product_id: ProductId,
    quantity: u32,
}

/// Orchestrates order placement and owns order status transitions.
pub struct OrderWorkflow<S: Store> {
    store: S,
    ledger: InventoryLedger<S>,
    carts: CartService<S>,
    checkout: CheckoutValidator<S>,
    gateway: Arc<PaymentGateway>,
    notifier: Arc<Notifier>,
    policy: StatusPolicy,
}

impl<S: Store> Clone for OrderWorkflow<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            ledger: self.ledger.clone(),
            carts: self.carts.clone(),
            checkout: self.checkout.clone(),
            gateway: Arc::clone(&self.gateway),
            notifier: Arc::clone(&self.notifier),
            policy: self.policy,
        }
    }
}

impl<S: Store> OrderWorkflow<S> {
    /// Creates a workflow with the strict status policy.
    pub fn new(store: S, gateway: PaymentGateway, notifier: Notifier) -> Self {
        Self {
            ledger: InventoryLedger::new(store.clone()),
            carts: CartService::new(store.clone()),
            checkout: CheckoutValidator::new(store.clone()),
            store,
            gateway: Arc::new(gateway),
            notifier: Arc::new(notifier),
            policy: StatusPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    pub fn gateway(&self) -> &PaymentGateway {
        &self.gateway
    }

    pub fn ledger(&self) -> &InventoryLedger<S> {
        &self.ledger
    }

    /// Places an order without charging. Starts at (PENDING, PENDING).
    #[tracing::instrument(skip(self), fields(user_id = %request.user_id))]
    pub async fn place_order(&self, request: OrderRequest) -> Result<Order> {
        self.place(request, None).await
    }

    /// Places an order and charges it through `request.payment_method`.
    ///
    /// On success the order is (PROCESSING, COMPLETED) and observers are
    /// notified. If the charge fails, reserved stock is credited back, no
    /// order is stored and the payment error is returned.
    #[tracing::instrument(skip(self, details), fields(user_id = %request.user_id))]
    pub async fn place_order_with_payment(
        &self,
        request: OrderRequest,
        details: PaymentDetails,
    ) -> Result<Order> {
        self.place(request, Some(details)).await
    }

    /// Runs the checkout preflight on the user's cart, places an order from
    /// its lines and clears the cart. The order is charged when `details`
    /// is given.
    #[tracing::instrument(skip(self, details))]
    pub async fn place_order_from_cart(
        &self,
        user_id: UserId,
        shipping_address: Option<String>,
        payment_method: Option<String>,
        details: Option<PaymentDetails>,
    ) -> Result<Order> {
        let validated = self.checkout.preflight(user_id).await?;
        let items = validated
            .cart
            .items
            .iter()
            .map(|item| OrderLine::new(item.product_id, item.quantity))
            .collect();

        let request = OrderRequest {
            user_id,
            items,
            shipping_address,
            payment_method,
        };
        let order = self.place(request, details).await?;

        self.carts.clear_cart(user_id).await?;
        Ok(order)
    }

    async fn place(&self, request: OrderRequest, details: Option<PaymentDetails>) -> Result<Order> {
        let started = Instant::now();
        let result = self.try_place(request, details).await;

        metrics::histogram!("order_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        match &result {
            Ok(order) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    total = %order.total_amount,
                    status = %order.status,
                    payment_status = %order.payment_status,
                    "order placed"
                );
            }
            Err(e) => {
                metrics::counter!("order_placement_failures_total").increment(1);
                tracing::info!(error = %e, "order placement failed");
            }
        }
        result
    }

    async fn try_place(
        &self,
        request: OrderRequest,
        details: Option<PaymentDetails>,
    ) -> Result<Order> {
        if request.items.is_empty() {
            return Err(DomainError::InvalidArgument("order has no items".to_string()).into());
        }
        if let Some(line) = request.items.iter().find(|line| line.quantity == 0) {
            return Err(DomainError::InvalidArgument(format!(
                "quantity for product {} must be positive",
                line.product_id
            ))
            .into());
        }

        let payment_method = request.payment_method.as_deref().map(normalize_method);
        let charge = match (details, payment_method.as_deref()) {
            (Some(details), Some(method)) => {
                // Fail before touching stock when the method is unknown.
                if !self.gateway.supports(method) {
                    return Err(PaymentError::UnsupportedPaymentMethod(
                        request.payment_method.clone().unwrap_or_default(),
                    )
                    .into());
                }
                Some((method.to_string(), details))
            }
            (Some(_), None) => {
                return Err(DomainError::InvalidArgument(
                    "payment method is required for a paid order".to_string(),
                )
                .into());
            }
            (None, _) => None,
        };

        let mut reserved = Vec::with_capacity(request.items.len());
        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            match self.ledger.reserve(line.product_id, line.quantity).await {
                Ok(product) => {
                    reserved.push(Reservation {
                        product_id: line.product_id,
                        quantity: line.quantity,
                    });
                    match OrderItem::try_new(product.id, product.name, line.quantity, product.price)
                    {
                        Some(item) => items.push(item),
                        None => {
                            self.compensate(&reserved).await;
                            return Err(DomainError::InvalidArgument(format!(
                                "subtotal for product {} exceeds the representable amount",
                                line.product_id
                            ))
                            .into());
                        }
                    }
                }
                Err(e) => {
                    self.compensate(&reserved).await;
                    return Err(e.into());
                }
            }
        }

        let Some(total_amount) = items
            .iter()
            .try_fold(Money::zero(), |total, item| total.checked_add(item.subtotal))
        else {
            self.compensate(&reserved).await;
            return Err(DomainError::InvalidArgument(
                "order total exceeds the representable amount".to_string(),
            )
            .into());
        };

        let (status, payment_status, transaction_id) = match &charge {
            Some((method, details)) => {
                match self.gateway.charge(method, total_amount, details).await {
                    Ok(transaction_id) => (
                        OrderStatus::Processing,
                        PaymentStatus::Completed,
                        Some(transaction_id),
                    ),
                    Err(e) => {
                        self.compensate(&reserved).await;
                        return Err(e.into());
                    }
                }
            }
            None => (OrderStatus::Pending, PaymentStatus::Pending, None),
        };

        let new_order = NewOrder {
            user_id: request.user_id,
            order_date: Utc::now(),
            status,
            payment_status,
            total_amount,
            payment_method,
            shipping_address: request.shipping_address,
            transaction_id: transaction_id.clone(),
            items,
        };

        let order = match self.store.insert_order(new_order).await {
            Ok(order) => order,
            Err(e) => {
                tracing::error!(error = %e, "failed to persist order");
                if let (Some((method, details)), Some(transaction_id)) = (&charge, &transaction_id)
                {
                    self.void_charge(method, transaction_id, total_amount, details)
                        .await;
                }
                self.compensate(&reserved).await;
                return Err(e.into());
            }
        };

        if order.payment_status == PaymentStatus::Completed {
            self.notifier.notify_all(&order, ORDER_PAID_MESSAGE).await;
        }
        Ok(order)
    }

    /// Credits back reserved lines in reverse order. Failures are logged;
    /// the original error is what the caller sees.
    async fn compensate(&self, reserved: &[Reservation]) {
        for reservation in reserved.iter().rev() {
            match self
                .ledger
                .credit(reservation.product_id, reservation.quantity)
                .await
            {
                Ok(_) => tracing::warn!(
                    product_id = %reservation.product_id,
                    quantity = reservation.quantity,
                    "reservation released"
                ),
                Err(e) => tracing::error!(
                    product_id = %reservation.product_id,
                    quantity = reservation.quantity,
                    error = %e,
                    "failed to release reservation"
                ),
            }
        }
    }

    async fn void_charge(
        &self,
        method: &str,
        transaction_id: &str,
        amount: Money,
        details: &PaymentDetails,
    ) {
        match self
            .gateway
            .refund(method, transaction_id, amount, details)
            .await
        {
            Ok(refund_id) => tracing::warn!(transaction_id, %refund_id, "charge voided"),
            Err(e) => tracing::error!(transaction_id, error = %e, "failed to void charge"),
        }
    }

    /// Changes the order status.
    ///
    /// Setting the current status again returns the order unchanged, except
    /// that a repeated CANCELLED resumes a restock that stopped on an error.
    /// Moving to CANCELLED credits every line's quantity back to stock once
    /// the status change is committed.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut order = self.get_order(order_id).await?;
        let previous = order.status;
        if previous == status {
            if status == OrderStatus::Cancelled {
                return self.restock(order).await;
            }
            return Ok(order);
        }
        self.policy.check_order(previous, status)?;

        order.status = status;
        let mut order = self.store.update_order(&order).await?;
        tracing::info!(%order_id, from = %previous, to = %status, "order status changed");

        if status == OrderStatus::Cancelled {
            order = self.restock(order).await?;
        }

        let message = format!("Order status changed from {previous} to {status}");
        self.notifier.notify_all(&order, &message).await;
        Ok(order)
    }

    /// Credits back the lines past `restocked_lines`, in order.
    ///
    /// Each line is claimed with a versioned write before its credit, so
    /// concurrent callers never credit the same line twice. A failed credit
    /// releases its claim and stops; a later CANCELLED resumes from there.
    async fn restock(&self, mut order: Order) -> Result<Order> {
        while let Some(item) = order.items.get(order.restocked_lines as usize) {
            let (product_id, quantity) = (item.product_id, item.quantity);

            order.restocked_lines += 1;
            order = self.store.update_order(&order).await?;

            if let Err(e) = self.ledger.credit(product_id, quantity).await {
                tracing::error!(
                    order_id = %order.id,
                    %product_id,
                    error = %e,
                    "failed to restock cancelled line"
                );
                order.restocked_lines -= 1;
                if let Err(release) = self.store.update_order(&order).await {
                    tracing::error!(
                        order_id = %order.id,
                        %product_id,
                        error = %release,
                        "failed to release restock claim"
                    );
                }
                return Err(e.into());
            }
        }
        Ok(order)
    }

    /// Changes the payment status.
    ///
    /// COMPLETED on an order that is still PENDING advances the order to
    /// PROCESSING in the same write.
    #[tracing::instrument(skip(self))]
    pub async fn update_payment_status(
        &self,
        order_id: OrderId,
        payment_status: PaymentStatus,
    ) -> Result<Order> {
        let mut order = self.get_order(order_id).await?;
        let previous = order.payment_status;
        if previous == payment_status {
            return Ok(order);
        }
        self.policy.check_payment(previous, payment_status)?;

        order.payment_status = payment_status;
        let advanced =
            payment_status == PaymentStatus::Completed && order.status == OrderStatus::Pending;
        if advanced {
            order.status = OrderStatus::Processing;
        }

        let order = self.store.update_order(&order).await?;
        tracing::info!(%order_id, from = %previous, to = %payment_status, "payment status changed");

        if advanced {
            let message = format!(
                "Order status changed from {} to {}",
                OrderStatus::Pending,
                OrderStatus::Processing
            );
            self.notifier.notify_all(&order, &message).await;
        }
        Ok(order)
    }

    /// Refunds a paid order through the method it was charged with and
    /// marks it REFUNDED. Stock is not touched.
    #[tracing::instrument(skip(self, details))]
    pub async fn refund_order(&self, order_id: OrderId, details: PaymentDetails) -> Result<Order> {
        let mut order = self.get_order(order_id).await?;
        if order.payment_status != PaymentStatus::Completed {
            return Err(DomainError::InvalidStatusTransition {
                kind: "payment status",
                from: order.payment_status.to_string(),
                to: PaymentStatus::Refunded.to_string(),
            }
            .into());
        }

        let (Some(method), Some(transaction_id)) =
            (order.payment_method.clone(), order.transaction_id.clone())
        else {
            return Err(DomainError::InvalidArgument(format!(
                "order {order_id} has no recorded payment to refund"
            ))
            .into());
        };

        let refund_id = self
            .gateway
            .refund(&method, &transaction_id, order.total_amount, &details)
            .await?;

        order.payment_status = PaymentStatus::Refunded;
        let order = self.store.update_order(&order).await?;
        tracing::info!(%order_id, %refund_id, amount = %order.total_amount, "order refunded");
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| {
                WorkflowError::Domain(DomainError::NotFound {
                    entity: "Order",
                    id: order_id.as_i64(),
                })
            })
    }

    /// One zero-based page of a user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn orders_for_user(
        &self,
        user_id: UserId,
        page: usize,
        size: usize,
    ) -> Result<Vec<Order>> {
        if size == 0 {
            return Err(DomainError::InvalidArgument("page size must be positive".to_string()).into());
        }
        Ok(self
            .store
            .query_orders(OrderQuery::for_user(user_id).page(page, size))
            .await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn all_orders(&self) -> Result<Vec<Order>> {
        Ok(self.store.query_orders(OrderQuery::new()).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn orders_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        Ok(self.store.query_orders(OrderQuery::for_status(status)).await?)
    }

    /// Orders placed within `[start, end]`.
    #[tracing::instrument(skip(self))]
    pub async fn orders_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        if start > end {
            return Err(DomainError::InvalidArgument(
                "range start must not be after its end".to_string(),
            )
            .into());
        }
        Ok(self
            .store
            .query_orders(OrderQuery::new().date_range(start, end))
            .await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn count_recent_orders(&self, since: DateTime<Utc>) -> Result<u64> {
        Ok(self.store.count_orders_since(since).await?)
    }
}
