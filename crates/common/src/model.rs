//! Persisted records shared by the store, domain and workflow layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Money, OrderId, OrderStatus, PaymentStatus, ProductId, UserId, Version};

/// A catalog product with its live stock count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    /// Units available for sale. Only the inventory ledger writes this.
    pub stock_quantity: u32,
    /// Inactive products stay in storage but cannot be bought.
    pub active: bool,
    pub version: Version,
}

/// Fields supplied when a product is first created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock_quantity: u32,
    pub active: bool,
}

impl NewProduct {
    /// Creates an active product without description.
    pub fn new(name: impl Into<String>, price: Money, stock_quantity: u32) -> Self {
        Self {
            name: name.into(),
            description: None,
            price,
            stock_quantity,
            active: true,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Administrative changes to a product. Stock is deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub active: bool,
}

impl From<&Product> for ProductUpdate {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            active: product.active,
        }
    }
}

/// A line of a placed order.
///
/// The unit price is captured when the line is reserved and the subtotal is
/// stored, so later catalog price changes never alter a historical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
}

impl OrderItem {
    /// Creates an order line, computing its subtotal.
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
            subtotal: unit_price.multiply(quantity),
        }
    }

    /// Like [`OrderItem::new`], but `None` when the subtotal overflows.
    pub fn try_new(
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Option<Self> {
        let subtotal = unit_price.checked_multiply(quantity)?;
        Some(Self {
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
            subtotal,
        })
    }
}

/// An order that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: UserId,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total_amount: Money,
    pub payment_method: Option<String>,
    pub shipping_address: Option<String>,
    pub transaction_id: Option<String>,
    pub items: Vec<OrderItem>,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total_amount: Money,
    pub payment_method: Option<String>,
    pub shipping_address: Option<String>,
    /// Identifier returned by the payment method for the charge.
    pub transaction_id: Option<String>,
    pub items: Vec<OrderItem>,
    /// Number of leading lines whose quantity has been credited back to
    /// stock after cancellation.
    pub restocked_lines: u32,
    pub version: Version,
}

impl Order {
    /// Builds the stored order from an insert request.
    pub fn from_new(id: OrderId, order: NewOrder) -> Self {
        Self {
            id,
            user_id: order.user_id,
            order_date: order.order_date,
            status: order.status,
            payment_status: order.payment_status,
            total_amount: order.total_amount,
            payment_method: order.payment_method,
            shipping_address: order.shipping_address,
            transaction_id: order.transaction_id,
            items: order.items,
            restocked_lines: 0,
            version: Version::first(),
        }
    }

    /// Returns the number of lines.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns the sum of the stored line subtotals.
    pub fn items_total(&self) -> Money {
        self.items.iter().map(|item| item.subtotal).sum()
    }
}

/// One product line of a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A per-user shopping cart. At most one line exists per product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub user_id: UserId,
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Creates an empty cart for a user or guest session.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            items: Vec::new(),
        }
    }

    /// Returns true if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the line for a product, if any.
    pub fn line(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Returns a mutable line for a product, if any.
    pub fn line_mut(&mut self, product_id: ProductId) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| item.product_id == product_id)
    }

    /// Removes the line for a product. Returns true if a line was removed.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.product_id != product_id);
        self.items.len() != before
    }

    /// Removes every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Returns the number of units across all lines.
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }
}
