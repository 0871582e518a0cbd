use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    Cart, NewOrder, NewProduct, Order, OrderId, Product, ProductId, ProductUpdate, UserId, Version,
};

use crate::{OrderQuery, Result};

/// Exclusive lock on a single product row.
///
/// While the lock is held no other writer can lock or modify the same
/// product. Writing stock commits the change and releases the lock;
/// dropping the lock without writing releases it and leaves the row
/// untouched.
#[async_trait]
pub trait ProductLock: Send {
    /// The product as read under the lock.
    fn product(&self) -> &Product;

    /// Writes the new stock count, bumps the version and releases the lock.
    async fn write_stock(self, stock_quantity: u32) -> Result<Product>;
}

/// Product persistence.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Lock handle returned by [`ProductStore::lock_product`].
    type Lock: ProductLock;

    /// Inserts a product and assigns its id. The version starts at 1.
    async fn insert_product(&self, product: NewProduct) -> Result<Product>;

    /// Point lookup by id.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Lists products ordered by id, optionally only active ones.
    async fn list_products(&self, active_only: bool) -> Result<Vec<Product>>;

    /// Lists products whose stock is strictly below `threshold`.
    async fn list_low_stock(&self, threshold: u32) -> Result<Vec<Product>>;

    /// Applies administrative changes if the stored version equals `expected`.
    ///
    /// Fails with `ConcurrentModification` on a version mismatch and with
    /// `NotFound` if the product does not exist. Stock is never modified.
    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
        expected: Version,
    ) -> Result<Product>;

    /// Acquires the exclusive row lock on a product.
    ///
    /// Blocks until any other holder releases it. Returns None if the
    /// product does not exist.
    async fn lock_product(&self, id: ProductId) -> Result<Option<Self::Lock>>;
}

/// Order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts an order with its lines and assigns its id.
    async fn insert_order(&self, order: NewOrder) -> Result<Order>;

    /// Point lookup by id.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Writes status, payment status, transaction id and restock progress.
    ///
    /// `order.version` must equal the stored version, otherwise the write
    /// fails with `ConcurrentModification`. Returns the order with its
    /// incremented version.
    async fn update_order(&self, order: &Order) -> Result<Order>;

    /// Retrieves orders matching a query, newest first.
    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<Order>>;

    /// Counts orders placed at or after `since`.
    async fn count_orders_since(&self, since: DateTime<Utc>) -> Result<u64>;
}

/// Cart persistence. Carts carry no version; the last write wins.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Looks up the cart of a user or guest session.
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>>;

    /// Inserts or replaces a cart and its lines.
    async fn save_cart(&self, cart: &Cart) -> Result<()>;
}

/// A complete backing store for the services.
pub trait Store: ProductStore + OrderStore + CartStore + Clone + 'static {}

impl<T> Store for T where T: ProductStore + OrderStore + CartStore + Clone + 'static {}
