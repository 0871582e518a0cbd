use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    Cart, NewOrder, NewProduct, Order, OrderId, Product, ProductId, ProductUpdate, UserId, Version,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    OrderQuery, Result, StoreError,
    store::{CartStore, OrderStore, ProductLock, ProductStore},
};

type ProductRow = Arc<Mutex<Product>>;

/// In-memory store implementation for tests and the default server setup.
///
/// Every product row sits behind its own async mutex, so locking one
/// product for a stock change never blocks work on another product.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    products: Arc<RwLock<BTreeMap<ProductId, ProductRow>>>,
    orders: Arc<RwLock<BTreeMap<OrderId, Order>>>,
    carts: Arc<RwLock<HashMap<UserId, Cart>>>,
    product_seq: Arc<AtomicI64>,
    order_seq: Arc<AtomicI64>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Returns the total number of products stored.
    pub async fn product_count(&self) -> usize {
        self.products.read().await.len()
    }

    async fn row(&self, id: ProductId) -> Option<ProductRow> {
        self.products.read().await.get(&id).cloned()
    }

    async fn snapshot_rows(&self) -> Vec<Product> {
        let rows: Vec<ProductRow> = self.products.read().await.values().cloned().collect();
        let mut products = Vec::with_capacity(rows.len());
        for row in rows {
            products.push(row.lock().await.clone());
        }
        products
    }
}

/// Lock on an in-memory product row, held as an owned mutex guard.
pub struct InMemoryProductLock {
    guard: OwnedMutexGuard<Product>,
}

#[async_trait]
impl ProductLock for InMemoryProductLock {
    fn product(&self) -> &Product {
        &self.guard
    }

    async fn write_stock(mut self, stock_quantity: u32) -> Result<Product> {
        self.guard.stock_quantity = stock_quantity;
        self.guard.version = self.guard.version.next();
        Ok(self.guard.clone())
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    type Lock = InMemoryProductLock;

    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let id = ProductId::new(self.product_seq.fetch_add(1, Ordering::SeqCst) + 1);
        let product = Product {
            id,
            name: product.name,
            description: product.description,
            price: product.price,
            stock_quantity: product.stock_quantity,
            active: product.active,
            version: Version::first(),
        };
        self.products
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(product.clone())));
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        match self.row(id).await {
            Some(row) => Ok(Some(row.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn list_products(&self, active_only: bool) -> Result<Vec<Product>> {
        let products = self.snapshot_rows().await;
        Ok(products
            .into_iter()
            .filter(|p| !active_only || p.active)
            .collect())
    }

    async fn list_low_stock(&self, threshold: u32) -> Result<Vec<Product>> {
        let products = self.snapshot_rows().await;
        Ok(products
            .into_iter()
            .filter(|p| p.stock_quantity < threshold)
            .collect())
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
        expected: Version,
    ) -> Result<Product> {
        let row = self.row(id).await.ok_or(StoreError::NotFound {
            entity: "Product",
            id: id.as_i64(),
        })?;
        let mut product = row.lock().await;

        if product.version != expected {
            return Err(StoreError::ConcurrentModification {
                entity: "Product",
                id: id.as_i64(),
                expected,
                actual: product.version,
            });
        }

        product.name = update.name;
        product.description = update.description;
        product.price = update.price;
        product.active = update.active;
        product.version = product.version.next();
        Ok(product.clone())
    }

    async fn lock_product(&self, id: ProductId) -> Result<Option<Self::Lock>> {
        match self.row(id).await {
            Some(row) => Ok(Some(InMemoryProductLock {
                guard: row.lock_owned().await,
            })),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: NewOrder) -> Result<Order> {
        let id = OrderId::new(self.order_seq.fetch_add(1, Ordering::SeqCst) + 1);
        let order = Order::from_new(id, order);
        self.orders.write().await.insert(id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn update_order(&self, order: &Order) -> Result<Order> {
        let mut orders = self.orders.write().await;
        let stored = orders.get_mut(&order.id).ok_or(StoreError::NotFound {
            entity: "Order",
            id: order.id.as_i64(),
        })?;

        if stored.version != order.version {
            return Err(StoreError::ConcurrentModification {
                entity: "Order",
                id: order.id.as_i64(),
                expected: order.version,
                actual: stored.version,
            });
        }

        stored.status = order.status;
        stored.payment_status = order.payment_status;
        stored.transaction_id = order.transaction_id.clone();
        stored.restocked_lines = order.restocked_lines;
        stored.version = stored.version.next();
        Ok(stored.clone())
    }

    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|o| query.matches(o))
            .cloned()
            .collect();

        // Newest first, id breaks ties
        matching.sort_by(|a, b| {
            b.order_date
                .cmp(&a.order_date)
                .then(b.id.cmp(&a.id))
        });

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_orders_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let orders = self.orders.read().await;
        Ok(orders.values().filter(|o| o.order_date >= since).count() as u64)
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>> {
        Ok(self.carts.read().await.get(&user_id).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        self.carts.write().await.insert(cart.user_id, cart.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::{CartItem, Money, OrderItem, OrderStatus, PaymentStatus};

    fn widget(stock: u32) -> NewProduct {
        NewProduct::new("Widget", Money::from_cents(1000), stock)
    }

    fn new_order(user: i64, date: DateTime<Utc>) -> NewOrder {
        NewOrder {
            user_id: UserId::new(user),
            order_date: date,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            total_amount: Money::from_cents(2000),
            payment_method: None,
            shipping_address: None,
            transaction_id: None,
            items: vec![OrderItem::new(
                ProductId::new(1),
                "Widget",
                2,
                Money::from_cents(1000),
            )],
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let store = InMemoryStore::new();
        let a = store.insert_product(widget(5)).await.unwrap();
        let b = store.insert_product(widget(5)).await.unwrap();
        assert_eq!(a.id, ProductId::new(1));
        assert_eq!(b.id, ProductId::new(2));
        assert_eq!(a.version, Version::first());
        assert_eq!(store.product_count().await, 2);
    }

    #[tokio::test]
    async fn test_lock_write_stock_bumps_version() {
        let store = InMemoryStore::new();
        let product = store.insert_product(widget(5)).await.unwrap();

        let lock = store.lock_product(product.id).await.unwrap().unwrap();
        assert_eq!(lock.product().stock_quantity, 5);
        let updated = lock.write_stock(3).await.unwrap();

        assert_eq!(updated.stock_quantity, 3);
        assert_eq!(updated.version, Version::new(2));
        let stored = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock_quantity, 3);
    }

    #[tokio::test]
    async fn test_dropped_lock_leaves_row_unchanged() {
        let store = InMemoryStore::new();
        let product = store.insert_product(widget(5)).await.unwrap();

        {
            let _lock = store.lock_product(product.id).await.unwrap().unwrap();
        }

        let stored = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored, product);
    }

    #[tokio::test]
    async fn test_lock_missing_product_returns_none() {
        let store = InMemoryStore::new();
        assert!(
            store
                .lock_product(ProductId::new(99))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_update_product_rejects_stale_version() {
        let store = InMemoryStore::new();
        let product = store.insert_product(widget(5)).await.unwrap();

        let mut update = ProductUpdate::from(&product);
        update.price = Money::from_cents(1500);
        let updated = store
            .update_product(product.id, update.clone(), product.version)
            .await
            .unwrap();
        assert_eq!(updated.price.cents(), 1500);
        assert_eq!(updated.stock_quantity, 5);

        let result = store
            .update_product(product.id, update, product.version)
            .await;
        assert!(matches!(
            result,
            Err(StoreError::ConcurrentModification { entity: "Product", .. })
        ));
    }

    #[tokio::test]
    async fn test_low_stock_and_active_filters() {
        let store = InMemoryStore::new();
        store.insert_product(widget(2)).await.unwrap();
        let plenty = store.insert_product(widget(50)).await.unwrap();
        let mut hidden = widget(1);
        hidden.active = false;
        store.insert_product(hidden).await.unwrap();

        assert_eq!(store.list_low_stock(5).await.unwrap().len(), 2);
        let active = store.list_products(true).await.unwrap();
        assert_eq!(active.len(), 2);
        assert!(active.iter().any(|p| p.id == plenty.id));
        assert_eq!(store.list_products(false).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_order_compare_and_swap() {
        let store = InMemoryStore::new();
        let order = store.insert_order(new_order(1, Utc::now())).await.unwrap();

        let mut change = order.clone();
        change.status = OrderStatus::Processing;
        let updated = store.update_order(&change).await.unwrap();
        assert_eq!(updated.version, Version::new(2));
        assert_eq!(updated.status, OrderStatus::Processing);

        // Same stale copy again
        let result = store.update_order(&change).await;
        assert!(matches!(
            result,
            Err(StoreError::ConcurrentModification { entity: "Order", .. })
        ));
    }

    #[tokio::test]
    async fn test_query_orders_newest_first_with_paging() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        for days in 0..5 {
            store
                .insert_order(new_order(1, now - Duration::days(days)))
                .await
                .unwrap();
        }
        store.insert_order(new_order(2, now)).await.unwrap();

        let page = store
            .query_orders(OrderQuery::for_user(UserId::new(1)).page(0, 2))
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert!(page[0].order_date >= page[1].order_date);

        let since = store
            .count_orders_since(now - Duration::hours(36))
            .await
            .unwrap();
        assert_eq!(since, 3);
    }

    #[tokio::test]
    async fn test_cart_save_replaces_previous() {
        let store = InMemoryStore::new();
        let user = UserId::new(5);
        assert!(store.get_cart(user).await.unwrap().is_none());

        let mut cart = Cart::new(user);
        cart.items.push(CartItem {
            product_id: ProductId::new(1),
            quantity: 2,
        });
        store.save_cart(&cart).await.unwrap();

        cart.clear();
        store.save_cart(&cart).await.unwrap();
        assert!(store.get_cart(user).await.unwrap().unwrap().is_empty());
    }
}
