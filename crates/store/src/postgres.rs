use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    Cart, CartItem, Money, NewOrder, NewProduct, Order, OrderId, OrderItem, Product, ProductId,
    ProductUpdate, UserId, Version,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};

use crate::{
    OrderQuery, Result, StoreError,
    store::{CartStore, OrderStore, ProductLock, ProductStore},
};

const PRODUCT_COLUMNS: &str = "id, name, description, price_cents, stock_quantity, active, version";
const ORDER_COLUMNS: &str = "id, user_id, order_date, status, payment_status, total_amount_cents, \
     payment_method, shipping_address, transaction_id, restocked_lines, version";

/// PostgreSQL-backed store implementation.
///
/// Stock changes run inside a transaction that holds `SELECT ... FOR UPDATE`
/// on the product row until the new count is committed.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn load_items(&self, order_ids: Vec<i64>) -> Result<HashMap<i64, Vec<OrderItem>>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, product_name, quantity, unit_price_cents, subtotal_cents
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_no
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<i64, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            let order_id: i64 = row.try_get("order_id")?;
            items.entry(order_id).or_default().push(OrderItem {
                product_id: ProductId::new(row.try_get("product_id")?),
                product_name: row.try_get("product_name")?,
                quantity: to_u32(row.try_get("quantity")?, "order_items.quantity")?,
                unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
                subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
            });
        }
        Ok(items)
    }

    async fn attach_items(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let mut orders = rows
            .iter()
            .map(row_to_order)
            .collect::<Result<Vec<_>>>()?;
        let ids = orders.iter().map(|o| o.id.as_i64()).collect();
        let mut items = self.load_items(ids).await?;
        for order in &mut orders {
            order.items = items.remove(&order.id.as_i64()).unwrap_or_default();
        }
        Ok(orders)
    }

    async fn current_version(&self, table: &'static str, id: i64) -> Result<Option<Version>> {
        let sql = format!("SELECT version FROM {table} WHERE id = $1");
        let version: Option<i64> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(version.map(Version::new))
    }
}

fn to_u32(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::InvalidValue(format!("{column} = {value}")))
}

fn to_i32(value: u32, column: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::InvalidValue(format!("{column} = {value}")))
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock_quantity: to_u32(row.try_get("stock_quantity")?, "products.stock_quantity")?,
        active: row.try_get("active")?,
        version: Version::new(row.try_get("version")?),
    })
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let payment_status: String = row.try_get("payment_status")?;

    Ok(Order {
        id: OrderId::new(row.try_get("id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        order_date: row.try_get("order_date")?,
        status: status
            .parse()
            .map_err(|e: common::ParseStatusError| StoreError::InvalidValue(e.to_string()))?,
        payment_status: payment_status
            .parse()
            .map_err(|e: common::ParseStatusError| StoreError::InvalidValue(e.to_string()))?,
        total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
        payment_method: row.try_get("payment_method")?,
        shipping_address: row.try_get("shipping_address")?,
        transaction_id: row.try_get("transaction_id")?,
        items: Vec::new(),
        restocked_lines: to_u32(row.try_get("restocked_lines")?, "orders.restocked_lines")?,
        version: Version::new(row.try_get("version")?),
    })
}

/// Row lock held by an open transaction.
pub struct PgProductLock {
    tx: Transaction<'static, Postgres>,
    product: Product,
}

#[async_trait]
impl ProductLock for PgProductLock {
    fn product(&self) -> &Product {
        &self.product
    }

    async fn write_stock(self, stock_quantity: u32) -> Result<Product> {
        let mut tx = self.tx;
        let sql = format!(
            "UPDATE products SET stock_quantity = $2, version = version + 1 \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(self.product.id.as_i64())
            .bind(to_i32(stock_quantity, "products.stock_quantity")?)
            .fetch_one(&mut *tx)
            .await?;
        let product = row_to_product(&row)?;
        tx.commit().await?;
        Ok(product)
    }
}

#[async_trait]
impl ProductStore for PostgresStore {
    type Lock = PgProductLock;

    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let sql = format!(
            "INSERT INTO products (name, description, price_cents, stock_quantity, active) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price.cents())
            .bind(to_i32(product.stock_quantity, "products.stock_quantity")?)
            .bind(product.active)
            .fetch_one(&self.pool)
            .await?;
        row_to_product(&row)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn list_products(&self, active_only: bool) -> Result<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE ($1 = FALSE OR active) ORDER BY id"
        );
        let rows = sqlx::query(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn list_low_stock(&self, threshold: u32) -> Result<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE stock_quantity < $1 ORDER BY id"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(threshold))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
        expected: Version,
    ) -> Result<Product> {
        let sql = format!(
            "UPDATE products SET name = $2, description = $3, price_cents = $4, active = $5, \
             version = version + 1 WHERE id = $1 AND version = $6 RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .bind(&update.name)
            .bind(&update.description)
            .bind(update.price.cents())
            .bind(update.active)
            .bind(expected.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row_to_product(&row),
            None => match self.current_version("products", id.as_i64()).await? {
                Some(actual) => Err(StoreError::ConcurrentModification {
                    entity: "Product",
                    id: id.as_i64(),
                    expected,
                    actual,
                }),
                None => Err(StoreError::NotFound {
                    entity: "Product",
                    id: id.as_i64(),
                }),
            },
        }
    }

    async fn lock_product(&self, id: ProductId) -> Result<Option<Self::Lock>> {
        let mut tx = self.pool.begin().await?;
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&mut *tx)
            .await?;

        match row {
            Some(row) => {
                let product = row_to_product(&row)?;
                Ok(Some(PgProductLock { tx, product }))
            }
            None => {
                tx.rollback().await?;
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn insert_order(&self, order: NewOrder) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (user_id, order_date, status, payment_status, total_amount_cents,
                                payment_method, shipping_address, transaction_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(order.user_id.as_i64())
        .bind(order.order_date)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.total_amount.cents())
        .bind(&order.payment_method)
        .bind(&order.shipping_address)
        .bind(&order.transaction_id)
        .fetch_one(&mut *tx)
        .await?;

        for (line_no, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, line_no, product_id, product_name, quantity,
                                         unit_price_cents, subtotal_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(id)
            .bind(line_no as i32)
            .bind(item.product_id.as_i64())
            .bind(&item.product_name)
            .bind(to_i32(item.quantity, "order_items.quantity")?)
            .bind(item.unit_price.cents())
            .bind(item.subtotal.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Order::from_new(OrderId::new(id), order))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let rows = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_all(&self.pool)
            .await?;
        Ok(self.attach_items(rows).await?.into_iter().next())
    }

    async fn update_order(&self, order: &Order) -> Result<Order> {
        let sql = format!(
            "UPDATE orders SET status = $2, payment_status = $3, transaction_id = $4, \
             restocked_lines = $6, version = version + 1 \
             WHERE id = $1 AND version = $5 RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(order.id.as_i64())
            .bind(order.status.as_str())
            .bind(order.payment_status.as_str())
            .bind(&order.transaction_id)
            .bind(order.version.as_i64())
            .bind(to_i32(order.restocked_lines, "orders.restocked_lines")?)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let mut updated = row_to_order(&row)?;
                updated.items = order.items.clone();
                Ok(updated)
            }
            None => match self.current_version("orders", order.id.as_i64()).await? {
                Some(actual) => Err(StoreError::ConcurrentModification {
                    entity: "Order",
                    id: order.id.as_i64(),
                    expected: order.version,
                    actual,
                }),
                None => Err(StoreError::NotFound {
                    entity: "Order",
                    id: order.id.as_i64(),
                }),
            },
        }
    }

    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders WHERE TRUE"));

        if let Some(user_id) = query.user_id {
            builder.push(" AND user_id = ").push_bind(user_id.as_i64());
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(from) = query.from_date {
            builder.push(" AND order_date >= ").push_bind(from);
        }
        if let Some(to) = query.to_date {
            builder.push(" AND order_date <= ").push_bind(to);
        }

        builder.push(" ORDER BY order_date DESC, id DESC");

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            builder.push(" OFFSET ").push_bind(offset as i64);
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        self.attach_items(rows).await
    }

    async fn count_orders_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE order_date >= $1")
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT user_id FROM carts WHERE user_id = $1")
            .bind(user_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let rows = sqlx::query(
            "SELECT product_id, quantity FROM cart_items WHERE user_id = $1 ORDER BY line_no",
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        let mut cart = Cart::new(user_id);
        for row in rows {
            cart.items.push(CartItem {
                product_id: ProductId::new(row.try_get("product_id")?),
                quantity: to_u32(row.try_get("quantity")?, "cart_items.quantity")?,
            });
        }
        Ok(Some(cart))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO carts (user_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(cart.user_id.as_i64())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(cart.user_id.as_i64())
            .execute(&mut *tx)
            .await?;

        for (line_no, item) in cart.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO cart_items (user_id, line_no, product_id, quantity) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(cart.user_id.as_i64())
            .bind(line_no as i32)
            .bind(item.product_id.as_i64())
            .bind(to_i32(item.quantity, "cart_items.quantity")?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
