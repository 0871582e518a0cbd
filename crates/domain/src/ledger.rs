//! Inventory ledger: the only code path that changes product stock.

use common::{Product, ProductId};
use store::{ProductLock, ProductStore};

use crate::error::{DomainError, Result};

/// Owns product stock counts.
///
/// Every debit and credit takes the exclusive row lock on the product,
/// reads the current count under that lock and writes the new count
/// before releasing it. Two concurrent debits of the same product are
/// therefore serialized; the second observes the first's committed
/// decrement and fails cleanly if the remainder is insufficient.
#[derive(Clone)]
pub struct InventoryLedger<S: ProductStore> {
    store: S,
}

impl<S: ProductStore> InventoryLedger<S> {
    /// Creates a new ledger over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Decrements stock by `quantity`.
    ///
    /// Fails with `InsufficientStock` without touching the row when the
    /// result would be negative.
    #[tracing::instrument(skip(self))]
    pub async fn debit(&self, product_id: ProductId, quantity: u32) -> Result<Product> {
        let lock = self.lock(product_id).await?;
        self.debit_locked(lock, quantity).await
    }

    /// Debits stock for an order line.
    ///
    /// Same as [`debit`](Self::debit), but the product must also be active.
    /// The returned product carries the name and price read under the lock,
    /// which the caller snapshots onto the order line.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(&self, product_id: ProductId, quantity: u32) -> Result<Product> {
        let lock = self
            .store
            .lock_product(product_id)
            .await?
            .ok_or(DomainError::ProductUnavailable(product_id))?;

        if !lock.product().active {
            return Err(DomainError::ProductUnavailable(product_id));
        }

        self.debit_locked(lock, quantity).await
    }

    /// Increments stock by `quantity`. Used for cancellations, compensation
    /// and administrative restocking.
    #[tracing::instrument(skip(self))]
    pub async fn credit(&self, product_id: ProductId, quantity: u32) -> Result<Product> {
        let lock = self.lock(product_id).await?;
        let current = lock.product().stock_quantity;

        let updated = current.checked_add(quantity).ok_or_else(|| {
            DomainError::InvalidArgument(format!(
                "crediting {quantity} units to product {product_id} overflows stock {current}"
            ))
        })?;

        let product = lock.write_stock(updated).await?;
        metrics::counter!("inventory_credits_total").increment(1);
        tracing::info!(%product_id, quantity, stock = product.stock_quantity, "stock credited");
        Ok(product)
    }

    async fn lock(&self, product_id: ProductId) -> Result<S::Lock> {
        self.store
            .lock_product(product_id)
            .await?
            .ok_or_else(|| DomainError::product_not_found(product_id))
    }

    async fn debit_locked(&self, lock: S::Lock, quantity: u32) -> Result<Product> {
        let product_id = lock.product().id;
        let available = lock.product().stock_quantity;

        let Some(remaining) = available.checked_sub(quantity) else {
            metrics::counter!("inventory_debit_rejections_total").increment(1);
            tracing::debug!(%product_id, quantity, available, "debit rejected");
            return Err(DomainError::InsufficientStock {
                product_id,
                requested: quantity,
                available,
            });
        };

        let product = lock.write_stock(remaining).await?;
        metrics::counter!("inventory_debits_total").increment(1);
        tracing::info!(%product_id, quantity, stock = product.stock_quantity, "stock debited");
        Ok(product)
    }
}
