//! Administrative catalog operations.

use common::{NewProduct, Product, ProductId, ProductUpdate, Version};
use store::{ProductStore, StoreError};

use crate::error::{DomainError, Result};

/// Product administration. Never changes stock; restocking goes through
/// [`InventoryLedger::credit`](crate::InventoryLedger::credit).
#[derive(Clone)]
pub struct CatalogService<S: ProductStore> {
    store: S,
}

impl<S: ProductStore> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds a product to the catalog.
    #[tracing::instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_product(&self, product: NewProduct) -> Result<Product> {
        if product.name.trim().is_empty() {
            return Err(DomainError::InvalidArgument(
                "product name must not be empty".to_string(),
            ));
        }
        if product.price.is_negative() {
            return Err(DomainError::InvalidArgument(
                "product price must not be negative".to_string(),
            ));
        }

        let product = self.store.insert_product(product).await?;
        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| DomainError::product_not_found(id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_active_products(&self) -> Result<Vec<Product>> {
        Ok(self.store.list_products(true).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_all_products(&self) -> Result<Vec<Product>> {
        Ok(self.store.list_products(false).await?)
    }

    /// Products whose stock is strictly below `threshold`.
    #[tracing::instrument(skip(self))]
    pub async fn low_stock_products(&self, threshold: u32) -> Result<Vec<Product>> {
        Ok(self.store.list_low_stock(threshold).await?)
    }

    /// Applies an administrative update if `expected` is still the stored
    /// version. A stale version surfaces as `Store(ConcurrentModification)`.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
        expected: Version,
    ) -> Result<Product> {
        if update.name.trim().is_empty() {
            return Err(DomainError::InvalidArgument(
                "product name must not be empty".to_string(),
            ));
        }
        if update.price.is_negative() {
            return Err(DomainError::InvalidArgument(
                "product price must not be negative".to_string(),
            ));
        }

        match self.store.update_product(id, update, expected).await {
            Ok(product) => {
                tracing::info!(product_id = %id, version = %product.version, "product updated");
                Ok(product)
            }
            Err(StoreError::NotFound { .. }) => Err(DomainError::product_not_found(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Flips the active flag off. Products are never deleted.
    #[tracing::instrument(skip(self))]
    pub async fn deactivate_product(&self, id: ProductId) -> Result<Product> {
        let product = self.get_product(id).await?;
        if !product.active {
            return Ok(product);
        }

        let mut update = ProductUpdate::from(&product);
        update.active = false;
        self.update_product(id, update, product.version).await
    }
}
