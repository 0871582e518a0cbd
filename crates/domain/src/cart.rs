//! Per-user shopping carts with a per-product quantity cap.

use common::{Cart, CartItem, Money, ProductId, UserId};
use store::{CartStore, ProductStore};

use crate::error::{DomainError, Result};

/// Default per-product cap.
pub const DEFAULT_MAX_QUANTITY: u32 = 10;

/// Cart limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartConfig {
    /// Maximum quantity of a single product in one cart.
    pub max_quantity_per_product: u32,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            max_quantity_per_product: DEFAULT_MAX_QUANTITY,
        }
    }
}

/// Cart operations keyed by user or guest session id.
///
/// Carts carry no version counter; concurrent writes to the same cart are
/// last-write-wins.
#[derive(Clone)]
pub struct CartService<S> {
    store: S,
    config: CartConfig,
}

impl<S> CartService<S>
where
    S: ProductStore + CartStore,
{
    pub fn new(store: S) -> Self {
        Self::with_config(store, CartConfig::default())
    }

    pub fn with_config(store: S, config: CartConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> CartConfig {
        self.config
    }

    /// Returns the user's cart, creating and persisting an empty one on
    /// first access.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<Cart> {
        if let Some(cart) = self.store.get_cart(user_id).await? {
            return Ok(cart);
        }
        let cart = Cart::new(user_id);
        self.store.save_cart(&cart).await?;
        tracing::debug!(%user_id, "cart created");
        Ok(cart)
    }

    /// Adds `quantity` units of a product.
    ///
    /// Adding a product already in the cart increments its line. The stock
    /// check applies to the requested quantity, the cap to the resulting
    /// line quantity. A failed add leaves the cart untouched.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        if quantity == 0 {
            return Err(DomainError::InvalidArgument(
                "quantity must be positive".to_string(),
            ));
        }

        self.check_stock(product_id, quantity).await?;

        let mut cart = self.get_cart(user_id).await?;
        let existing = cart.line(product_id).map_or(0, |line| line.quantity);
        let requested = u64::from(existing) + u64::from(quantity);
        let max = self.config.max_quantity_per_product;
        if requested > u64::from(max) {
            return Err(DomainError::MaximumQuantityExceeded {
                product_id,
                requested,
                max,
            });
        }

        match cart.line_mut(product_id) {
            Some(line) => line.quantity += quantity,
            None => cart.items.push(CartItem {
                product_id,
                quantity,
            }),
        }

        self.store.save_cart(&cart).await?;
        tracing::info!(%user_id, %product_id, quantity, "item added to cart");
        Ok(cart)
    }

    /// Overwrites the quantity of a line. Zero or negative removes it.
    ///
    /// Updating a product that has no line in the cart changes nothing.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<Cart> {
        let mut cart = self.get_cart(user_id).await?;

        let Ok(quantity) = u32::try_from(quantity) else {
            return self.remove_line(cart, product_id).await;
        };
        if quantity == 0 {
            return self.remove_line(cart, product_id).await;
        }
        if cart.line(product_id).is_none() {
            return Ok(cart);
        }

        self.check_stock(product_id, quantity).await?;
        let max = self.config.max_quantity_per_product;
        if quantity > max {
            return Err(DomainError::MaximumQuantityExceeded {
                product_id,
                requested: u64::from(quantity),
                max,
            });
        }

        if let Some(line) = cart.line_mut(product_id) {
            line.quantity = quantity;
        }
        self.store.save_cart(&cart).await?;
        tracing::info!(%user_id, %product_id, quantity, "cart quantity updated");
        Ok(cart)
    }

    /// Removes a product's line. Succeeds even if there is none.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, user_id: UserId, product_id: ProductId) -> Result<Cart> {
        let cart = self.get_cart(user_id).await?;
        self.remove_line(cart, product_id).await
    }

    /// Empties the cart. Succeeds even if the user has no cart yet.
    #[tracing::instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: UserId) -> Result<()> {
        let Some(mut cart) = self.store.get_cart(user_id).await? else {
            return Ok(());
        };
        if cart.is_empty() {
            return Ok(());
        }
        cart.clear();
        self.store.save_cart(&cart).await?;
        tracing::info!(%user_id, "cart cleared");
        Ok(())
    }

    /// Moves every line of the source cart into the target cart.
    ///
    /// Lines for the same product add up, clamped to the per-product cap.
    /// The source cart is emptied and both carts are saved. Merging a cart
    /// into itself changes nothing.
    #[tracing::instrument(skip(self))]
    pub async fn merge_carts(&self, source_user: UserId, target_user: UserId) -> Result<Cart> {
        if source_user == target_user {
            return self.get_cart(target_user).await;
        }

        let mut target = self.get_cart(target_user).await?;
        let Some(mut source) = self.store.get_cart(source_user).await? else {
            return Ok(target);
        };
        if source.is_empty() {
            return Ok(target);
        }

        let max = self.config.max_quantity_per_product;
        for item in &source.items {
            match target.line_mut(item.product_id) {
                Some(line) => {
                    let merged = line.quantity.saturating_add(item.quantity);
                    if merged > max {
                        tracing::warn!(
                            product_id = %item.product_id,
                            merged,
                            max,
                            "merged quantity clamped to cart maximum"
                        );
                    }
                    line.quantity = merged.min(max);
                }
                None => target.items.push(*item),
            }
        }

        source.clear();
        self.store.save_cart(&target).await?;
        self.store.save_cart(&source).await?;
        tracing::info!(%source_user, %target_user, lines = target.items.len(), "carts merged");
        Ok(target)
    }

    /// Sum of live product price times quantity. Lines whose product no
    /// longer exists contribute nothing.
    #[tracing::instrument(skip(self))]
    pub async fn cart_total(&self, user_id: UserId) -> Result<Money> {
        let cart = self.get_cart(user_id).await?;
        let mut total = Money::zero();
        for item in &cart.items {
            if let Some(product) = self.store.get_product(item.product_id).await? {
                total = product
                    .price
                    .checked_multiply(item.quantity)
                    .and_then(|line| total.checked_add(line))
                    .ok_or_else(|| {
                        DomainError::InvalidArgument(
                            "cart total exceeds the representable amount".to_string(),
                        )
                    })?;
            }
        }
        Ok(total)
    }

    async fn check_stock(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        let product = self
            .store
            .get_product(product_id)
            .await?
            .filter(|p| p.active)
            .ok_or(DomainError::ProductUnavailable(product_id))?;

        if product.stock_quantity < quantity {
            return Err(DomainError::OutOfStock {
                product_id,
                requested: quantity,
                available: product.stock_quantity,
            });
        }
        Ok(())
    }

    async fn remove_line(&self, mut cart: Cart, product_id: ProductId) -> Result<Cart> {
        if cart.remove(product_id) {
            self.store.save_cart(&cart).await?;
            tracing::info!(user_id = %cart.user_id, %product_id, "item removed from cart");
        }
        Ok(cart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::NewProduct;
    use store::InMemoryStore;

    async fn setup(stock: u32) -> (CartService<InMemoryStore>, ProductId) {
        let store = InMemoryStore::new();
        let product = store
            .insert_product(NewProduct::new("Mug", Money::from_cents(800), stock))
            .await
            .unwrap();
        (CartService::new(store), product.id)
    }

    #[tokio::test]
    async fn test_get_cart_is_lazy_and_persisted() {
        let (carts, _) = setup(5).await;
        let user = UserId::new(1);

        let cart = carts.get_cart(user).await.unwrap();
        assert!(cart.is_empty());
        assert!(carts.store.get_cart(user).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cart_total_overflow_is_an_error() {
        let store = InMemoryStore::new();
        let yacht = store
            .insert_product(NewProduct::new("Yacht", Money::from_cents(i64::MAX / 2), 5))
            .await
            .unwrap();
        let carts = CartService::new(store);
        let user = UserId::new(1);
        carts.add_item(user, yacht.id, 3).await.unwrap();

        let err = carts.cart_total(user).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_add_twice_merges_line() {
        let (carts, mug) = setup(20).await;
        let user = UserId::new(1);

        carts.add_item(user, mug, 2).await.unwrap();
        let cart = carts.add_item(user, mug, 3).await.unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 5);
    }

    #[tokio::test]
    async fn test_cap_applies_to_sum() {
        let (carts, mug) = setup(20).await;
        let user = UserId::new(1);

        carts.add_item(user, mug, 8).await.unwrap();
        let err = carts.add_item(user, mug, 3).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::MaximumQuantityExceeded {
                requested: 11,
                max: 10,
                ..
            }
        ));

        let cart = carts.get_cart(user).await.unwrap();
        assert_eq!(cart.items[0].quantity, 8);
    }

    #[tokio::test]
    async fn test_add_checks_stock_and_availability() {
        let (carts, mug) = setup(2).await;
        let user = UserId::new(1);

        let err = carts.add_item(user, mug, 3).await.unwrap_err();
        assert!(matches!(err, DomainError::OutOfStock { available: 2, .. }));

        let err = carts.add_item(user, ProductId::new(99), 1).await.unwrap_err();
        assert!(matches!(err, DomainError::ProductUnavailable(_)));

        let err = carts.add_item(user, mug, 0).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_update_quantity() {
        let (carts, mug) = setup(20).await;
        let user = UserId::new(1);
        carts.add_item(user, mug, 2).await.unwrap();

        let cart = carts.update_quantity(user, mug, 6).await.unwrap();
        assert_eq!(cart.items[0].quantity, 6);

        let err = carts.update_quantity(user, mug, 11).await.unwrap_err();
        assert!(matches!(err, DomainError::MaximumQuantityExceeded { .. }));

        let err = carts.update_quantity(user, mug, 21).await.unwrap_err();
        assert!(matches!(err, DomainError::OutOfStock { .. }));

        let cart = carts.update_quantity(user, mug, -1).await.unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_line_is_noop() {
        let (carts, mug) = setup(20).await;
        let cart = carts.update_quantity(UserId::new(1), mug, 4).await.unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_remove_and_clear_are_unconditional() {
        let (carts, mug) = setup(20).await;
        let user = UserId::new(1);

        carts.remove_item(user, mug).await.unwrap();
        carts.clear_cart(UserId::new(2)).await.unwrap();

        carts.add_item(user, mug, 1).await.unwrap();
        carts.clear_cart(user).await.unwrap();
        assert!(carts.get_cart(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cart_total_uses_live_price() {
        let (carts, mug) = setup(20).await;
        let user = UserId::new(1);
        carts.add_item(user, mug, 3).await.unwrap();

        assert_eq!(carts.cart_total(user).await.unwrap(), Money::from_cents(2400));
    }

    #[tokio::test]
    async fn test_merge_into_self_is_noop() {
        let (carts, mug) = setup(20).await;
        let user = UserId::new(1);
        carts.add_item(user, mug, 3).await.unwrap();

        let cart = carts.merge_carts(user, user).await.unwrap();
        assert_eq!(cart.items[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_merge_clamps_to_cap() {
        let (carts, mug) = setup(20).await;
        let guest = UserId::new(-5);
        let user = UserId::new(1);
        carts.add_item(guest, mug, 7).await.unwrap();
        carts.add_item(user, mug, 6).await.unwrap();

        let merged = carts.merge_carts(guest, user).await.unwrap();
        assert_eq!(merged.items[0].quantity, 10);
        assert!(carts.get_cart(guest).await.unwrap().is_empty());
    }
}
