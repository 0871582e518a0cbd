//! Checkout preflight against live product state.

use common::{Cart, Money, UserId};
use store::{CartStore, ProductStore};

use crate::error::{DomainError, Result};

/// A cart that passed preflight, with its total at current prices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCart {
    pub cart: Cart,
    pub estimated_total: Money,
}

/// Checks a cart immediately before it becomes an order.
///
/// Stock is read from the store at validation time rather than taken from
/// the cart, since stock may have moved since the items were added.
#[derive(Clone)]
pub struct CheckoutValidator<S> {
    store: S,
}

impl<S> CheckoutValidator<S>
where
    S: ProductStore + CartStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validates the user's cart.
    ///
    /// Fails with `EmptyCart` if there are no lines, then per line with
    /// `InvalidCart` for a zero quantity, `ProductUnavailable` for a
    /// missing or inactive product and `OutOfStock` when live stock is
    /// below the held quantity.
    #[tracing::instrument(skip(self))]
    pub async fn preflight(&self, user_id: UserId) -> Result<ValidatedCart> {
        let cart = self
            .store
            .get_cart(user_id)
            .await?
            .filter(|cart| !cart.is_empty())
            .ok_or(DomainError::EmptyCart(user_id))?;

        let mut estimated_total = Money::zero();
        for item in &cart.items {
            if item.quantity == 0 {
                return Err(DomainError::InvalidCart(format!(
                    "line for product {} has no quantity",
                    item.product_id
                )));
            }

            let product = self
                .store
                .get_product(item.product_id)
                .await?
                .filter(|p| p.active)
                .ok_or(DomainError::ProductUnavailable(item.product_id))?;

            if product.stock_quantity < item.quantity {
                return Err(DomainError::OutOfStock {
                    product_id: item.product_id,
                    requested: item.quantity,
                    available: product.stock_quantity,
                });
            }

            estimated_total = product
                .price
                .checked_multiply(item.quantity)
                .and_then(|line| estimated_total.checked_add(line))
                .ok_or_else(|| {
                    DomainError::InvalidCart(
                        "cart total exceeds the representable amount".to_string(),
                    )
                })?;
        }

        tracing::debug!(%user_id, lines = cart.items.len(), %estimated_total, "cart passed preflight");
        Ok(ValidatedCart {
            cart,
            estimated_total,
        })
    }
}
