//! Domain error types.

use common::{ProductId, UserId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
///
/// Every variant except `Store` is a recoverable, caller-visible failure.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A required input is missing or out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// The product is missing or inactive at the point of use.
    #[error("Product unavailable: {0}")]
    ProductUnavailable(ProductId),

    /// The requested quantity exceeds the available stock.
    #[error("Product {product_id} is out of stock: requested {requested}, available {available}")]
    OutOfStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The per-product cart cap would be exceeded.
    #[error("Maximum quantity of {max} exceeded for product {product_id}: requested {requested}")]
    MaximumQuantityExceeded {
        product_id: ProductId,
        requested: u64,
        max: u32,
    },

    /// Checkout was attempted on a cart with no lines.
    #[error("Cart of user {0} is empty")]
    EmptyCart(UserId),

    /// A cart line is malformed.
    #[error("Invalid cart: {0}")]
    InvalidCart(String),

    /// A debit would drive stock below zero.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A status change is not allowed by the lifecycle table.
    #[error("Invalid {kind} transition from {from} to {to}")]
    InvalidStatusTransition {
        kind: &'static str,
        from: String,
        to: String,
    },

    /// Persistence failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    pub(crate) fn product_not_found(id: ProductId) -> Self {
        DomainError::NotFound {
            entity: "Product",
            id: id.as_i64(),
        }
    }
}

/// Convenience type alias for domain results.
pub type Result<T> = std::result::Result<T, DomainError>;
