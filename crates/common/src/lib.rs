//! Shared types for the order-management backend.
//!
//! Identifiers, money, the optimistic-lock version counter, the order and
//! payment status machines, and the records persisted by the store.

pub mod model;
pub mod money;
pub mod status;
pub mod types;

pub use model::{Cart, CartItem, NewOrder, NewProduct, Order, OrderItem, Product, ProductUpdate};
pub use money::Money;
pub use status::{OrderStatus, ParseStatusError, PaymentStatus};
pub use types::{OrderId, ProductId, UserId, Version};
