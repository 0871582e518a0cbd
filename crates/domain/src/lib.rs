//! Domain layer for the order-management backend.
//!
//! This crate provides:
//! - `InventoryLedger`, the only path that changes product stock
//! - `CatalogService` for product administration
//! - `CartService` with the per-product quantity cap
//! - `CheckoutValidator` for preflight against live stock
//! - `StatusPolicy` deciding which status changes are accepted

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod error;
pub mod ledger;
pub mod policy;

pub use cart::{CartConfig, CartService, DEFAULT_MAX_QUANTITY};
pub use catalog::CatalogService;
pub use checkout::{CheckoutValidator, ValidatedCart};
pub use error::{DomainError, Result};
pub use ledger::InventoryLedger;
pub use policy::StatusPolicy;
