//! Persistence boundary for the order-management backend.
//!
//! [`InMemoryStore`] backs tests and the default server. [`PostgresStore`]
//! maps the same traits onto PostgreSQL with row-level locking for stock.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryProductLock, InMemoryStore};
pub use postgres::{PgProductLock, PostgresStore};
pub use query::OrderQuery;
pub use store::{CartStore, OrderStore, ProductLock, ProductStore, Store};
