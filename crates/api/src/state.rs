//! Shared application state.

use domain::{CartService, CatalogService, CheckoutValidator, InventoryLedger};
use store::Store;
use workflow::OrderWorkflow;

/// Services shared by every handler. All of them sit on the same store.
pub struct AppState<S: Store> {
    pub store: S,
    pub catalog: CatalogService<S>,
    pub ledger: InventoryLedger<S>,
    pub carts: CartService<S>,
    pub checkout: CheckoutValidator<S>,
    pub workflow: OrderWorkflow<S>,
}
