//! HTTP API server for the order-management backend.
//!
//! REST endpoints for the catalog, carts and orders, with structured
//! logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{CartConfig, CartService, CatalogService, CheckoutValidator, InventoryLedger};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use workflow::{LoggingEmailObserver, Notifier, OrderWorkflow, PaymentGateway};

use config::Config;
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let api = Router::new()
        // Catalog
        .route(
            "/products",
            get(routes::products::list::<S>).post(routes::products::create::<S>),
        )
        .route("/products/low-stock", get(routes::products::low_stock::<S>))
        .route(
            "/products/{id}",
            get(routes::products::get::<S>)
                .put(routes::products::update::<S>)
                .delete(routes::products::deactivate::<S>),
        )
        .route("/products/{id}/restock", post(routes::products::restock::<S>))
        // Cart
        .route(
            "/cart",
            get(routes::cart::get::<S>).delete(routes::cart::clear::<S>),
        )
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{product_id}",
            put(routes::cart::update_item::<S>).delete(routes::cart::remove_item::<S>),
        )
        .route("/cart/merge", post(routes::cart::merge::<S>))
        .route("/cart/checkout/validate", post(routes::cart::validate::<S>))
        // Orders
        .route(
            "/orders",
            get(routes::orders::list::<S>).post(routes::orders::create::<S>),
        )
        .route(
            "/orders/with-payment",
            post(routes::orders::create_with_payment::<S>),
        )
        .route("/orders/checkout", post(routes::orders::checkout::<S>))
        .route("/orders/my-orders", get(routes::orders::my_orders::<S>))
        .route("/orders/by-status", get(routes::orders::by_status::<S>))
        .route("/orders/by-date", get(routes::orders::by_date::<S>))
        .route("/orders/count", get(routes::orders::count::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/status", put(routes::orders::update_status::<S>))
        .route("/orders/{id}/payment", put(routes::orders::update_payment::<S>))
        .route("/orders/{id}/refund", post(routes::orders::refund::<S>))
        // Payments
        .route("/payments/methods", get(routes::payments::methods::<S>));

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .nest("/api", api)
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires every service onto `store` with the built-in payment methods and
/// the logging email observer.
pub fn create_default_state<S: Store>(store: S, config: &Config) -> Arc<AppState<S>> {
    let notifier = Notifier::new().with_observer(LoggingEmailObserver);
    create_state(store, config, PaymentGateway::with_default_strategies(), notifier)
}

/// Wires every service onto `store` with the given gateway and notifier.
pub fn create_state<S: Store>(
    store: S,
    config: &Config,
    gateway: PaymentGateway,
    notifier: Notifier,
) -> Arc<AppState<S>> {
    let cart_config = CartConfig {
        max_quantity_per_product: config.cart_max_quantity,
    };
    let workflow =
        OrderWorkflow::new(store.clone(), gateway, notifier).with_policy(config.status_policy);

    Arc::new(AppState {
        catalog: CatalogService::new(store.clone()),
        ledger: InventoryLedger::new(store.clone()),
        carts: CartService::with_config(store.clone(), cart_config),
        checkout: CheckoutValidator::new(store.clone()),
        workflow,
        store,
    })
}
