//! Catalog endpoints. Reads are public, writes need the ADMIN role.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{Money, NewProduct, Product, ProductId, ProductUpdate, Version};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub stock_quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Version the client last read.
    pub version: i64,
}

fn default_active() -> bool {
    true
}

#[derive(Deserialize)]
pub struct RestockRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct LowStockParams {
    #[serde(default = "default_threshold")]
    pub threshold: u32,
}

fn default_threshold() -> u32 {
    5
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub stock_quantity: u32,
    pub active: bool,
    pub version: i64,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.as_i64(),
            name: product.name,
            description: product.description,
            price_cents: product.price.cents(),
            stock_quantity: product.stock_quantity,
            active: product.active,
            version: product.version.as_i64(),
        }
    }
}

fn to_responses(products: Vec<Product>) -> Vec<ProductResponse> {
    products.into_iter().map(ProductResponse::from).collect()
}

// -- Handlers --

/// GET /api/products: active products.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = state.catalog.list_active_products().await?;
    Ok(Json(to_responses(products)))
}

/// GET /api/products/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state.catalog.get_product(ProductId::new(id)).await?;
    Ok(Json(product.into()))
}

/// POST /api/products
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    caller.require_admin()?;

    let mut product = NewProduct::new(
        req.name,
        Money::from_cents(req.price_cents),
        req.stock_quantity,
    );
    product.description = req.description;

    let product = state.catalog.create_product(product).await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// PUT /api/products/{id}: stale `version` yields 409.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<i64>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    caller.require_admin()?;

    let update = ProductUpdate {
        name: req.name,
        description: req.description,
        price: Money::from_cents(req.price_cents),
        active: req.active,
    };
    let product = state
        .catalog
        .update_product(ProductId::new(id), update, Version::new(req.version))
        .await?;
    Ok(Json(product.into()))
}

/// DELETE /api/products/{id}: deactivates; products are never removed.
#[tracing::instrument(skip(state))]
pub async fn deactivate<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    caller.require_admin()?;
    state.catalog.deactivate_product(ProductId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/products/{id}/restock
#[tracing::instrument(skip(state, req))]
pub async fn restock<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<i64>,
    Json(req): Json<RestockRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    caller.require_admin()?;
    let product = state.ledger.credit(ProductId::new(id), req.quantity).await?;
    Ok(Json(product.into()))
}

/// GET /api/products/low-stock?threshold=N: stock strictly below N.
#[tracing::instrument(skip(state))]
pub async fn low_stock<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Query(params): Query<LowStockParams>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    caller.require_admin()?;
    let products = state.catalog.low_stock_products(params.threshold).await?;
    Ok(Json(to_responses(products)))
}
