//! Shopping cart endpoints. Every route acts on the caller's own cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Cart, ProductId, UserId};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: i64,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateQuantityRequest {
    /// Zero or negative removes the line.
    pub quantity: i32,
}

#[derive(Deserialize)]
pub struct MergeRequest {
    pub guest_id: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartResponse {
    pub user_id: i64,
    pub items: Vec<CartItemResponse>,
    pub total_quantity: u64,
    pub total_cents: i64,
}

#[derive(Serialize)]
pub struct CartItemResponse {
    pub product_id: i64,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct CheckoutPreviewResponse {
    pub valid: bool,
    pub estimated_total_cents: i64,
    pub line_count: usize,
}

async fn respond<S: Store>(state: &AppState<S>, cart: Cart) -> Result<Json<CartResponse>, ApiError> {
    let total = state.carts.cart_total(cart.user_id).await?;
    Ok(Json(CartResponse {
        user_id: cart.user_id.as_i64(),
        total_quantity: cart.total_quantity(),
        items: cart
            .items
            .iter()
            .map(|item| CartItemResponse {
                product_id: item.product_id.as_i64(),
                quantity: item.quantity,
            })
            .collect(),
        total_cents: total.cents(),
    }))
}

// -- Handlers --

/// GET /api/cart
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.get_cart(caller.user_id).await?;
    respond(&state, cart).await
}

/// POST /api/cart/items
#[tracing::instrument(skip(state, req))]
pub async fn add_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .carts
        .add_item(caller.user_id, ProductId::new(req.product_id), req.quantity)
        .await?;
    respond(&state, cart).await
}

/// PUT /api/cart/items/{product_id}
#[tracing::instrument(skip(state, req))]
pub async fn update_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(product_id): Path<i64>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .carts
        .update_quantity(caller.user_id, ProductId::new(product_id), req.quantity)
        .await?;
    respond(&state, cart).await
}

/// DELETE /api/cart/items/{product_id}
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(product_id): Path<i64>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .carts
        .remove_item(caller.user_id, ProductId::new(product_id))
        .await?;
    respond(&state, cart).await
}

/// DELETE /api/cart
#[tracing::instrument(skip(state))]
pub async fn clear<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
) -> Result<StatusCode, ApiError> {
    state.carts.clear_cart(caller.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/cart/merge: folds a guest cart into the caller's cart.
///
/// Any guest session may be merged. A registered user's cart only by that
/// user or an admin.
#[tracing::instrument(skip(state, req))]
pub async fn merge<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Json(req): Json<MergeRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let source = UserId::new(req.guest_id);
    if !source.is_guest() {
        caller.require_owner_or_admin(source)?;
    }

    let cart = state.carts.merge_carts(source, caller.user_id).await?;
    respond(&state, cart).await
}

/// POST /api/cart/checkout/validate: preflight without placing an order.
#[tracing::instrument(skip(state))]
pub async fn validate<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
) -> Result<Json<CheckoutPreviewResponse>, ApiError> {
    let validated = state.checkout.preflight(caller.user_id).await?;
    Ok(Json(CheckoutPreviewResponse {
        valid: true,
        estimated_total_cents: validated.estimated_total.cents(),
        line_count: validated.cart.items.len(),
    }))
}
