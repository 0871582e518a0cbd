//! Order placement, lookup and administrative status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use common::{Order, OrderId, OrderStatus, PaymentStatus};
use serde::{Deserialize, Serialize};
use store::Store;
use workflow::{OrderLine, OrderRequest, PaymentDetails};

use crate::auth::Caller;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLine>,
    pub shipping_address: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Deserialize)]
pub struct PaidOrderRequest {
    pub items: Vec<OrderLine>,
    pub shipping_address: Option<String>,
    pub payment_method: String,
    #[serde(default)]
    pub payment_details: PaymentDetails,
}

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: Option<String>,
    pub payment_method: Option<String>,
    pub payment_details: Option<PaymentDetails>,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct PaymentStatusRequest {
    pub payment_status: String,
}

#[derive(Deserialize)]
pub struct RefundRequest {
    #[serde(default)]
    pub payment_details: PaymentDetails,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub size: usize,
}

fn default_page_size() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeParams {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SinceParams {
    /// Defaults to 24 hours ago.
    pub since: Option<DateTime<Utc>>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: i64,
    pub user_id: i64,
    pub order_date: String,
    pub status: String,
    pub payment_status: String,
    pub total_cents: i64,
    pub payment_method: Option<String>,
    pub shipping_address: Option<String>,
    pub transaction_id: Option<String>,
    pub items: Vec<OrderItemResponse>,
    pub version: i64,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: i64,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

#[derive(Serialize)]
pub struct OrderCountResponse {
    pub since: String,
    pub count: u64,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.as_i64(),
            user_id: order.user_id.as_i64(),
            order_date: order.order_date.to_rfc3339(),
            status: order.status.to_string(),
            payment_status: order.payment_status.to_string(),
            total_cents: order.total_amount.cents(),
            payment_method: order.payment_method,
            shipping_address: order.shipping_address,
            transaction_id: order.transaction_id,
            items: order
                .items
                .into_iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.as_i64(),
                    product_name: item.product_name,
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                    subtotal_cents: item.subtotal.cents(),
                })
                .collect(),
            version: order.version.as_i64(),
        }
    }
}

fn to_responses(orders: Vec<Order>) -> Vec<OrderResponse> {
    orders.into_iter().map(OrderResponse::from).collect()
}

fn parse_order_status(raw: &str) -> Result<OrderStatus, ApiError> {
    raw.parse()
        .map_err(|e: common::ParseStatusError| ApiError::BadRequest(e.to_string()))
}

fn parse_payment_status(raw: &str) -> Result<PaymentStatus, ApiError> {
    raw.parse()
        .map_err(|e: common::ParseStatusError| ApiError::BadRequest(e.to_string()))
}

// -- Handlers --

/// POST /api/orders: places an unpaid order for the caller.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let request = OrderRequest {
        user_id: caller.user_id,
        items: req.items,
        shipping_address: req.shipping_address,
        payment_method: req.payment_method,
    };
    let order = state.workflow.place_order(request).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// POST /api/orders/with-payment: places and charges an order.
#[tracing::instrument(skip(state, req))]
pub async fn create_with_payment<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Json(req): Json<PaidOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let mut request = OrderRequest::new(caller.user_id, req.items).payment_method(req.payment_method);
    request.shipping_address = req.shipping_address;

    let order = state
        .workflow
        .place_order_with_payment(request, req.payment_details)
        .await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// POST /api/orders/checkout: turns the caller's cart into an order.
#[tracing::instrument(skip(state, req))]
pub async fn checkout<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state
        .workflow
        .place_order_from_cart(
            caller.user_id,
            req.shipping_address,
            req.payment_method,
            req.payment_details,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /api/orders/{id}: the owner or an admin.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.workflow.get_order(OrderId::new(id)).await?;
    caller.require_owner_or_admin(order.user_id)?;
    Ok(Json(order.into()))
}

/// GET /api/orders/my-orders?page=&size=: newest first.
#[tracing::instrument(skip(state))]
pub async fn my_orders<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state
        .workflow
        .orders_for_user(caller.user_id, params.page, params.size)
        .await?;
    Ok(Json(to_responses(orders)))
}

/// GET /api/orders
#[tracing::instrument(skip(state))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    caller.require_admin()?;
    let orders = state.workflow.all_orders().await?;
    Ok(Json(to_responses(orders)))
}

/// GET /api/orders/by-status?status=SHIPPED
#[tracing::instrument(skip(state))]
pub async fn by_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Query(params): Query<StatusParams>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    caller.require_admin()?;
    let status = parse_order_status(&params.status)?;
    let orders = state.workflow.orders_by_status(status).await?;
    Ok(Json(to_responses(orders)))
}

/// GET /api/orders/by-date?start=&end=: RFC 3339 bounds, both inclusive.
#[tracing::instrument(skip(state))]
pub async fn by_date<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Query(params): Query<DateRangeParams>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    caller.require_admin()?;
    let orders = state
        .workflow
        .orders_in_range(params.start, params.end)
        .await?;
    Ok(Json(to_responses(orders)))
}

/// GET /api/orders/count?since=
#[tracing::instrument(skip(state))]
pub async fn count<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Query(params): Query<SinceParams>,
) -> Result<Json<OrderCountResponse>, ApiError> {
    caller.require_admin()?;
    let since = params
        .since
        .unwrap_or_else(|| Utc::now() - Duration::hours(24));
    let count = state.workflow.count_recent_orders(since).await?;
    Ok(Json(OrderCountResponse {
        since: since.to_rfc3339(),
        count,
    }))
}

/// PUT /api/orders/{id}/status
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    caller.require_admin()?;
    let status = parse_order_status(&req.status)?;
    let order = state
        .workflow
        .update_status(OrderId::new(id), status)
        .await?;
    Ok(Json(order.into()))
}

/// PUT /api/orders/{id}/payment
#[tracing::instrument(skip(state, req))]
pub async fn update_payment<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<i64>,
    Json(req): Json<PaymentStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    caller.require_admin()?;
    let payment_status = parse_payment_status(&req.payment_status)?;
    let order = state
        .workflow
        .update_payment_status(OrderId::new(id), payment_status)
        .await?;
    Ok(Json(order.into()))
}

/// POST /api/orders/{id}/refund
#[tracing::instrument(skip(state, req))]
pub async fn refund<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<i64>,
    Json(req): Json<RefundRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    caller.require_admin()?;
    let order = state
        .workflow
        .refund_order(OrderId::new(id), req.payment_details)
        .await?;
    Ok(Json(order.into()))
}
