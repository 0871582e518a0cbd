//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use store::{ProductStore, Store};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health: reports ok once the store answers a read.
pub async fn check<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<HealthResponse>, ApiError> {
    state
        .store
        .list_low_stock(0)
        .await
        .map_err(|e| ApiError::Internal(format!("store unavailable: {e}")))?;
    Ok(Json(HealthResponse { status: "ok" }))
}
