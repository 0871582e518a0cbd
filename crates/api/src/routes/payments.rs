//! Payment method discovery.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use store::Store;

use crate::state::AppState;

#[derive(Serialize)]
pub struct PaymentMethodsResponse {
    pub methods: Vec<String>,
}

/// GET /api/payments/methods: registered methods, normalized and sorted.
pub async fn methods<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<PaymentMethodsResponse> {
    Json(PaymentMethodsResponse {
        methods: state.workflow.gateway().available_methods(),
    })
}
