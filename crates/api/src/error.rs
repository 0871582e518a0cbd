//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use store::StoreError;
use workflow::{PaymentError, WorkflowError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// No caller identity on the request.
    Unauthorized(String),
    /// The caller lacks the required role.
    Forbidden(String),
    /// Domain rule violation.
    Domain(DomainError),
    /// Workflow error.
    Workflow(WorkflowError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Workflow(err) => workflow_error_to_response(err),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    let status = match &err {
        DomainError::InvalidArgument(_)
        | DomainError::EmptyCart(_)
        | DomainError::InvalidCart(_)
        | DomainError::MaximumQuantityExceeded { .. } => StatusCode::BAD_REQUEST,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::ProductUnavailable(_)
        | DomainError::OutOfStock { .. }
        | DomainError::InsufficientStock { .. }
        | DomainError::InvalidStatusTransition { .. } => StatusCode::CONFLICT,
        DomainError::Store(store_err) => store_error_status(store_err),
    };
    (status, err.to_string())
}

fn store_error_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::ConcurrentModification { .. } => StatusCode::CONFLICT,
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn workflow_error_to_response(err: WorkflowError) -> (StatusCode, String) {
    match err {
        WorkflowError::Domain(domain_err) => domain_error_to_response(domain_err),
        WorkflowError::Payment(ref payment_err) => {
            let status = match payment_err {
                PaymentError::UnsupportedPaymentMethod(_) => StatusCode::BAD_REQUEST,
                PaymentError::ProcessingFailed { .. } => StatusCode::PAYMENT_REQUIRED,
            };
            (status, err.to_string())
        }
        WorkflowError::Store(ref store_err) => (store_error_status(store_err), err.to_string()),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError::Workflow(err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::Workflow(WorkflowError::Payment(err))
    }
}
