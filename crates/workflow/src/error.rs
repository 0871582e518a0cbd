//! Workflow error types.

use domain::DomainError;
use store::StoreError;
use thiserror::Error;

/// Errors raised by the payment gateway and its strategies.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// No strategy is registered under the requested name.
    #[error("Unsupported payment method: {0}")]
    UnsupportedPaymentMethod(String),

    /// Validation or the charge itself failed.
    #[error("Payment processing failed ({method}): {reason}")]
    ProcessingFailed { method: String, reason: String },
}

impl PaymentError {
    pub(crate) fn failed(method: impl Into<String>, reason: impl Into<String>) -> Self {
        PaymentError::ProcessingFailed {
            method: method.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur during workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Domain rule violation.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Payment error.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience type alias for workflow results.
pub type Result<T> = std::result::Result<T, WorkflowError>;
