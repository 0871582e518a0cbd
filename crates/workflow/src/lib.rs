//! Order workflow for the order-management backend.
//!
//! This crate provides:
//! - `PaymentGateway` dispatching to named `PaymentStrategy` implementations
//! - `Notifier` fanning committed orders out to `OrderObserver`s
//! - `OrderWorkflow`, which places orders and owns their status transitions

pub mod engine;
pub mod error;
pub mod notify;
pub mod payment;

pub use engine::{ORDER_PAID_MESSAGE, OrderLine, OrderRequest, OrderWorkflow};
pub use error::{PaymentError, Result, WorkflowError};
pub use notify::{
    LoggingEmailObserver, NotificationError, Notifier, OrderObserver, RecordingObserver,
};
pub use payment::{
    BankTransferStrategy, CreditCardStrategy, InMemoryPaymentStrategy, PayPalStrategy,
    PaymentDetails, PaymentGateway, PaymentStrategy, normalize_method,
};
