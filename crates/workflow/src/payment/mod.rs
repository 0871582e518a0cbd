//! Pluggable payment strategies and the gateway that dispatches to them.

mod bank_transfer;
mod credit_card;
mod gateway;
mod memory;
mod paypal;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use common::Money;
use serde::Deserialize;

use crate::error::PaymentError;

pub use bank_transfer::BankTransferStrategy;
pub use credit_card::CreditCardStrategy;
pub use gateway::PaymentGateway;
pub use memory::InMemoryPaymentStrategy;
pub use paypal::PayPalStrategy;

/// Method-agnostic payment credentials.
///
/// Passed opaquely from the caller to whichever strategy is selected and
/// never persisted. Each strategy reads the fields it needs.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaymentDetails {
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,

    pub card_number: Option<String>,
    pub card_holder_name: Option<String>,
    pub expiry_date: Option<String>,
    pub cvv: Option<String>,

    pub paypal_email: Option<String>,
    pub paypal_token: Option<String>,

    pub bank_account_number: Option<String>,
    pub bank_routing_number: Option<String>,
    pub bank_name: Option<String>,

    /// Extension fields for methods registered later.
    pub additional_properties: HashMap<String, String>,
}

impl PaymentDetails {
    pub fn card(
        number: impl Into<String>,
        expiry: impl Into<String>,
        cvv: impl Into<String>,
    ) -> Self {
        Self {
            card_number: Some(number.into()),
            expiry_date: Some(expiry.into()),
            cvv: Some(cvv.into()),
            ..Default::default()
        }
    }

    pub fn paypal(email: impl Into<String>) -> Self {
        Self {
            paypal_email: Some(email.into()),
            ..Default::default()
        }
    }

    pub fn bank(
        account: impl Into<String>,
        routing: impl Into<String>,
        bank: impl Into<String>,
    ) -> Self {
        Self {
            bank_account_number: Some(account.into()),
            bank_routing_number: Some(routing.into()),
            bank_name: Some(bank.into()),
            ..Default::default()
        }
    }
}

// Credentials stay out of logs.
impl fmt::Debug for PaymentDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentDetails")
            .field("customer_id", &self.customer_id)
            .field("customer_name", &self.customer_name)
            .field("card_number", &self.card_number.as_deref().map(mask_card_number))
            .field("paypal_email", &self.paypal_email)
            .field("bank_name", &self.bank_name)
            .finish_non_exhaustive()
    }
}

/// A named, swappable payment method.
#[async_trait]
pub trait PaymentStrategy: Send + Sync {
    /// Display name, e.g. "Credit Card". The gateway registers the strategy
    /// under its normalized form.
    fn method_name(&self) -> &str;

    /// Structural check of the credentials this method needs.
    fn validate_details(&self, details: &PaymentDetails) -> bool;

    /// Charges `amount` and returns the transaction id.
    async fn process_payment(
        &self,
        amount: Money,
        details: &PaymentDetails,
    ) -> Result<String, PaymentError>;

    /// Refunds a previous charge and returns the refund id.
    async fn refund_payment(
        &self,
        transaction_id: &str,
        amount: Money,
        details: &PaymentDetails,
    ) -> Result<String, PaymentError>;
}

/// Lowercases a method name and drops spaces, dashes and underscores, so
/// "Credit Card", "CREDIT_CARD" and "creditcard" resolve alike.
pub fn normalize_method(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

pub(crate) fn present(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|v| !v.trim().is_empty())
}

pub(crate) fn mask_card_number(number: &str) -> String {
    let digits: Vec<char> = number.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() < 4 {
        return "****".to_string();
    }
    let last4: String = digits[digits.len() - 4..].iter().collect();
    format!("****-****-****-{last4}")
}
