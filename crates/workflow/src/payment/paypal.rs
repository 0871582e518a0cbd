use async_trait::async_trait;
use common::Money;
use uuid::Uuid;

use super::{PaymentDetails, PaymentStrategy, present};
use crate::error::PaymentError;

const METHOD: &str = "PayPal";

/// PayPal wallet payments. Needs the account email.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayPalStrategy;

#[async_trait]
impl PaymentStrategy for PayPalStrategy {
    fn method_name(&self) -> &str {
        METHOD
    }

    fn validate_details(&self, details: &PaymentDetails) -> bool {
        present(&details.paypal_email)
    }

    async fn process_payment(
        &self,
        amount: Money,
        details: &PaymentDetails,
    ) -> Result<String, PaymentError> {
        if !self.validate_details(details) {
            return Err(PaymentError::failed(METHOD, "invalid PayPal payment details"));
        }

        let transaction_id = format!("PP-{}", Uuid::new_v4());
        tracing::info!(
            %amount,
            account = details.paypal_email.as_deref().unwrap_or_default(),
            %transaction_id,
            "paypal charged"
        );
        Ok(transaction_id)
    }

    async fn refund_payment(
        &self,
        transaction_id: &str,
        amount: Money,
        _details: &PaymentDetails,
    ) -> Result<String, PaymentError> {
        let refund_id = format!("PREF-{}", Uuid::new_v4());
        tracing::info!(%amount, transaction_id, %refund_id, "paypal refunded");
        Ok(refund_id)
    }
}
