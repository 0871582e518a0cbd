use async_trait::async_trait;
use common::Money;
use uuid::Uuid;

use super::{PaymentDetails, PaymentStrategy, mask_card_number, present};
use crate::error::PaymentError;

const METHOD: &str = "Credit Card";

/// Card payments. Needs card number, expiry date and CVV.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreditCardStrategy;

#[async_trait]
impl PaymentStrategy for CreditCardStrategy {
    fn method_name(&self) -> &str {
        METHOD
    }

    fn validate_details(&self, details: &PaymentDetails) -> bool {
        present(&details.card_number) && present(&details.expiry_date) && present(&details.cvv)
    }

    async fn process_payment(
        &self,
        amount: Money,
        details: &PaymentDetails,
    ) -> Result<String, PaymentError> {
        if !self.validate_details(details) {
            return Err(PaymentError::failed(METHOD, "invalid credit card payment details"));
        }

        let card = mask_card_number(details.card_number.as_deref().unwrap_or_default());
        let transaction_id = format!("CC-{}", Uuid::new_v4());
        tracing::info!(%amount, %card, %transaction_id, "credit card charged");
        Ok(transaction_id)
    }

    async fn refund_payment(
        &self,
        transaction_id: &str,
        amount: Money,
        _details: &PaymentDetails,
    ) -> Result<String, PaymentError> {
        let refund_id = format!("REF-{}", Uuid::new_v4());
        tracing::info!(%amount, transaction_id, %refund_id, "credit card refunded");
        Ok(refund_id)
    }
}
