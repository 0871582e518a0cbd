use async_trait::async_trait;
use common::Money;
use uuid::Uuid;

use super::{PaymentDetails, PaymentStrategy, present};
use crate::error::PaymentError;

const METHOD: &str = "Bank Transfer";

/// Direct bank transfers. Needs account number, routing number and bank name.
#[derive(Debug, Clone, Copy, Default)]
pub struct BankTransferStrategy;

#[async_trait]
impl PaymentStrategy for BankTransferStrategy {
    fn method_name(&self) -> &str {
        METHOD
    }

    fn validate_details(&self, details: &PaymentDetails) -> bool {
        present(&details.bank_account_number)
            && present(&details.bank_routing_number)
            && present(&details.bank_name)
    }

    async fn process_payment(
        &self,
        amount: Money,
        details: &PaymentDetails,
    ) -> Result<String, PaymentError> {
        if !self.validate_details(details) {
            return Err(PaymentError::failed(METHOD, "invalid bank transfer details"));
        }

        let transaction_id = format!("BT-{}", Uuid::new_v4());
        tracing::info!(
            %amount,
            bank = details.bank_name.as_deref().unwrap_or_default(),
            %transaction_id,
            "bank transfer initiated"
        );
        Ok(transaction_id)
    }

    async fn refund_payment(
        &self,
        transaction_id: &str,
        amount: Money,
        _details: &PaymentDetails,
    ) -> Result<String, PaymentError> {
        let refund_id = format!("BTREF-{}", Uuid::new_v4());
        tracing::info!(%amount, transaction_id, %refund_id, "bank transfer refunded");
        Ok(refund_id)
    }
}
