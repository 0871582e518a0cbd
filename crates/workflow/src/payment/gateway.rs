use std::collections::HashMap;
use std::sync::Arc;

use common::Money;

use super::{
    BankTransferStrategy, CreditCardStrategy, PayPalStrategy, PaymentDetails, PaymentStrategy,
    normalize_method,
};
use crate::error::PaymentError;

/// Resolves a payment method name to its strategy and invokes it.
///
/// New methods register by name; the gateway itself never changes.
#[derive(Clone, Default)]
pub struct PaymentGateway {
    strategies: HashMap<String, Arc<dyn PaymentStrategy>>,
}

impl PaymentGateway {
    /// Creates a gateway with no methods registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gateway with credit card, PayPal and bank transfer.
    pub fn with_default_strategies() -> Self {
        let mut gateway = Self::new();
        gateway.register(CreditCardStrategy);
        gateway.register(PayPalStrategy);
        gateway.register(BankTransferStrategy);
        gateway
    }

    /// Registers a strategy under its normalized method name, replacing any
    /// strategy previously registered under the same name.
    pub fn register<P: PaymentStrategy + 'static>(&mut self, strategy: P) {
        self.register_arc(Arc::new(strategy));
    }

    pub fn register_arc(&mut self, strategy: Arc<dyn PaymentStrategy>) {
        let key = normalize_method(strategy.method_name());
        tracing::debug!(method = %key, "payment method registered");
        self.strategies.insert(key, strategy);
    }

    /// Normalized names of the registered methods, sorted.
    pub fn available_methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.strategies.keys().cloned().collect();
        methods.sort();
        methods
    }

    pub fn supports(&self, method: &str) -> bool {
        self.strategies.contains_key(&normalize_method(method))
    }

    fn resolve(&self, method: &str) -> Result<(String, &Arc<dyn PaymentStrategy>), PaymentError> {
        let key = normalize_method(method);
        match self.strategies.get(&key) {
            Some(strategy) => Ok((key, strategy)),
            None => Err(PaymentError::UnsupportedPaymentMethod(method.to_string())),
        }
    }

    /// Checks the credentials against the method's requirements.
    pub fn validate_details(
        &self,
        method: &str,
        details: &PaymentDetails,
    ) -> Result<bool, PaymentError> {
        let (_, strategy) = self.resolve(method)?;
        Ok(strategy.validate_details(details))
    }

    /// Charges `amount` through the named method and returns the
    /// transaction id.
    #[tracing::instrument(skip(self, details))]
    pub async fn charge(
        &self,
        method: &str,
        amount: Money,
        details: &PaymentDetails,
    ) -> Result<String, PaymentError> {
        let (key, strategy) = self.resolve(method)?;

        if amount.is_negative() {
            return Err(PaymentError::failed(key, format!("negative amount {amount}")));
        }

        match strategy.process_payment(amount, details).await {
            Ok(transaction_id) => {
                metrics::counter!("payments_processed_total", "method" => key).increment(1);
                Ok(transaction_id)
            }
            Err(e) => {
                metrics::counter!("payments_failed_total", "method" => key.clone()).increment(1);
                tracing::warn!(method = %key, error = %e, "payment failed");
                Err(e)
            }
        }
    }

    /// Refunds a previous charge and returns the refund id.
    #[tracing::instrument(skip(self, details))]
    pub async fn refund(
        &self,
        method: &str,
        transaction_id: &str,
        amount: Money,
        details: &PaymentDetails,
    ) -> Result<String, PaymentError> {
        let (key, strategy) = self.resolve(method)?;

        if amount.is_negative() {
            return Err(PaymentError::failed(key, format!("negative amount {amount}")));
        }

        strategy.refund_payment(transaction_id, amount, details).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::InMemoryPaymentStrategy;

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let gateway = PaymentGateway::with_default_strategies();
        let details = PaymentDetails::card("4111111111111111", "12/30", "123");

        for name in ["creditcard", "Credit Card", "CREDIT_CARD", "credit-card"] {
            let id = gateway
                .charge(name, Money::from_cents(500), &details)
                .await
                .unwrap();
            assert!(id.starts_with("CC-"));
        }
    }

    #[tokio::test]
    async fn test_unknown_method_invokes_nothing() {
        let mut gateway = PaymentGateway::new();
        let card = InMemoryPaymentStrategy::new("creditcard");
        let paypal = InMemoryPaymentStrategy::new("paypal");
        gateway.register(card.clone());
        gateway.register(paypal.clone());

        let err = gateway
            .charge("bitcoin", Money::from_cents(500), &PaymentDetails::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::UnsupportedPaymentMethod(m) if m == "bitcoin"));
        assert_eq!(card.charge_count(), 0);
        assert_eq!(paypal.charge_count(), 0);
    }

    #[tokio::test]
    async fn test_negative_amount_fails() {
        let gateway = PaymentGateway::with_default_strategies();
        let err = gateway
            .charge(
                "paypal",
                Money::from_cents(-1),
                &PaymentDetails::paypal("a@b.c"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::ProcessingFailed { .. }));
    }

    #[test]
    fn test_available_methods_and_validation() {
        let gateway = PaymentGateway::with_default_strategies();
        assert_eq!(
            gateway.available_methods(),
            vec!["banktransfer", "creditcard", "paypal"]
        );
        assert!(gateway.supports("PayPal"));
        assert!(
            !gateway
                .validate_details("paypal", &PaymentDetails::default())
                .unwrap()
        );
        assert!(gateway.validate_details("cash", &PaymentDetails::default()).is_err());
    }

    #[tokio::test]
    async fn test_refund_dispatches_to_strategy() {
        let gateway = PaymentGateway::with_default_strategies();
        let refund = gateway
            .refund(
                "Bank Transfer",
                "BT-1",
                Money::from_cents(100),
                &PaymentDetails::default(),
            )
            .await
            .unwrap();
        assert!(refund.starts_with("BTREF-"));
    }
}
