use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use common::Money;

use super::{PaymentDetails, PaymentStrategy};
use crate::error::PaymentError;

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    charges: AtomicUsize,
    refunds: AtomicUsize,
    fail_on_charge: AtomicBool,
}

/// Payment strategy for tests. Accepts any details and counts its calls.
#[derive(Debug, Clone)]
pub struct InMemoryPaymentStrategy {
    name: String,
    state: Arc<InMemoryPaymentState>,
}

impl InMemoryPaymentStrategy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::default(),
        }
    }

    /// Configures the strategy to decline charges.
    pub fn set_fail_on_charge(&self, fail: bool) {
        self.state.fail_on_charge.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of successful charges.
    pub fn charge_count(&self) -> usize {
        self.state.charges.load(Ordering::SeqCst)
    }

    /// Returns the number of refunds.
    pub fn refund_count(&self) -> usize {
        self.state.refunds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentStrategy for InMemoryPaymentStrategy {
    fn method_name(&self) -> &str {
        &self.name
    }

    fn validate_details(&self, _details: &PaymentDetails) -> bool {
        true
    }

    async fn process_payment(
        &self,
        _amount: Money,
        _details: &PaymentDetails,
    ) -> Result<String, PaymentError> {
        if self.state.fail_on_charge.load(Ordering::SeqCst) {
            return Err(PaymentError::failed(&self.name, "Payment declined"));
        }
        let n = self.state.charges.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("PAY-{n:04}"))
    }

    async fn refund_payment(
        &self,
        _transaction_id: &str,
        _amount: Money,
        _details: &PaymentDetails,
    ) -> Result<String, PaymentError> {
        let n = self.state.refunds.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("RFD-{n:04}"))
    }
}
