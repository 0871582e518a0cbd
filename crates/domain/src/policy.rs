//! Status transition policy.

use std::str::FromStr;

use common::{OrderStatus, PaymentStatus};

use crate::error::{DomainError, Result};

/// Decides which order and payment status changes are accepted.
///
/// `Strict` enforces the lifecycle tables on [`OrderStatus`] and
/// [`PaymentStatus`]. `Permissive` accepts any change. Under both policies
/// setting the current value again is accepted and changes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    #[default]
    Strict,
    Permissive,
}

impl StatusPolicy {
    /// Checks an order status change.
    pub fn check_order(&self, from: OrderStatus, to: OrderStatus) -> Result<()> {
        if from == to || *self == StatusPolicy::Permissive || from.can_transition_to(to) {
            return Ok(());
        }
        Err(DomainError::InvalidStatusTransition {
            kind: "order status",
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Checks a payment status change.
    pub fn check_payment(&self, from: PaymentStatus, to: PaymentStatus) -> Result<()> {
        if from == to || *self == StatusPolicy::Permissive || from.can_transition_to(to) {
            return Ok(());
        }
        Err(DomainError::InvalidStatusTransition {
            kind: "payment status",
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

impl FromStr for StatusPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(StatusPolicy::Strict),
            "permissive" => Ok(StatusPolicy::Permissive),
            other => Err(DomainError::InvalidArgument(format!(
                "unknown status policy '{other}'"
            ))),
        }
    }
}
