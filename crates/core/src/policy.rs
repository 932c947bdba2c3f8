use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order::OrderId;

/// Per-deployment refund policy. Exactly one ceiling and one currency are
/// configured; the source system's dual USD/INR limits collapse into this.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundPolicy {
    pub auto_approval_ceiling: Decimal,
    pub currency: String,
}

impl Default for RefundPolicy {
    fn default() -> Self {
        Self { auto_approval_ceiling: Decimal::new(12_000, 2), currency: "USD".to_string() }
    }
}

/// Ephemeral per-request decision; produced, acted on, never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundDecision {
    pub order_id: OrderId,
    pub eligible: bool,
    pub amount: Decimal,
    pub currency: String,
    pub requires_escalation: bool,
    pub reason: String,
}

impl RefundPolicy {
    /// Full payment amount is refundable; the only policy branch is whether
    /// the automated path is open or a human must approve.
    pub fn decide(&self, order_id: &OrderId, amount: Decimal, currency: &str) -> RefundDecision {
        if !currency.eq_ignore_ascii_case(&self.currency) {
            return RefundDecision {
                order_id: order_id.clone(),
                eligible: true,
                amount,
                currency: currency.to_owned(),
                requires_escalation: true,
                reason: format!(
                    "payment currency `{currency}` differs from policy currency `{}`; \
                     ceiling cannot be applied automatically",
                    self.currency
                ),
            };
        }

        if amount > self.auto_approval_ceiling {
            return RefundDecision {
                order_id: order_id.clone(),
                eligible: true,
                amount,
                currency: currency.to_owned(),
                requires_escalation: true,
                reason: format!(
                    "refund of {amount} {currency} exceeds automated ceiling {} and requires \
                     manager approval",
                    self.auto_approval_ceiling
                ),
            };
        }

        RefundDecision {
            order_id: order_id.clone(),
            eligible: true,
            amount,
            currency: currency.to_owned(),
            requires_escalation: false,
            reason: format!(
                "refund of {amount} {currency} is within the automated ceiling {}",
                self.auto_approval_ceiling
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::RefundPolicy;
    use crate::domain::order::OrderId;

    fn policy() -> RefundPolicy {
        RefundPolicy { auto_approval_ceiling: Decimal::new(12_000, 2), currency: "USD".to_string() }
    }

    #[test]
    fn amounts_within_ceiling_stay_on_the_automated_path() {
        let decision =
            policy().decide(&OrderId("ORD0003".to_string()), Decimal::new(4_500, 2), "USD");

        assert!(decision.eligible);
        assert!(!decision.requires_escalation);
    }

    #[test]
    fn the_ceiling_itself_is_still_automated() {
        let decision =
            policy().decide(&OrderId("ORD0007".to_string()), Decimal::new(12_000, 2), "USD");

        assert!(!decision.requires_escalation);
    }

    #[test]
    fn amounts_above_ceiling_require_escalation() {
        let decision =
            policy().decide(&OrderId("ORD0006".to_string()), Decimal::new(97_957, 2), "USD");

        assert!(decision.eligible);
        assert!(decision.requires_escalation);
        assert!(decision.reason.contains("manager approval"));
    }

    #[test]
    fn foreign_currency_payments_are_escalated_not_compared() {
        let decision =
            policy().decide(&OrderId("ORD0009".to_string()), Decimal::new(1_000, 2), "INR");

        assert!(decision.requires_escalation);
        assert!(decision.reason.contains("policy currency"));
    }
}
