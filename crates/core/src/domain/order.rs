use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    RefundPending,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::RefundPending => "refund_pending",
            Self::Refunded => "refunded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            "refund_pending" => Some(Self::RefundPending),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: String,
    pub product: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub placed_at: DateTime<Utc>,
}

impl Order {
    /// Status is the only field the refund workflow ever writes; every write
    /// goes through this lifecycle guard.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::{
            Cancelled, Delivered, Pending, Processing, RefundPending, Refunded, Shipped,
        };

        matches!(
            (self.status, next),
            (Pending, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Processing, Cancelled)
                | (Processing, RefundPending)
                | (Shipped, RefundPending)
                | (Delivered, RefundPending)
                | (RefundPending, Refunded)
                | (RefundPending, Processing)
                | (RefundPending, Shipped)
                | (RefundPending, Delivered)
        )
    }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidOrderTransition { from: self.status, to: next })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{Order, OrderId, OrderStatus};

    fn order(status: OrderStatus) -> Order {
        Order {
            id: OrderId("ORD0001".to_string()),
            customer_id: "CUST0001".to_string(),
            product: "Wireless Headphones".to_string(),
            amount: Decimal::new(4_500, 2),
            currency: "USD".to_string(),
            status,
            placed_at: Utc::now(),
        }
    }

    #[test]
    fn allows_refund_claim_from_settled_statuses() {
        for status in [OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered] {
            let mut order = order(status);
            order.transition_to(OrderStatus::RefundPending).expect("claim should be allowed");
            assert_eq!(order.status, OrderStatus::RefundPending);
        }
    }

    #[test]
    fn refund_pending_can_move_forward_or_roll_back() {
        let mut order = order(OrderStatus::RefundPending);
        order.transition_to(OrderStatus::Refunded).expect("refund_pending -> refunded");

        let mut rolled_back = order_with_rollback();
        rolled_back.transition_to(OrderStatus::Delivered).expect("refund_pending -> delivered");
        assert_eq!(rolled_back.status, OrderStatus::Delivered);
    }

    fn order_with_rollback() -> Order {
        order(OrderStatus::RefundPending)
    }

    #[test]
    fn blocks_refund_claim_from_unpaid_or_terminal_statuses() {
        for status in [OrderStatus::Pending, OrderStatus::Cancelled, OrderStatus::Refunded] {
            let mut order = order(status);
            let error = order
                .transition_to(OrderStatus::RefundPending)
                .expect_err("claim must be rejected");
            assert!(matches!(
                error,
                crate::errors::DomainError::InvalidOrderTransition { .. }
            ));
        }
    }

    #[test]
    fn status_round_trips_from_storage_encoding() {
        let cases = [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::RefundPending,
            OrderStatus::Refunded,
        ];

        for status in cases {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
    }
}
