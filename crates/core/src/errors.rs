use thiserror::Error;

use crate::domain::order::{OrderId, OrderStatus};
use crate::domain::payment::PaymentStatus;
use crate::workflow::collaborators::StoreError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid order transition from {from} to {to}")]
    InvalidOrderTransition { from: OrderStatus, to: OrderStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Everything `RefundWorkflow` can refuse with. Callers are expected to
/// pattern-match every variant; none of these is raised as a panic.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("order {0} was not found")]
    OrderNotFound(OrderId),
    #[error("order {0} has already been refunded")]
    AlreadyRefunded(OrderId),
    #[error("order {order_id} is not refundable while {status}")]
    NotRefundable { order_id: OrderId, status: OrderStatus },
    #[error("payment for order {order_id} is {status} and cannot be refunded")]
    PaymentNotRefundable { order_id: OrderId, status: PaymentStatus },
    #[error("no payment is recorded for order {0}")]
    PaymentMissing(OrderId),
    #[error("another refund attempt is in flight for order {0}")]
    Conflict(OrderId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    /// Stable machine-readable class for logs and CLI exit mapping.
    pub fn class(&self) -> &'static str {
        match self {
            Self::OrderNotFound(_) => "order_not_found",
            Self::AlreadyRefunded(_) => "already_refunded",
            Self::NotRefundable { .. } => "not_refundable",
            Self::PaymentNotRefundable { .. } => "payment_not_refundable",
            Self::PaymentMissing(_) => "payment_missing",
            Self::Conflict(_) => "conflict",
            Self::Store(_) => "store_failure",
        }
    }

    /// A message safe to surface verbatim to the customer-facing layer.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::OrderNotFound(_) => {
                "We could not find that order. Please check the order id and try again."
            }
            Self::AlreadyRefunded(_) => {
                "This order has already been refunded. No further action is needed."
            }
            Self::NotRefundable { .. } | Self::PaymentNotRefundable { .. } => {
                "This order is not eligible for a refund in its current state."
            }
            Self::PaymentMissing(_) => {
                "We could not find payment details for this order. Our support team will follow up."
            }
            Self::Conflict(_) => {
                "A refund for this order is already being processed. Please check back shortly."
            }
            Self::Store(_) => "A temporary issue prevented us from processing this. Please retry.",
        }
    }
}
