use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order::OrderId;
use crate::domain::ticket::TicketId;

/// What the conversational layer has established with the customer so far.
/// The workflow never infers this; it is an explicit input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    NotYetAsked,
    Yes,
    No,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub order_id: OrderId,
    pub confirmation: Confirmation,
    pub customer_email: Option<String>,
}

impl RefundRequest {
    pub fn new(order_id: OrderId) -> Self {
        Self { order_id, confirmation: Confirmation::NotYetAsked, customer_email: None }
    }

    pub fn confirmed(mut self, confirmation: Confirmation) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.customer_email = Some(email.into());
        self
    }
}

/// Discriminated result of a workflow run. `PendingConfirmation` and
/// `NeedsEmail` are resumable; everything else is terminal for the request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WorkflowOutcome {
    PendingConfirmation { amount: Decimal, currency: String, ceiling: Decimal },
    NeedsEmail { amount: Decimal, currency: String },
    Refunded {
        refund_reference: String,
        amount: Decimal,
        currency: String,
        notify_warning: Option<String>,
    },
    Escalated {
        ticket_id: TicketId,
        amount: Decimal,
        currency: String,
        notify_warning: Option<String>,
    },
    Declined { ticket_id: TicketId, notify_warning: Option<String> },
    ProcessorFailed { reason: String, retriable: bool },
}

impl WorkflowOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PendingConfirmation { .. } => "pending_confirmation",
            Self::NeedsEmail { .. } => "needs_email",
            Self::Refunded { .. } => "refunded",
            Self::Escalated { .. } => "escalated",
            Self::Declined { .. } => "declined",
            Self::ProcessorFailed { .. } => "processor_failed",
        }
    }
}
