use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::payment::{Payment, PaymentId};
use crate::domain::ticket::{SupportTicket, TicketDraft, TicketId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store backend failure: {0}")]
    Backend(String),
    #[error("conditional update for order {order_id} lost: status was no longer {expected}")]
    Conflict { order_id: OrderId, expected: OrderStatus },
}

/// Order persistence seam. `transition_status` is the compare-and-set that
/// guards the processor call: it must only apply the update when the stored
/// status still equals `expected`.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find(&self, id: &OrderId) -> Result<Option<Order>, StoreError>;

    async fn transition_status(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Most recent payment for the order, if any.
    async fn find_for_order(&self, order_id: &OrderId) -> Result<Option<Payment>, StoreError>;

    async fn mark_refunded(&self, id: &PaymentId) -> Result<(), StoreError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessorRefundRequest {
    /// Derived deterministically from the order id so a retried call after a
    /// timeout cannot duplicate the real-world refund.
    pub idempotency_key: String,
    pub processor_reference: String,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessorRefund {
    pub refund_id: String,
    pub status: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("processor call failed and may be retried: {0}")]
    Retriable(String),
    #[error("processor rejected the refund: {0}")]
    Permanent(String),
}

impl ProcessorError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Retriable(_))
    }
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn refund(
        &self,
        request: ProcessorRefundRequest,
    ) -> Result<ProcessorRefund, ProcessorError>;
}

#[async_trait]
pub trait Ticketing: Send + Sync {
    async fn create(&self, draft: TicketDraft) -> Result<SupportTicket, StoreError>;

    async fn find(&self, id: &TicketId) -> Result<Option<SupportTicket>, StoreError>;

    /// Returns false when the ticket was not open (or not found).
    async fn resolve(&self, id: &TicketId) -> Result<bool, StoreError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    RefundProcessed,
    TicketCreated,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RefundProcessed => "refund_processed",
            Self::TicketCreated => "ticket_created",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub order_id: Option<OrderId>,
    pub ticket_id: Option<TicketId>,
    pub contact_email: String,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub refund_reference: Option<String>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Fire-and-forget from the workflow's point of view: delivery failures are
/// logged and surfaced as a warning on the outcome, never propagated.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

#[async_trait]
impl<T: OrderStore + ?Sized> OrderStore for Arc<T> {
    async fn find(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        (**self).find(id).await
    }

    async fn transition_status(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<(), StoreError> {
        (**self).transition_status(id, expected, next).await
    }
}

#[async_trait]
impl<T: PaymentStore + ?Sized> PaymentStore for Arc<T> {
    async fn find_for_order(&self, order_id: &OrderId) -> Result<Option<Payment>, StoreError> {
        (**self).find_for_order(order_id).await
    }

    async fn mark_refunded(&self, id: &PaymentId) -> Result<(), StoreError> {
        (**self).mark_refunded(id).await
    }
}

#[async_trait]
impl<T: PaymentProcessor + ?Sized> PaymentProcessor for Arc<T> {
    async fn refund(
        &self,
        request: ProcessorRefundRequest,
    ) -> Result<ProcessorRefund, ProcessorError> {
        (**self).refund(request).await
    }
}

#[async_trait]
impl<T: Ticketing + ?Sized> Ticketing for Arc<T> {
    async fn create(&self, draft: TicketDraft) -> Result<SupportTicket, StoreError> {
        (**self).create(draft).await
    }

    async fn find(&self, id: &TicketId) -> Result<Option<SupportTicket>, StoreError> {
        (**self).find(id).await
    }

    async fn resolve(&self, id: &TicketId) -> Result<bool, StoreError> {
        (**self).resolve(id).await
    }
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        (**self).notify(notification).await
    }
}
