use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::payment::{Payment, PaymentId, PaymentStatus};
use crate::domain::ticket::{SupportTicket, TicketDraft, TicketId, TicketStatus};
use crate::workflow::collaborators::{
    Notification, Notifier, NotifyError, OrderStore, PaymentProcessor, PaymentStore,
    ProcessorError, ProcessorRefund, ProcessorRefundRequest, StoreError, Ticketing,
};

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderStore {
    pub async fn insert(&self, order: Order) {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.0.clone(), order);
    }

    pub async fn status_of(&self, id: &OrderId) -> Option<OrderStatus> {
        let orders = self.orders.read().await;
        orders.get(&id.0).map(|order| order.status)
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn find(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }

    async fn transition_status(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<(), StoreError> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::Backend(format!("order {id} not found")))?;

        if order.status != expected {
            return Err(StoreError::Conflict { order_id: id.clone(), expected });
        }

        order.status = next;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPaymentStore {
    payments: RwLock<HashMap<String, Payment>>,
}

impl InMemoryPaymentStore {
    pub async fn insert(&self, payment: Payment) {
        let mut payments = self.payments.write().await;
        payments.insert(payment.id.0.clone(), payment);
    }

    pub async fn status_of(&self, id: &PaymentId) -> Option<PaymentStatus> {
        let payments = self.payments.read().await;
        payments.get(&id.0).map(|payment| payment.status)
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn find_for_order(&self, order_id: &OrderId) -> Result<Option<Payment>, StoreError> {
        let payments = self.payments.read().await;
        let mut matching: Vec<&Payment> =
            payments.values().filter(|payment| &payment.order_id == order_id).collect();
        matching.sort_by_key(|payment| payment.created_at);
        Ok(matching.last().map(|payment| (*payment).clone()))
    }

    async fn mark_refunded(&self, id: &PaymentId) -> Result<(), StoreError> {
        let mut payments = self.payments.write().await;
        let payment = payments
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::Backend(format!("payment {id} not found")))?;
        payment.status = PaymentStatus::Refunded;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTicketing {
    tickets: RwLock<HashMap<String, SupportTicket>>,
}

impl InMemoryTicketing {
    pub async fn tickets(&self) -> Vec<SupportTicket> {
        let tickets = self.tickets.read().await;
        let mut all: Vec<SupportTicket> = tickets.values().cloned().collect();
        all.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        all
    }
}

#[async_trait]
impl Ticketing for InMemoryTicketing {
    async fn create(&self, draft: TicketDraft) -> Result<SupportTicket, StoreError> {
        let ticket = SupportTicket::open(draft);
        let mut tickets = self.tickets.write().await;
        tickets.insert(ticket.id.0.clone(), ticket.clone());
        Ok(ticket)
    }

    async fn find(&self, id: &TicketId) -> Result<Option<SupportTicket>, StoreError> {
        let tickets = self.tickets.read().await;
        Ok(tickets.get(&id.0).cloned())
    }

    async fn resolve(&self, id: &TicketId) -> Result<bool, StoreError> {
        let mut tickets = self.tickets.write().await;
        match tickets.get_mut(&id.0) {
            Some(ticket) if ticket.status == TicketStatus::Open => {
                ticket.status = TicketStatus::Resolved;
                ticket.resolved_at = Some(chrono::Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Fake processor with a scripted response and full call recording, for tests
/// and local dry runs. Every branch assertion of the form "no processor call
/// ever occurs" goes through `call_count`.
pub struct ScriptedProcessor {
    response: Result<ProcessorRefund, ProcessorError>,
    calls: Mutex<Vec<ProcessorRefundRequest>>,
}

impl ScriptedProcessor {
    pub fn succeeding(refund_id: impl Into<String>) -> Self {
        Self {
            response: Ok(ProcessorRefund {
                refund_id: refund_id.into(),
                status: "succeeded".to_string(),
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ProcessorError) -> Self {
        Self { response: Err(error), calls: Mutex::new(Vec::new()) }
    }

    pub async fn calls(&self) -> Vec<ProcessorRefundRequest> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl PaymentProcessor for ScriptedProcessor {
    async fn refund(
        &self,
        request: ProcessorRefundRequest,
    ) -> Result<ProcessorRefund, ProcessorError> {
        let mut calls = self.calls.lock().await;
        calls.push(request);
        self.response.clone()
    }
}

/// Recording notifier; optionally fails every delivery to exercise the
/// best-effort path.
#[derive(Default)]
pub struct InMemoryNotifier {
    fail_with: Option<String>,
    sent: Mutex<Vec<Notification>>,
}

impl InMemoryNotifier {
    pub fn failing(reason: impl Into<String>) -> Self {
        Self { fail_with: Some(reason.into()), sent: Mutex::new(Vec::new()) }
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        if let Some(reason) = &self.fail_with {
            return Err(NotifyError::Delivery(reason.clone()));
        }

        let mut sent = self.sent.lock().await;
        sent.push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{InMemoryOrderStore, InMemoryPaymentStore};
    use crate::domain::order::{Order, OrderId, OrderStatus};
    use crate::domain::payment::{Payment, PaymentId, PaymentStatus};
    use crate::workflow::collaborators::{OrderStore, PaymentStore, StoreError};

    fn order(status: OrderStatus) -> Order {
        Order {
            id: OrderId("ORD0002".to_string()),
            customer_id: "CUST0002".to_string(),
            product: "Mechanical Keyboard".to_string(),
            amount: Decimal::new(6_450, 2),
            currency: "USD".to_string(),
            status,
            placed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn transition_status_applies_only_when_expectation_holds() {
        let store = InMemoryOrderStore::default();
        store.insert(order(OrderStatus::Delivered)).await;
        let id = OrderId("ORD0002".to_string());

        store
            .transition_status(&id, OrderStatus::Delivered, OrderStatus::RefundPending)
            .await
            .expect("first claim wins");

        let error = store
            .transition_status(&id, OrderStatus::Delivered, OrderStatus::RefundPending)
            .await
            .expect_err("second claim must conflict");
        assert!(matches!(error, StoreError::Conflict { .. }));
        assert_eq!(store.status_of(&id).await, Some(OrderStatus::RefundPending));
    }

    #[tokio::test]
    async fn payment_lookup_returns_the_most_recent_row() {
        let store = InMemoryPaymentStore::default();
        let order_id = OrderId("ORD0002".to_string());
        let older = Payment {
            id: PaymentId("PAY0001".to_string()),
            order_id: order_id.clone(),
            processor_reference: "pi_older".to_string(),
            amount: Decimal::new(6_450, 2),
            currency: "USD".to_string(),
            status: PaymentStatus::Failed,
            created_at: Utc::now() - chrono::Duration::minutes(5),
        };
        let newer = Payment {
            id: PaymentId("PAY0002".to_string()),
            processor_reference: "pi_newer".to_string(),
            status: PaymentStatus::Succeeded,
            created_at: Utc::now(),
            ..older.clone()
        };
        store.insert(older).await;
        store.insert(newer).await;

        let found = store.find_for_order(&order_id).await.expect("lookup");
        assert_eq!(found.map(|payment| payment.processor_reference), Some("pi_newer".to_string()));
    }
}
