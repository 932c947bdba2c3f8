use std::time::Duration;

use tracing::{info, warn};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::ticket::{TicketDraft, TicketPriority};
use crate::errors::WorkflowError;
use crate::policy::{RefundDecision, RefundPolicy};
use crate::workflow::collaborators::{
    Notification, NotificationKind, Notifier, OrderStore, PaymentProcessor, PaymentStore,
    ProcessorError, ProcessorRefundRequest, StoreError, Ticketing,
};
use crate::workflow::outcome::{Confirmation, RefundRequest, WorkflowOutcome};

/// Upper bounds on the two external calls the workflow makes. A processor
/// timeout is an unknown outcome and surfaces as a retriable failure; the
/// deterministic idempotency key keeps the retry safe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkflowTimeouts {
    pub processor: Duration,
    pub notifier: Duration,
}

impl Default for WorkflowTimeouts {
    fn default() -> Self {
        Self { processor: Duration::from_secs(30), notifier: Duration::from_secs(5) }
    }
}

/// Drives one refund request end to end: eligibility, ceiling branching,
/// the compare-and-set claim, the processor call, and notification dispatch,
/// in that order. Collaborators stay behind narrow traits so the same engine
/// runs against SQL stores in production and in-memory fakes in tests.
pub struct RefundWorkflow<O, P, X, T, N> {
    orders: O,
    payments: P,
    processor: X,
    ticketing: T,
    notifier: N,
    policy: RefundPolicy,
    timeouts: WorkflowTimeouts,
}

impl<O, P, X, T, N> RefundWorkflow<O, P, X, T, N>
where
    O: OrderStore,
    P: PaymentStore,
    X: PaymentProcessor,
    T: Ticketing,
    N: Notifier,
{
    pub fn new(
        orders: O,
        payments: P,
        processor: X,
        ticketing: T,
        notifier: N,
        policy: RefundPolicy,
    ) -> Self {
        Self { orders, payments, processor, ticketing, notifier, policy, timeouts: WorkflowTimeouts::default() }
    }

    pub fn with_timeouts(mut self, timeouts: WorkflowTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn policy(&self) -> &RefundPolicy {
        &self.policy
    }

    pub fn idempotency_key(order_id: &OrderId) -> String {
        format!("refund-{}", order_id.0)
    }

    /// Read-only eligibility check; performs no side effects.
    pub async fn evaluate(&self, order_id: &OrderId) -> Result<RefundDecision, WorkflowError> {
        let (order, payment) = self.load_refundable(order_id).await?;
        Ok(self.policy.decide(&order.id, payment.amount, &payment.currency))
    }

    /// The one entry point the conversational layer calls. Every outcome is
    /// a typed variant; nothing here panics or escapes untyped.
    pub async fn execute(&self, request: &RefundRequest) -> Result<WorkflowOutcome, WorkflowError> {
        let (order, payment) = self.load_refundable(&request.order_id).await?;
        let decision = self.policy.decide(&order.id, payment.amount, &payment.currency);

        if decision.requires_escalation {
            // Above the ceiling the automated path is closed no matter what
            // the customer answered; the processor is never called.
            let Some(email) = request.customer_email.as_deref() else {
                return Ok(WorkflowOutcome::NeedsEmail {
                    amount: decision.amount,
                    currency: decision.currency.clone(),
                });
            };
            return self.escalate(&order, &decision, email).await;
        }

        match request.confirmation {
            Confirmation::NotYetAsked => Ok(WorkflowOutcome::PendingConfirmation {
                amount: decision.amount,
                currency: decision.currency,
                ceiling: self.policy.auto_approval_ceiling,
            }),
            Confirmation::No => {
                let Some(email) = request.customer_email.as_deref() else {
                    return Ok(WorkflowOutcome::NeedsEmail {
                        amount: decision.amount,
                        currency: decision.currency.clone(),
                    });
                };
                self.decline(&order, &decision, email).await
            }
            Confirmation::Yes => {
                let Some(email) = request.customer_email.as_deref() else {
                    return Ok(WorkflowOutcome::NeedsEmail {
                        amount: decision.amount,
                        currency: decision.currency.clone(),
                    });
                };
                self.process_refund(&order, &payment, &decision, email).await
            }
        }
    }

    pub async fn execute_with_audit<S>(
        &self,
        request: &RefundRequest,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<WorkflowOutcome, WorkflowError>
    where
        S: AuditSink,
    {
        let result = self.execute(request).await;
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        Some(request.order_id.clone()),
                        audit.correlation_id.clone(),
                        "workflow.refund_executed",
                        AuditCategory::Workflow,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("outcome", outcome.name()),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        Some(request.order_id.clone()),
                        audit.correlation_id.clone(),
                        "workflow.refund_rejected",
                        AuditCategory::Workflow,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error_class", error.class())
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }

    async fn load_refundable(
        &self,
        order_id: &OrderId,
    ) -> Result<(Order, Payment), WorkflowError> {
        let order = self
            .orders
            .find(order_id)
            .await?
            .ok_or_else(|| WorkflowError::OrderNotFound(order_id.clone()))?;

        match order.status {
            OrderStatus::Refunded => return Err(WorkflowError::AlreadyRefunded(order.id)),
            OrderStatus::Cancelled | OrderStatus::Pending => {
                return Err(WorkflowError::NotRefundable {
                    order_id: order.id,
                    status: order.status,
                });
            }
            OrderStatus::RefundPending => return Err(WorkflowError::Conflict(order.id)),
            OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered => {}
        }

        let payment = self
            .payments
            .find_for_order(&order.id)
            .await?
            .ok_or_else(|| WorkflowError::PaymentMissing(order.id.clone()))?;

        match payment.status {
            // The payment row is the source of truth for money movement.
            PaymentStatus::Refunded => Err(WorkflowError::AlreadyRefunded(order.id)),
            PaymentStatus::Failed => Err(WorkflowError::PaymentNotRefundable {
                order_id: order.id,
                status: payment.status,
            }),
            PaymentStatus::Succeeded => Ok((order, payment)),
        }
    }

    async fn escalate(
        &self,
        order: &Order,
        decision: &RefundDecision,
        email: &str,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let ticket = self
            .ticketing
            .create(TicketDraft {
                order_id: Some(order.id.clone()),
                contact_email: email.to_owned(),
                priority: TicketPriority::High,
                description: decision.reason.clone(),
            })
            .await?;

        info!(
            event_name = "workflow.refund_escalated",
            order_id = %order.id,
            ticket_id = %ticket.id,
            amount = %decision.amount,
            "refund routed to human review"
        );

        let notify_warning = self
            .notify(Notification {
                kind: NotificationKind::TicketCreated,
                order_id: Some(order.id.clone()),
                ticket_id: Some(ticket.id.clone()),
                contact_email: email.to_owned(),
                amount: Some(decision.amount),
                currency: Some(decision.currency.clone()),
                refund_reference: None,
            })
            .await;

        Ok(WorkflowOutcome::Escalated {
            ticket_id: ticket.id,
            amount: decision.amount,
            currency: decision.currency.clone(),
            notify_warning,
        })
    }

    async fn decline(
        &self,
        order: &Order,
        decision: &RefundDecision,
        email: &str,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let ticket = self
            .ticketing
            .create(TicketDraft {
                order_id: Some(order.id.clone()),
                contact_email: email.to_owned(),
                priority: TicketPriority::Medium,
                description: format!(
                    "customer declined the automated refund of {} {} for order {}",
                    decision.amount, decision.currency, order.id
                ),
            })
            .await?;

        info!(
            event_name = "workflow.refund_declined",
            order_id = %order.id,
            ticket_id = %ticket.id,
            "customer declined; follow-up ticket opened"
        );

        let notify_warning = self
            .notify(Notification {
                kind: NotificationKind::TicketCreated,
                order_id: Some(order.id.clone()),
                ticket_id: Some(ticket.id.clone()),
                contact_email: email.to_owned(),
                amount: Some(decision.amount),
                currency: Some(decision.currency.clone()),
                refund_reference: None,
            })
            .await;

        Ok(WorkflowOutcome::Declined { ticket_id: ticket.id, notify_warning })
    }

    async fn process_refund(
        &self,
        order: &Order,
        payment: &Payment,
        decision: &RefundDecision,
        email: &str,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        self.claim(order).await?;

        let request = ProcessorRefundRequest {
            idempotency_key: Self::idempotency_key(&order.id),
            processor_reference: payment.processor_reference.clone(),
            amount: decision.amount,
            currency: decision.currency.clone(),
        };

        let result =
            match tokio::time::timeout(self.timeouts.processor, self.processor.refund(request))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ProcessorError::Retriable(format!(
                    "refund call timed out after {:?}; outcome unknown",
                    self.timeouts.processor
                ))),
            };

        match result {
            Ok(refund) => {
                // Processor confirmed; now and only now commit local state,
                // then notify. Mutation happens-before notification.
                self.payments.mark_refunded(&payment.id).await?;
                self.orders
                    .transition_status(&order.id, OrderStatus::RefundPending, OrderStatus::Refunded)
                    .await?;

                info!(
                    event_name = "workflow.refund_processed",
                    order_id = %order.id,
                    refund_reference = %refund.refund_id,
                    amount = %decision.amount,
                    "refund confirmed by processor"
                );

                let notify_warning = self
                    .notify(Notification {
                        kind: NotificationKind::RefundProcessed,
                        order_id: Some(order.id.clone()),
                        ticket_id: None,
                        contact_email: email.to_owned(),
                        amount: Some(decision.amount),
                        currency: Some(decision.currency.clone()),
                        refund_reference: Some(refund.refund_id.clone()),
                    })
                    .await;

                Ok(WorkflowOutcome::Refunded {
                    refund_reference: refund.refund_id,
                    amount: decision.amount,
                    currency: decision.currency.clone(),
                    notify_warning,
                })
            }
            Err(error) => {
                self.release(order).await;

                warn!(
                    event_name = "workflow.processor_failed",
                    order_id = %order.id,
                    retriable = error.is_retriable(),
                    error = %error,
                    "processor refund failed; no local state committed"
                );

                Ok(WorkflowOutcome::ProcessorFailed {
                    reason: error.to_string(),
                    retriable: error.is_retriable(),
                })
            }
        }
    }

    /// Compare-and-set the order into `refund_pending`. Losing the race means
    /// another invocation is (or was) processing the same order.
    async fn claim(&self, order: &Order) -> Result<(), WorkflowError> {
        match self
            .orders
            .transition_status(&order.id, order.status, OrderStatus::RefundPending)
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::Conflict { .. }) => {
                let current = self.orders.find(&order.id).await?;
                match current.map(|order| order.status) {
                    Some(OrderStatus::Refunded) => {
                        Err(WorkflowError::AlreadyRefunded(order.id.clone()))
                    }
                    _ => Err(WorkflowError::Conflict(order.id.clone())),
                }
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Best-effort restore after a processor failure so the whole request can
    /// be re-invoked. If the restore itself fails the row stays in
    /// `refund_pending` and retries report `Conflict` until reconciliation.
    async fn release(&self, order: &Order) {
        if let Err(error) = self
            .orders
            .transition_status(&order.id, OrderStatus::RefundPending, order.status)
            .await
        {
            warn!(
                event_name = "workflow.claim_release_failed",
                order_id = %order.id,
                error = %error,
                "could not restore order status after processor failure"
            );
        }
    }

    async fn notify(&self, notification: Notification) -> Option<String> {
        let kind = notification.kind.as_str();
        let order_id = notification.order_id.clone();

        match tokio::time::timeout(self.timeouts.notifier, self.notifier.notify(notification)).await
        {
            Ok(Ok(())) => None,
            Ok(Err(error)) => {
                warn!(
                    event_name = "workflow.notification_failed",
                    kind,
                    order_id = order_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown"),
                    error = %error,
                    "notification delivery failed; outcome stands"
                );
                Some(error.to_string())
            }
            Err(_) => {
                let warning =
                    format!("{kind} notification timed out after {:?}", self.timeouts.notifier);
                warn!(
                    event_name = "workflow.notification_timeout",
                    kind,
                    order_id = order_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown"),
                    "notification delivery timed out; outcome stands"
                );
                Some(warning)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::domain::order::{Order, OrderId, OrderStatus};
    use crate::domain::payment::{Payment, PaymentId, PaymentStatus};
    use crate::domain::ticket::TicketPriority;
    use crate::errors::WorkflowError;
    use crate::policy::RefundPolicy;
    use crate::workflow::collaborators::{NotificationKind, ProcessorError};
    use crate::workflow::engine::RefundWorkflow;
    use crate::workflow::memory::{
        InMemoryNotifier, InMemoryOrderStore, InMemoryPaymentStore, InMemoryTicketing,
        ScriptedProcessor,
    };
    use crate::workflow::outcome::{Confirmation, RefundRequest, WorkflowOutcome};

    type TestWorkflow = RefundWorkflow<
        Arc<InMemoryOrderStore>,
        Arc<InMemoryPaymentStore>,
        Arc<ScriptedProcessor>,
        Arc<InMemoryTicketing>,
        Arc<InMemoryNotifier>,
    >;

    struct Harness {
        orders: Arc<InMemoryOrderStore>,
        payments: Arc<InMemoryPaymentStore>,
        processor: Arc<ScriptedProcessor>,
        ticketing: Arc<InMemoryTicketing>,
        notifier: Arc<InMemoryNotifier>,
        workflow: Arc<TestWorkflow>,
    }

    fn harness(processor: ScriptedProcessor, notifier: InMemoryNotifier) -> Harness {
        let orders = Arc::new(InMemoryOrderStore::default());
        let payments = Arc::new(InMemoryPaymentStore::default());
        let processor = Arc::new(processor);
        let ticketing = Arc::new(InMemoryTicketing::default());
        let notifier = Arc::new(notifier);

        let workflow = Arc::new(RefundWorkflow::new(
            orders.clone(),
            payments.clone(),
            processor.clone(),
            ticketing.clone(),
            notifier.clone(),
            RefundPolicy::default(),
        ));

        Harness { orders, payments, processor, ticketing, notifier, workflow }
    }

    async fn seed_order(
        harness: &Harness,
        order_id: &str,
        status: OrderStatus,
        amount_cents: i64,
        with_payment: Option<PaymentStatus>,
    ) {
        harness
            .orders
            .insert(Order {
                id: OrderId(order_id.to_string()),
                customer_id: "CUST0001".to_string(),
                product: "Wireless Headphones".to_string(),
                amount: Decimal::new(amount_cents, 2),
                currency: "USD".to_string(),
                status,
                placed_at: Utc::now(),
            })
            .await;

        if let Some(payment_status) = with_payment {
            harness
                .payments
                .insert(Payment {
                    id: PaymentId(format!("PAY-{order_id}")),
                    order_id: OrderId(order_id.to_string()),
                    processor_reference: format!("pi_{order_id}"),
                    amount: Decimal::new(amount_cents, 2),
                    currency: "USD".to_string(),
                    status: payment_status,
                    created_at: Utc::now(),
                })
                .await;
        }
    }

    fn confirmed_request(order_id: &str) -> RefundRequest {
        RefundRequest::new(OrderId(order_id.to_string()))
            .confirmed(Confirmation::Yes)
            .with_email("customer@example.com")
    }

    #[tokio::test]
    async fn confirmed_refund_within_ceiling_is_processed() {
        let harness = harness(ScriptedProcessor::succeeding("re_0003"), InMemoryNotifier::default());
        seed_order(&harness, "ORD0003", OrderStatus::Delivered, 4_500, Some(PaymentStatus::Succeeded))
            .await;

        let outcome =
            harness.workflow.execute(&confirmed_request("ORD0003")).await.expect("workflow run");

        match outcome {
            WorkflowOutcome::Refunded { refund_reference, amount, notify_warning, .. } => {
                assert_eq!(refund_reference, "re_0003");
                assert_eq!(amount, Decimal::new(4_500, 2));
                assert!(notify_warning.is_none());
            }
            other => panic!("expected refunded outcome, got {other:?}"),
        }

        assert_eq!(
            harness.orders.status_of(&OrderId("ORD0003".to_string())).await,
            Some(OrderStatus::Refunded)
        );
        assert_eq!(
            harness.payments.status_of(&PaymentId("PAY-ORD0003".to_string())).await,
            Some(PaymentStatus::Refunded)
        );
        assert_eq!(harness.processor.call_count().await, 1);

        let calls = harness.processor.calls().await;
        assert_eq!(calls[0].idempotency_key, "refund-ORD0003");

        let sent = harness.notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::RefundProcessed);
    }

    #[tokio::test]
    async fn amounts_above_ceiling_escalate_without_touching_the_processor() {
        let harness = harness(ScriptedProcessor::succeeding("re_0006"), InMemoryNotifier::default());
        seed_order(&harness, "ORD0006", OrderStatus::Delivered, 97_957, Some(PaymentStatus::Succeeded))
            .await;

        // Escalation applies regardless of what the customer answered.
        for confirmation in [Confirmation::NotYetAsked, Confirmation::Yes, Confirmation::No] {
            let request = RefundRequest::new(OrderId("ORD0006".to_string()))
                .confirmed(confirmation)
                .with_email("customer@example.com");
            let outcome = harness.workflow.execute(&request).await.expect("workflow run");
            assert!(matches!(outcome, WorkflowOutcome::Escalated { .. }));
        }

        assert_eq!(harness.processor.call_count().await, 0);

        let tickets = harness.ticketing.tickets().await;
        assert!(!tickets.is_empty());
        assert!(tickets.iter().all(|ticket| ticket.priority == TicketPriority::High));
        assert_eq!(
            harness.orders.status_of(&OrderId("ORD0006".to_string())).await,
            Some(OrderStatus::Delivered)
        );
    }

    #[tokio::test]
    async fn declined_refund_opens_a_medium_priority_ticket() {
        let harness = harness(ScriptedProcessor::succeeding("re_0002"), InMemoryNotifier::default());
        seed_order(&harness, "ORD0006", OrderStatus::Delivered, 7_500, Some(PaymentStatus::Succeeded))
            .await;

        let request = RefundRequest::new(OrderId("ORD0006".to_string()))
            .confirmed(Confirmation::No)
            .with_email("customer@example.com");
        let outcome = harness.workflow.execute(&request).await.expect("workflow run");

        assert!(matches!(outcome, WorkflowOutcome::Declined { .. }));
        assert_eq!(harness.processor.call_count().await, 0);

        let tickets = harness.ticketing.tickets().await;
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].priority, TicketPriority::Medium);
    }

    #[tokio::test]
    async fn already_refunded_orders_are_rejected_with_no_side_effects() {
        let harness = harness(ScriptedProcessor::succeeding("re_dup"), InMemoryNotifier::default());
        seed_order(&harness, "ORD0005", OrderStatus::Refunded, 8_810, Some(PaymentStatus::Refunded))
            .await;

        let error = harness
            .workflow
            .execute(&confirmed_request("ORD0005"))
            .await
            .expect_err("already refunded must be rejected");

        assert!(matches!(error, WorkflowError::AlreadyRefunded(_)));
        assert_eq!(harness.processor.call_count().await, 0);
        assert!(harness.ticketing.tickets().await.is_empty());
        assert!(harness.notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn processor_failure_commits_nothing_and_is_safe_to_retry() {
        let harness = harness(
            ScriptedProcessor::failing(ProcessorError::Retriable("connect timeout".to_string())),
            InMemoryNotifier::default(),
        );
        seed_order(&harness, "ORD0002", OrderStatus::Processing, 6_450, Some(PaymentStatus::Succeeded))
            .await;

        let outcome =
            harness.workflow.execute(&confirmed_request("ORD0002")).await.expect("workflow run");

        match outcome {
            WorkflowOutcome::ProcessorFailed { retriable, reason } => {
                assert!(retriable);
                assert!(reason.contains("connect timeout"));
            }
            other => panic!("expected processor failure, got {other:?}"),
        }

        // Claim was rolled back, nothing committed, retry allowed.
        assert_eq!(
            harness.orders.status_of(&OrderId("ORD0002".to_string())).await,
            Some(OrderStatus::Processing)
        );
        assert_eq!(
            harness.payments.status_of(&PaymentId("PAY-ORD0002".to_string())).await,
            Some(PaymentStatus::Succeeded)
        );
        assert!(harness.notifier.sent().await.is_empty());

        let retry =
            harness.workflow.execute(&confirmed_request("ORD0002")).await.expect("retry runs");
        assert!(matches!(retry, WorkflowOutcome::ProcessorFailed { .. }));
        let calls = harness.processor.calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].idempotency_key, calls[1].idempotency_key);
    }

    #[tokio::test]
    async fn missing_email_is_a_resumable_state_not_a_failure() {
        let harness = harness(ScriptedProcessor::succeeding("re_0003"), InMemoryNotifier::default());
        seed_order(&harness, "ORD0003", OrderStatus::Delivered, 4_500, Some(PaymentStatus::Succeeded))
            .await;

        let request =
            RefundRequest::new(OrderId("ORD0003".to_string())).confirmed(Confirmation::Yes);
        let outcome = harness.workflow.execute(&request).await.expect("workflow run");

        assert!(matches!(outcome, WorkflowOutcome::NeedsEmail { .. }));
        assert_eq!(harness.processor.call_count().await, 0);
        assert_eq!(
            harness.orders.status_of(&OrderId("ORD0003".to_string())).await,
            Some(OrderStatus::Delivered)
        );
    }

    #[tokio::test]
    async fn escalation_needs_an_email_before_a_ticket_is_opened() {
        let harness = harness(ScriptedProcessor::succeeding("re_never"), InMemoryNotifier::default());
        seed_order(&harness, "ORD0006", OrderStatus::Delivered, 97_957, Some(PaymentStatus::Succeeded))
            .await;

        let request =
            RefundRequest::new(OrderId("ORD0006".to_string())).confirmed(Confirmation::Yes);
        let outcome = harness.workflow.execute(&request).await.expect("workflow run");

        match outcome {
            WorkflowOutcome::NeedsEmail { amount, .. } => {
                assert_eq!(amount, Decimal::new(97_957, 2));
            }
            other => panic!("expected needs-email outcome, got {other:?}"),
        }

        assert!(harness.ticketing.tickets().await.is_empty());
        assert_eq!(harness.processor.call_count().await, 0);
        assert!(harness.notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn declined_refund_needs_an_email_before_a_ticket_is_opened() {
        let harness = harness(ScriptedProcessor::succeeding("re_never"), InMemoryNotifier::default());
        seed_order(&harness, "ORD0003", OrderStatus::Delivered, 4_500, Some(PaymentStatus::Succeeded))
            .await;

        let request =
            RefundRequest::new(OrderId("ORD0003".to_string())).confirmed(Confirmation::No);
        let outcome = harness.workflow.execute(&request).await.expect("workflow run");

        assert!(matches!(outcome, WorkflowOutcome::NeedsEmail { .. }));
        assert!(harness.ticketing.tickets().await.is_empty());
        assert_eq!(
            harness.orders.status_of(&OrderId("ORD0003".to_string())).await,
            Some(OrderStatus::Delivered)
        );
    }

    #[tokio::test]
    async fn unconfirmed_request_reports_amount_and_ceiling_without_side_effects() {
        let harness = harness(ScriptedProcessor::succeeding("re_0003"), InMemoryNotifier::default());
        seed_order(&harness, "ORD0003", OrderStatus::Delivered, 4_500, Some(PaymentStatus::Succeeded))
            .await;

        let request = RefundRequest::new(OrderId("ORD0003".to_string()));
        let outcome = harness.workflow.execute(&request).await.expect("workflow run");

        match outcome {
            WorkflowOutcome::PendingConfirmation { amount, ceiling, .. } => {
                assert_eq!(amount, Decimal::new(4_500, 2));
                assert_eq!(ceiling, Decimal::new(12_000, 2));
            }
            other => panic!("expected pending confirmation, got {other:?}"),
        }

        assert_eq!(harness.processor.call_count().await, 0);
        assert!(harness.ticketing.tickets().await.is_empty());
        assert!(harness.notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn notification_failure_is_a_warning_not_a_rollback() {
        let harness = harness(
            ScriptedProcessor::succeeding("re_0003"),
            InMemoryNotifier::failing("smtp unavailable"),
        );
        seed_order(&harness, "ORD0003", OrderStatus::Delivered, 4_500, Some(PaymentStatus::Succeeded))
            .await;

        let outcome =
            harness.workflow.execute(&confirmed_request("ORD0003")).await.expect("workflow run");

        match outcome {
            WorkflowOutcome::Refunded { notify_warning, .. } => {
                let warning = notify_warning.expect("warning expected");
                assert!(warning.contains("smtp unavailable"));
            }
            other => panic!("expected refunded outcome, got {other:?}"),
        }

        assert_eq!(
            harness.orders.status_of(&OrderId("ORD0003".to_string())).await,
            Some(OrderStatus::Refunded)
        );
    }

    #[tokio::test]
    async fn unpaid_and_cancelled_orders_are_not_refundable() {
        let harness = harness(ScriptedProcessor::succeeding("re_none"), InMemoryNotifier::default());
        seed_order(&harness, "ORD0001", OrderStatus::Pending, 1_999, None).await;
        seed_order(&harness, "ORD0004", OrderStatus::Cancelled, 3_200, None).await;

        for order_id in ["ORD0001", "ORD0004"] {
            let error = harness
                .workflow
                .execute(&confirmed_request(order_id))
                .await
                .expect_err("must be rejected");
            assert!(matches!(error, WorkflowError::NotRefundable { .. }));
        }
    }

    #[tokio::test]
    async fn missing_payment_row_is_surfaced_not_silently_skipped() {
        let harness = harness(ScriptedProcessor::succeeding("re_none"), InMemoryNotifier::default());
        seed_order(&harness, "ORD0008", OrderStatus::Delivered, 5_425, None).await;

        let error = harness
            .workflow
            .execute(&confirmed_request("ORD0008"))
            .await
            .expect_err("missing payment must fail");
        assert!(matches!(error, WorkflowError::PaymentMissing(_)));
        assert_eq!(harness.processor.call_count().await, 0);
    }

    #[tokio::test]
    async fn concurrent_confirmed_requests_produce_exactly_one_refund() {
        let harness = harness(ScriptedProcessor::succeeding("re_race"), InMemoryNotifier::default());
        seed_order(&harness, "ORD0003", OrderStatus::Delivered, 4_500, Some(PaymentStatus::Succeeded))
            .await;

        let first = {
            let workflow = harness.workflow.clone();
            tokio::spawn(async move { workflow.execute(&confirmed_request("ORD0003")).await })
        };
        let second = {
            let workflow = harness.workflow.clone();
            tokio::spawn(async move { workflow.execute(&confirmed_request("ORD0003")).await })
        };

        let results = [first.await.expect("task join"), second.await.expect("task join")];

        let refunded = results
            .iter()
            .filter(|result| matches!(result, Ok(WorkflowOutcome::Refunded { .. })))
            .count();
        let rejected = results
            .iter()
            .filter(|result| {
                matches!(
                    result,
                    Err(WorkflowError::AlreadyRefunded(_)) | Err(WorkflowError::Conflict(_))
                )
            })
            .count();

        assert_eq!(refunded, 1, "exactly one invocation may refund: {results:?}");
        assert_eq!(rejected, 1, "the loser must observe the claim: {results:?}");
        assert_eq!(harness.processor.call_count().await, 1);
        assert_eq!(
            harness.orders.status_of(&OrderId("ORD0003".to_string())).await,
            Some(OrderStatus::Refunded)
        );
    }

    #[tokio::test]
    async fn evaluate_is_read_only() {
        let harness = harness(ScriptedProcessor::succeeding("re_eval"), InMemoryNotifier::default());
        seed_order(&harness, "ORD0006", OrderStatus::Delivered, 97_957, Some(PaymentStatus::Succeeded))
            .await;

        let decision =
            harness.workflow.evaluate(&OrderId("ORD0006".to_string())).await.expect("evaluate");

        assert!(decision.eligible);
        assert!(decision.requires_escalation);
        assert_eq!(harness.processor.call_count().await, 0);
        assert!(harness.ticketing.tickets().await.is_empty());
    }

    #[tokio::test]
    async fn audited_runs_record_the_outcome_name() {
        let harness = harness(ScriptedProcessor::succeeding("re_0003"), InMemoryNotifier::default());
        seed_order(&harness, "ORD0003", OrderStatus::Delivered, 4_500, Some(PaymentStatus::Succeeded))
            .await;
        let sink = InMemoryAuditSink::default();

        let _ = harness
            .workflow
            .execute_with_audit(
                &confirmed_request("ORD0003"),
                &sink,
                &AuditContext::new(Some(OrderId("ORD0003".to_string())), "req-42", "refund-workflow"),
            )
            .await
            .expect("audited run");

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "workflow.refund_executed");
        assert_eq!(events[0].metadata.get("outcome").map(String::as_str), Some("refunded"));
    }
}
