use std::sync::Arc;

use redress_core::domain::order::{OrderId, OrderStatus};
use redress_core::errors::WorkflowError;
use redress_core::policy::RefundPolicy;
use redress_core::workflow::{
    Confirmation, InMemoryNotifier, OrderStore, ProcessorError, RefundRequest, RefundWorkflow,
    ScriptedProcessor, StoreError, Ticketing, WorkflowOutcome,
};
use redress_core::config::DatabaseConfig;
use redress_db::{
    connect, migrations, DbPool, SeedDataset, SqlOrderStore, SqlPaymentStore, SqlTicketStore,
};

async fn seeded_pool() -> DbPool {
    let memory = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        timeout_secs: 30,
    };
    let pool = connect(&memory).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrate");
    SeedDataset::load(&pool).await.expect("seed");
    pool
}

fn workflow_over(
    pool: &DbPool,
    processor: ScriptedProcessor,
) -> RefundWorkflow<SqlOrderStore, SqlPaymentStore, ScriptedProcessor, SqlTicketStore, InMemoryNotifier>
{
    RefundWorkflow::new(
        SqlOrderStore::new(pool.clone()),
        SqlPaymentStore::new(pool.clone()),
        processor,
        SqlTicketStore::new(pool.clone()),
        InMemoryNotifier::default(),
        RefundPolicy::default(),
    )
}

fn confirmed_request(order_id: &str) -> RefundRequest {
    RefundRequest::new(OrderId(order_id.to_string()))
        .confirmed(Confirmation::Yes)
        .with_email("customer@example.com")
}

#[tokio::test]
async fn automated_refund_persists_order_and_payment_state() {
    let pool = seeded_pool().await;
    let workflow = workflow_over(&pool, ScriptedProcessor::succeeding("re_sql_0003"));

    let outcome = workflow.execute(&confirmed_request("ORD0003")).await.expect("workflow run");
    assert!(matches!(outcome, WorkflowOutcome::Refunded { .. }), "got {outcome:?}");

    let order_status: String = sqlx::query_scalar("SELECT status FROM orders WHERE id = 'ORD0003'")
        .fetch_one(&pool)
        .await
        .expect("order status");
    assert_eq!(order_status, "refunded");

    let payment_status: String =
        sqlx::query_scalar("SELECT status FROM payments WHERE order_id = 'ORD0003'")
            .fetch_one(&pool)
            .await
            .expect("payment status");
    assert_eq!(payment_status, "refunded");
}

#[tokio::test]
async fn seeded_rejection_branches_hold_against_sql_stores() {
    let pool = seeded_pool().await;
    let workflow = workflow_over(&pool, ScriptedProcessor::succeeding("re_none"));

    let duplicate = workflow.execute(&confirmed_request("ORD0005")).await;
    assert!(matches!(duplicate, Err(WorkflowError::AlreadyRefunded(_))));

    let unpaid = workflow.execute(&confirmed_request("ORD0001")).await;
    assert!(matches!(unpaid, Err(WorkflowError::NotRefundable { .. })));

    let failed_payment = workflow.execute(&confirmed_request("ORD0007")).await;
    assert!(matches!(failed_payment, Err(WorkflowError::PaymentNotRefundable { .. })));

    let missing_payment = workflow.execute(&confirmed_request("ORD0008")).await;
    assert!(matches!(missing_payment, Err(WorkflowError::PaymentMissing(_))));

    let missing_order = workflow.execute(&confirmed_request("ORD9999")).await;
    assert!(matches!(missing_order, Err(WorkflowError::OrderNotFound(_))));
}

#[tokio::test]
async fn escalation_writes_a_high_priority_ticket_row() {
    let pool = seeded_pool().await;
    let workflow = workflow_over(&pool, ScriptedProcessor::succeeding("re_never"));

    let outcome = workflow.execute(&confirmed_request("ORD0006")).await.expect("workflow run");
    let ticket_id = match outcome {
        WorkflowOutcome::Escalated { ticket_id, .. } => ticket_id,
        other => panic!("expected escalation, got {other:?}"),
    };

    let tickets = SqlTicketStore::new(pool.clone());
    let ticket = tickets.find(&ticket_id).await.expect("lookup").expect("ticket row");
    assert_eq!(ticket.priority.as_str(), "high");
    assert_eq!(ticket.order_id.as_ref().map(|id| id.0.as_str()), Some("ORD0006"));

    // Escalation must not touch order state.
    let order_status: String = sqlx::query_scalar("SELECT status FROM orders WHERE id = 'ORD0006'")
        .fetch_one(&pool)
        .await
        .expect("order status");
    assert_eq!(order_status, "delivered");
}

#[tokio::test]
async fn ticket_resolution_is_recorded_once() {
    let pool = seeded_pool().await;
    let workflow = workflow_over(&pool, ScriptedProcessor::succeeding("re_never"));

    let outcome = workflow.execute(&confirmed_request("ORD0006")).await.expect("workflow run");
    let ticket_id = match outcome {
        WorkflowOutcome::Escalated { ticket_id, .. } => ticket_id,
        other => panic!("expected escalation, got {other:?}"),
    };

    let tickets = SqlTicketStore::new(pool.clone());
    assert!(tickets.resolve(&ticket_id).await.expect("resolve open ticket"));
    assert!(!tickets.resolve(&ticket_id).await.expect("second resolve is a no-op"));

    let ticket = tickets.find(&ticket_id).await.expect("lookup").expect("ticket row");
    assert_eq!(ticket.status.as_str(), "resolved");
    assert!(ticket.resolved_at.is_some());
}

#[tokio::test]
async fn processor_failure_leaves_seeded_state_intact() {
    let pool = seeded_pool().await;
    let workflow = workflow_over(
        &pool,
        ScriptedProcessor::failing(ProcessorError::Retriable("upstream 503".to_string())),
    );

    let outcome = workflow.execute(&confirmed_request("ORD0002")).await.expect("workflow run");
    assert!(matches!(outcome, WorkflowOutcome::ProcessorFailed { retriable: true, .. }));

    let order_status: String = sqlx::query_scalar("SELECT status FROM orders WHERE id = 'ORD0002'")
        .fetch_one(&pool)
        .await
        .expect("order status");
    assert_eq!(order_status, "processing");

    let payment_status: String =
        sqlx::query_scalar("SELECT status FROM payments WHERE order_id = 'ORD0002'")
            .fetch_one(&pool)
            .await
            .expect("payment status");
    assert_eq!(payment_status, "succeeded");
}

#[tokio::test]
async fn conditional_update_loses_when_status_moved() {
    let pool = seeded_pool().await;
    let orders = Arc::new(SqlOrderStore::new(pool.clone()));

    let id = OrderId("ORD0003".to_string());
    orders
        .transition_status(&id, OrderStatus::Delivered, OrderStatus::RefundPending)
        .await
        .expect("first claim");

    let second = orders.transition_status(&id, OrderStatus::Delivered, OrderStatus::RefundPending).await;
    assert!(matches!(second, Err(StoreError::Conflict { .. })));
}
