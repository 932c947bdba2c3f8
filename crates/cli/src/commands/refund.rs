use uuid::Uuid;

use redress_core::audit::AuditContext;
use redress_core::config::{AppConfig, LoadOptions};
use redress_core::domain::order::OrderId;
use redress_core::workflow::{Confirmation, RefundRequest, WorkflowOutcome};
use redress_core::InMemoryAuditSink;
use redress_db::connect;

use crate::commands::{build_workflow, CommandResult};
use crate::ConfirmArg;

pub fn run(order_id: &str, confirm: Option<ConfirmArg>, email: Option<&str>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "refund",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "refund",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let confirmation = match confirm {
        None => Confirmation::NotYetAsked,
        Some(ConfirmArg::Yes) => Confirmation::Yes,
        Some(ConfirmArg::No) => Confirmation::No,
    };

    let mut request =
        RefundRequest::new(OrderId(order_id.to_string())).confirmed(confirmation);
    if let Some(email) = email {
        request = request.with_email(email);
    }

    let correlation_id = Uuid::new_v4().to_string();
    let sink = InMemoryAuditSink::default();

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let workflow = build_workflow(&config, &pool)?;
        let audit = AuditContext::new(
            Some(OrderId(order_id.to_string())),
            correlation_id.clone(),
            "redress-cli",
        );

        let outcome = workflow
            .execute_with_audit(&request, &sink, &audit)
            .await
            .map_err(|error| ("workflow", format!("{} ({})", error.user_message(), error), 7u8));

        pool.close().await;
        outcome
    });

    match result {
        Ok(outcome) => {
            let message = describe(order_id, &outcome);
            match refund_payload(&correlation_id, &outcome, &sink) {
                Ok(data) => CommandResult::success_with_data("refund", message, data),
                Err(error) => CommandResult::failure(
                    "refund",
                    "serialization",
                    format!("failed to serialize outcome: {error}"),
                    3,
                ),
            }
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("refund", error_class, message, exit_code)
        }
    }
}

fn refund_payload(
    correlation_id: &str,
    outcome: &WorkflowOutcome,
    sink: &InMemoryAuditSink,
) -> Result<serde_json::Value, serde_json::Error> {
    Ok(serde_json::json!({
        "correlation_id": correlation_id,
        "result": serde_json::to_value(outcome)?,
        "audit_trail": serde_json::to_value(sink.events())?,
    }))
}

fn describe(order_id: &str, outcome: &WorkflowOutcome) -> String {
    match outcome {
        WorkflowOutcome::PendingConfirmation { amount, currency, .. } => format!(
            "order {order_id} qualifies for an automated refund of {amount} {currency}; re-run with --confirm yes|no"
        ),
        WorkflowOutcome::NeedsEmail { amount, currency } => format!(
            "refund of {amount} {currency} for order {order_id} needs a contact email; re-run with --email"
        ),
        WorkflowOutcome::Refunded { refund_reference, amount, currency, notify_warning } => {
            let mut message =
                format!("refunded {amount} {currency} for order {order_id} ({refund_reference})");
            if let Some(warning) = notify_warning {
                message.push_str(&format!("; notification warning: {warning}"));
            }
            message
        }
        WorkflowOutcome::Escalated { ticket_id, amount, currency, .. } => format!(
            "refund of {amount} {currency} for order {order_id} exceeds the automated ceiling; escalated as ticket {ticket_id}"
        ),
        WorkflowOutcome::Declined { ticket_id, .. } => {
            format!("customer declined the refund for order {order_id}; follow-up ticket {ticket_id} opened")
        }
        WorkflowOutcome::ProcessorFailed { reason, retriable } => {
            if *retriable {
                format!("refund for order {order_id} failed at the processor and may be retried: {reason}")
            } else {
                format!("refund for order {order_id} was rejected by the processor: {reason}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use redress_core::domain::ticket::TicketId;
    use redress_core::workflow::WorkflowOutcome;

    use super::describe;

    #[test]
    fn refunded_message_carries_warning_when_notification_failed() {
        let message = describe(
            "ORD0003",
            &WorkflowOutcome::Refunded {
                refund_reference: "re_123".to_string(),
                amount: Decimal::new(4_500, 2),
                currency: "USD".to_string(),
                notify_warning: Some("smtp unavailable".to_string()),
            },
        );
        assert!(message.contains("re_123"));
        assert!(message.contains("smtp unavailable"));
    }

    #[test]
    fn escalated_message_names_the_ticket() {
        let message = describe(
            "ORD0006",
            &WorkflowOutcome::Escalated {
                ticket_id: TicketId("TKT1A2B3C4D".to_string()),
                amount: Decimal::new(97_957, 2),
                currency: "USD".to_string(),
                notify_warning: None,
            },
        );
        assert!(message.contains("TKT1A2B3C4D"));
        assert!(message.contains("ceiling"));
    }
}
