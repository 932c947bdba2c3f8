pub mod check;
pub mod config;
pub mod migrate;
pub mod refund;
pub mod seed;
pub mod ticket;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use redress_core::config::{AppConfig, NotifyTransportKind};
use redress_core::policy::RefundPolicy;
use redress_core::workflow::{
    Notifier, PaymentProcessor, ProcessorError, ProcessorRefund, ProcessorRefundRequest,
    RefundWorkflow, WorkflowTimeouts,
};
use redress_db::{DbPool, SqlOrderStore, SqlPaymentStore, SqlTicketStore};
use redress_notify::{Dispatcher, LogTransport, SlackTransport};
use redress_stripe::StripeProcessor;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::build(command, "ok", None, message.into(), None, 0)
    }

    pub fn success_with_data(command: &str, message: impl Into<String>, data: Value) -> Self {
        Self::build(command, "ok", None, message.into(), Some(data), 0)
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::build(command, "error", Some(error_class.to_string()), message.into(), None, exit_code)
    }

    fn build(
        command: &str,
        status: &str,
        error_class: Option<String>,
        message: String,
        data: Option<Value>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: status.to_string(),
            error_class,
            message,
            data,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Stand-in processor for commands that must not (or cannot) reach Stripe.
/// `check` never calls it; an unconfigured `refund` fails with a clear
/// permanent error instead of a network attempt.
struct UnconfiguredProcessor;

#[async_trait::async_trait]
impl PaymentProcessor for UnconfiguredProcessor {
    async fn refund(
        &self,
        _request: ProcessorRefundRequest,
    ) -> Result<ProcessorRefund, ProcessorError> {
        Err(ProcessorError::Permanent("stripe.api_key is not configured".to_string()))
    }
}

pub(crate) type CliWorkflow = RefundWorkflow<
    SqlOrderStore,
    SqlPaymentStore,
    Arc<dyn PaymentProcessor>,
    SqlTicketStore,
    Arc<dyn Notifier>,
>;

pub(crate) fn build_workflow(
    config: &AppConfig,
    pool: &DbPool,
) -> Result<CliWorkflow, (&'static str, String, u8)> {
    let processor: Arc<dyn PaymentProcessor> = if config.stripe.api_key.is_some() {
        Arc::new(
            StripeProcessor::from_config(&config.stripe)
                .map_err(|error| ("processor_init", error.to_string(), 3u8))?,
        )
    } else {
        Arc::new(UnconfiguredProcessor)
    };

    let notifier: Arc<dyn Notifier> = match config.notify.transport {
        NotifyTransportKind::Slack => {
            let transport = SlackTransport::from_config(&config.notify)
                .map_err(|error| ("notifier_init", error.to_string(), 3u8))?;
            Arc::new(Dispatcher::new(Box::new(transport)))
        }
        NotifyTransportKind::Noop => Arc::new(Dispatcher::new(Box::new(LogTransport))),
    };

    let timeouts = WorkflowTimeouts {
        processor: std::time::Duration::from_secs(config.stripe.timeout_secs),
        notifier: std::time::Duration::from_secs(config.notify.timeout_secs),
    };

    Ok(RefundWorkflow::new(
        SqlOrderStore::new(pool.clone()),
        SqlPaymentStore::new(pool.clone()),
        processor,
        SqlTicketStore::new(pool.clone()),
        notifier,
        RefundPolicy::from(&config.policy),
    )
    .with_timeouts(timeouts))
}
