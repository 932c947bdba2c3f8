use redress_core::config::{AppConfig, LoadOptions};
use redress_core::domain::order::OrderId;
use redress_db::connect;

use crate::commands::{build_workflow, CommandResult};

pub fn run(order_id: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "check",
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
                "check",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let workflow = build_workflow(&config, &pool)?;
        let decision = workflow
            .evaluate(&OrderId(order_id.to_string()))
            .await
            .map_err(|error| ("workflow", format!("{} ({})", error.user_message(), error), 7u8));

        pool.close().await;
        decision
    });

    match result {
        Ok(decision) => {
            let message = if decision.requires_escalation {
                format!(
                    "order {order_id} is refundable for {} {} but requires manager approval",
                    decision.amount, decision.currency
                )
            } else {
                format!(
                    "order {order_id} is refundable for {} {} via the automated path",
                    decision.amount, decision.currency
                )
            };
            match serde_json::to_value(&decision) {
                Ok(data) => CommandResult::success_with_data("check", message, data),
                Err(error) => CommandResult::failure(
                    "check",
                    "serialization",
                    format!("failed to serialize decision: {error}"),
                    3,
                ),
            }
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("check", error_class, message, exit_code)
        }
    }
}
