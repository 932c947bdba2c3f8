use redress_core::config::{AppConfig, LoadOptions};
use redress_core::domain::ticket::TicketId;
use redress_core::workflow::Ticketing;
use redress_db::{connect, SqlTicketStore};

use crate::commands::CommandResult;

pub fn run(ticket_id: &str, resolve: bool) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "ticket",
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
                "ticket",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let id = TicketId(ticket_id.to_string());

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let store = SqlTicketStore::new(pool.clone());

        let run_result = async {
            let mut resolved_now = false;
            if resolve {
                resolved_now = store
                    .resolve(&id)
                    .await
                    .map_err(|error| ("store", error.to_string(), 4u8))?;
            }

            let ticket = store
                .find(&id)
                .await
                .map_err(|error| ("store", error.to_string(), 4u8))?
                .ok_or_else(|| {
                    ("ticket_not_found", format!("no ticket with id {ticket_id}"), 7u8)
                })?;

            Ok::<_, (&'static str, String, u8)>((ticket, resolved_now))
        }
        .await;

        pool.close().await;
        run_result
    });

    match result {
        Ok((ticket, resolved_now)) => {
            let message = if resolved_now {
                format!("ticket {ticket_id} resolved")
            } else if resolve {
                format!("ticket {ticket_id} was not open; status is {}", ticket.status.as_str())
            } else {
                format!(
                    "ticket {ticket_id} is {} ({} priority)",
                    ticket.status.as_str(),
                    ticket.priority
                )
            };
            match serde_json::to_value(&ticket) {
                Ok(data) => CommandResult::success_with_data("ticket", message, data),
                Err(error) => CommandResult::failure(
                    "ticket",
                    "serialization",
                    format!("failed to serialize ticket: {error}"),
                    3,
                ),
            }
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("ticket", error_class, message, exit_code)
        }
    }
}
