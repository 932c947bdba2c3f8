use redress_core::config::{AppConfig, LoadOptions};
use redress_db::{connect, migrations};

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
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
                "migrate",
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
        let run = migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8));
        pool.close().await;
        run
    });

    match result {
        Ok(run) => {
            let message = if run.newly_applied.is_empty() {
                format!(
                    "refund schema is up to date ({} migration(s) already applied)",
                    run.total_applied
                )
            } else {
                let applied: Vec<String> =
                    run.newly_applied.iter().map(|migration| format!("  - {migration}")).collect();
                format!("applied {} migration(s):\n{}", run.newly_applied.len(), applied.join("\n"))
            };
            CommandResult::success("migrate", message)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
