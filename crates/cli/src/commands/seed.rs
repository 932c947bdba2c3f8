use redress_core::config::{AppConfig, LoadOptions};
use redress_db::{connect, migrations, SeedDataset, SeedOrderInfo};

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
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
                "seed",
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

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let summary = SeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = SeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<Vec<SeedOrderInfo>, (&'static str, String, u8)> =
            if verification.all_passed() {
                Ok(summary.orders_seeded)
            } else {
                let failures = verification.failures();
                let message = if failures.is_empty() {
                    "some seed data failed to load".to_string()
                } else {
                    format!("seed verification failed for checks: {}", failures.join(", "))
                };
                Err(("seed_verification", message, 6u8))
            };

        pool.close().await;
        run_result
    });

    match result {
        Ok(orders) => {
            let order_lines: Vec<String> = orders
                .iter()
                .map(|order| format!("  - {}: {}", order.order_id, order.branch))
                .collect();
            let message = format!(
                "seed dataset loaded; every workflow branch is covered:\n{}",
                order_lines.join("\n")
            );
            CommandResult::success("seed", message)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
