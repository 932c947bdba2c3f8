use std::collections::HashSet;

use sqlx::migrate::{MigrateError, Migrator};
use sqlx::Row;

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// What one `run_pending` call changed: the migrations newly applied this
/// run (rendered `NNNN description`) and the total applied overall. The CLI
/// reports these so an operator can tell a fresh install from a no-op.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationRun {
    pub newly_applied: Vec<String>,
    pub total_applied: usize,
}

pub async fn run_pending(pool: &DbPool) -> Result<MigrationRun, MigrateError> {
    let before: HashSet<i64> =
        applied_migrations(pool).await?.into_iter().map(|(version, _)| version).collect();

    MIGRATOR.run(pool).await?;

    let after = applied_migrations(pool).await?;
    let newly_applied = after
        .iter()
        .filter(|(version, _)| !before.contains(version))
        .map(|(version, description)| format!("{version:04} {description}"))
        .collect();

    Ok(MigrationRun { newly_applied, total_applied: after.len() })
}

async fn applied_migrations(pool: &DbPool) -> Result<Vec<(i64, String)>, MigrateError> {
    let ledger_exists: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;
    if ledger_exists == 0 {
        return Ok(Vec::new());
    }

    let rows = sqlx::query("SELECT version, description FROM _sqlx_migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| (row.get::<i64, _>("version"), row.get::<String, _>("description")))
        .collect())
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use redress_core::config::DatabaseConfig;

    use super::run_pending;
    use crate::{connect, migrations::MIGRATOR};

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "customers",
        "orders",
        "payments",
        "support_tickets",
        "idx_orders_customer_id",
        "idx_orders_status",
        "idx_payments_order_id",
        "idx_support_tickets_order_id",
        "idx_support_tickets_status",
    ];

    fn memory_database() -> DatabaseConfig {
        DatabaseConfig { url: "sqlite::memory:".to_string(), max_connections: 1, timeout_secs: 30 }
    }

    #[tokio::test]
    async fn migrations_create_baseline_tables() {
        let pool = connect(&memory_database()).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in ["customers", "orders", "payments", "support_tickets"] {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .expect("check table")
            .get::<i64, _>("count");

            assert_eq!(count, 1, "table `{table}` should exist after migration");
        }
    }

    #[tokio::test]
    async fn first_run_reports_the_baseline_and_reruns_report_nothing() {
        let pool = connect(&memory_database()).await.expect("connect");

        let first = run_pending(&pool).await.expect("run migrations");
        assert_eq!(first.newly_applied, vec!["0001 baseline".to_string()]);
        assert_eq!(first.total_applied, 1);

        let second = run_pending(&pool).await.expect("re-run migrations");
        assert!(second.newly_applied.is_empty(), "rerun should apply nothing");
        assert_eq!(second.total_applied, 1);
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect(&memory_database()).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let order_count = sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = 'orders'",
        )
        .fetch_one(&pool)
        .await
        .expect("check orders table removed")
        .get::<i64, _>("count");

        assert_eq!(order_count, 0);
    }

    #[tokio::test]
    async fn migrations_up_down_up_preserves_schema_signature() {
        let pool = connect(&memory_database()).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let initial_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            initial_signature.len(),
            MANAGED_SCHEMA_OBJECTS.len(),
            "initial migration pass should create all managed schema objects",
        );

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let after_down_signature = managed_schema_signature(&pool).await;
        assert!(
            after_down_signature.is_empty(),
            "managed schema objects should be removed after full undo",
        );

        run_pending(&pool).await.expect("re-run migrations");

        let after_second_up_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            after_second_up_signature, initial_signature,
            "up/down/up should preserve migration-managed schema signature",
        );
    }

    async fn managed_schema_signature(pool: &sqlx::SqlitePool) -> Vec<(String, String, String)> {
        let mut signature: Vec<(String, String, String)> = sqlx::query(
            "SELECT type, name, IFNULL(sql, '') AS sql
             FROM sqlite_master
             WHERE type IN ('table', 'index')",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects")
        .into_iter()
        .filter_map(|row| {
            let name = row.get::<String, _>("name");
            if MANAGED_SCHEMA_OBJECTS.contains(&name.as_str()) {
                Some((row.get::<String, _>("type"), name, row.get::<String, _>("sql")))
            } else {
                None
            }
        })
        .collect();
        signature.sort();
        signature
    }
}
