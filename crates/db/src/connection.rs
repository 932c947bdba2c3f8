use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use redress_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Session pragmas applied to every pooled connection. WAL keeps concurrent
/// CLI invocations from serializing on the claim/release status writes; the
/// busy timeout covers a writer holding the lock mid-refund; foreign keys
/// back the order -> payment -> ticket references the stores rely on.
const SESSION_PRAGMAS: &[&str] =
    &["PRAGMA foreign_keys = ON", "PRAGMA journal_mode = WAL", "PRAGMA busy_timeout = 5000"];

/// Opens the pool described by `[database]` config. Every store in this
/// crate borrows the same pool; commands close it when they finish.
pub async fn connect(database: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(database.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(database.timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                for pragma in SESSION_PRAGMAS {
                    sqlx::query(pragma).execute(&mut *conn).await?;
                }
                Ok(())
            })
        })
        .connect(&database.url)
        .await
}
