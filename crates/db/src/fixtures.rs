use sqlx::Executor;

use redress_core::workflow::StoreError;

use crate::connection::DbPool;
use crate::stores::backend;

/// Contract for one seeded order: what state it is in and which workflow
/// branch it exercises.
struct SeedOrderContract {
    order_id: &'static str,
    status: &'static str,
    amount: &'static str,
    payment_status: Option<&'static str>,
    branch: &'static str,
}

const SEED_ORDERS: &[SeedOrderContract] = &[
    SeedOrderContract {
        order_id: "ORD0001",
        status: "pending",
        amount: "49.99",
        payment_status: None,
        branch: "unpaid order is not refundable",
    },
    SeedOrderContract {
        order_id: "ORD0002",
        status: "processing",
        amount: "79.99",
        payment_status: Some("succeeded"),
        branch: "refundable order for retry scenarios",
    },
    SeedOrderContract {
        order_id: "ORD0003",
        status: "delivered",
        amount: "45.00",
        payment_status: Some("succeeded"),
        branch: "automated refund under the ceiling",
    },
    SeedOrderContract {
        order_id: "ORD0004",
        status: "cancelled",
        amount: "99.99",
        payment_status: None,
        branch: "cancelled order is not refundable",
    },
    SeedOrderContract {
        order_id: "ORD0005",
        status: "refunded",
        amount: "89.99",
        payment_status: Some("refunded"),
        branch: "duplicate refund rejection",
    },
    SeedOrderContract {
        order_id: "ORD0006",
        status: "delivered",
        amount: "979.57",
        payment_status: Some("succeeded"),
        branch: "escalation above the ceiling",
    },
    SeedOrderContract {
        order_id: "ORD0007",
        status: "shipped",
        amount: "29.99",
        payment_status: Some("failed"),
        branch: "failed payment is not refundable",
    },
    SeedOrderContract {
        order_id: "ORD0008",
        status: "delivered",
        amount: "119.99",
        payment_status: None,
        branch: "missing payment row is surfaced",
    },
];

const SEED_CUSTOMER_COUNT: i64 = 8;

/// Deterministic order/payment seed covering every refund-workflow branch.
pub struct SeedDataset;

impl SeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/seed_orders.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedSummary, StoreError> {
        let mut tx = pool.begin().await.map_err(backend)?;
        tx.execute(sqlx::query(Self::SQL)).await.map_err(backend)?;
        tx.commit().await.map_err(backend)?;

        let orders_seeded = SEED_ORDERS
            .iter()
            .map(|order| SeedOrderInfo { order_id: order.order_id, branch: order.branch })
            .collect::<Vec<_>>();

        Ok(SeedSummary { orders_seeded })
    }

    /// Verify that seed data exists and still matches the contract.
    pub async fn verify(pool: &DbPool) -> Result<SeedVerification, StoreError> {
        let mut checks = Vec::new();

        let customer_count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM customers")
            .fetch_one(pool)
            .await
            .map_err(backend)?;
        checks.push(SeedCheck {
            label: "customers".to_string(),
            passed: customer_count == SEED_CUSTOMER_COUNT,
        });

        for order in SEED_ORDERS {
            let order_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM orders WHERE id = ?1 AND status = ?2 AND amount = ?3)",
            )
            .bind(order.order_id)
            .bind(order.status)
            .bind(order.amount)
            .fetch_one(pool)
            .await
            .map_err(backend)?;
            checks.push(SeedCheck { label: order.order_id.to_string(), passed: order_ok == 1 });

            let payment_ok: i64 = match order.payment_status {
                Some(status) => sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM payments WHERE order_id = ?1 AND status = ?2)",
                )
                .bind(order.order_id)
                .bind(status)
                .fetch_one(pool)
                .await
                .map_err(backend)?,
                None => {
                    let missing: i64 = sqlx::query_scalar(
                        "SELECT NOT EXISTS(SELECT 1 FROM payments WHERE order_id = ?1)",
                    )
                    .bind(order.order_id)
                    .fetch_one(pool)
                    .await
                    .map_err(backend)?;
                    missing
                }
            };
            checks.push(SeedCheck {
                label: format!("{}-payment", order.order_id),
                passed: payment_ok == 1,
            });
        }

        Ok(SeedVerification { checks })
    }
}

#[derive(Clone, Debug)]
pub struct SeedSummary {
    pub orders_seeded: Vec<SeedOrderInfo>,
}

#[derive(Clone, Copy, Debug)]
pub struct SeedOrderInfo {
    pub order_id: &'static str,
    pub branch: &'static str,
}

#[derive(Clone, Debug)]
pub struct SeedVerification {
    pub checks: Vec<SeedCheck>,
}

#[derive(Clone, Debug)]
pub struct SeedCheck {
    pub label: String,
    pub passed: bool,
}

impl SeedVerification {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|check| check.passed)
    }

    pub fn failures(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|check| !check.passed)
            .map(|check| check.label.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use redress_core::config::DatabaseConfig;

    use super::SeedDataset;
    use crate::{connect, migrations};

    fn memory_database() -> DatabaseConfig {
        DatabaseConfig { url: "sqlite::memory:".to_string(), max_connections: 1, timeout_secs: 30 }
    }

    #[tokio::test]
    async fn seed_loads_and_verifies_against_the_contract() {
        let pool = connect(&memory_database()).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let summary = SeedDataset::load(&pool).await.expect("load seed");
        assert_eq!(summary.orders_seeded.len(), 8);

        let verification = SeedDataset::verify(&pool).await.expect("verify seed");
        assert!(verification.all_passed(), "failed checks: {:?}", verification.failures());
    }

    #[tokio::test]
    async fn verify_detects_drift() {
        let pool = connect(&memory_database()).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        SeedDataset::load(&pool).await.expect("load seed");

        sqlx::query("UPDATE orders SET status = 'refunded' WHERE id = 'ORD0003'")
            .execute(&pool)
            .await
            .expect("mutate seeded order");

        let verification = SeedDataset::verify(&pool).await.expect("verify seed");
        assert!(!verification.all_passed());
        assert!(verification.failures().contains(&"ORD0003"));
    }
}
