use sqlx::Row;

use redress_core::domain::order::OrderId;
use redress_core::domain::payment::{Payment, PaymentId, PaymentStatus};
use redress_core::workflow::{PaymentStore, StoreError};

use super::{backend, decode_decimal, decode_timestamp};
use crate::DbPool;

pub struct SqlPaymentStore {
    pool: DbPool,
}

impl SqlPaymentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_payment(row: &sqlx::sqlite::SqliteRow) -> Result<Payment, StoreError> {
    let id: String = row.try_get("id").map_err(backend)?;
    let order_id: String = row.try_get("order_id").map_err(backend)?;
    let processor_reference: String = row.try_get("processor_reference").map_err(backend)?;
    let amount_str: String = row.try_get("amount").map_err(backend)?;
    let currency: String = row.try_get("currency").map_err(backend)?;
    let status_str: String = row.try_get("status").map_err(backend)?;
    let created_at_str: String = row.try_get("created_at").map_err(backend)?;

    let status = PaymentStatus::parse(&status_str).ok_or_else(|| {
        StoreError::Backend(format!("payment `{id}` has unknown status `{status_str}`"))
    })?;

    Ok(Payment {
        id: PaymentId(id),
        order_id: OrderId(order_id),
        processor_reference,
        amount: decode_decimal("amount", &amount_str)?,
        currency,
        status,
        created_at: decode_timestamp("created_at", &created_at_str)?,
    })
}

#[async_trait::async_trait]
impl PaymentStore for SqlPaymentStore {
    async fn find_for_order(&self, order_id: &OrderId) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query(
            "SELECT id, order_id, processor_reference, amount, currency, status, created_at
             FROM payments WHERE order_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
        )
        .bind(&order_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(ref r) => Ok(Some(row_to_payment(r)?)),
            None => Ok(None),
        }
    }

    async fn mark_refunded(&self, id: &PaymentId) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE payments SET status = 'refunded' WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(format!("payment `{}` not found", id.0)));
        }

        Ok(())
    }
}
