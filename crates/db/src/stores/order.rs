use sqlx::Row;

use redress_core::domain::order::{Order, OrderId, OrderStatus};
use redress_core::workflow::{OrderStore, StoreError};

use super::{backend, decode_decimal, decode_timestamp};
use crate::DbPool;

pub struct SqlOrderStore {
    pool: DbPool,
}

impl SqlOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_order(row: &sqlx::sqlite::SqliteRow) -> Result<Order, StoreError> {
    let id: String = row.try_get("id").map_err(backend)?;
    let customer_id: String = row.try_get("customer_id").map_err(backend)?;
    let product: String = row.try_get("product").map_err(backend)?;
    let amount_str: String = row.try_get("amount").map_err(backend)?;
    let currency: String = row.try_get("currency").map_err(backend)?;
    let status_str: String = row.try_get("status").map_err(backend)?;
    let placed_at_str: String = row.try_get("placed_at").map_err(backend)?;

    let status = OrderStatus::parse(&status_str)
        .ok_or_else(|| StoreError::Backend(format!("order `{id}` has unknown status `{status_str}`")))?;

    Ok(Order {
        id: OrderId(id),
        customer_id,
        product,
        amount: decode_decimal("amount", &amount_str)?,
        currency,
        status,
        placed_at: decode_timestamp("placed_at", &placed_at_str)?,
    })
}

#[async_trait::async_trait]
impl OrderStore for SqlOrderStore {
    async fn find(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            "SELECT id, customer_id, product, amount, currency, status, placed_at
             FROM orders WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(ref r) => Ok(Some(row_to_order(r)?)),
            None => Ok(None),
        }
    }

    async fn transition_status(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<(), StoreError> {
        // The WHERE clause carries the compare-and-set: zero rows affected
        // means the stored status moved (or the row is gone) since load.
        let result = sqlx::query("UPDATE orders SET status = ? WHERE id = ? AND status = ?")
            .bind(next.as_str())
            .bind(&id.0)
            .bind(expected.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict { order_id: id.clone(), expected });
        }

        Ok(())
    }
}
