use sqlx::Row;

use redress_core::domain::order::OrderId;
use redress_core::domain::ticket::{SupportTicket, TicketDraft, TicketId, TicketPriority, TicketStatus};
use redress_core::workflow::{StoreError, Ticketing};

use super::{backend, decode_timestamp};
use crate::DbPool;

pub struct SqlTicketStore {
    pool: DbPool,
}

impl SqlTicketStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list_open(&self) -> Result<Vec<SupportTicket>, StoreError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, order_id, contact_email, priority, status, description, created_at,
                    resolved_at
             FROM support_tickets WHERE status = 'open' ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(row_to_ticket).collect()
    }
}

fn row_to_ticket(row: &sqlx::sqlite::SqliteRow) -> Result<SupportTicket, StoreError> {
    let id: String = row.try_get("id").map_err(backend)?;
    let order_id: Option<String> = row.try_get("order_id").map_err(backend)?;
    let contact_email: String = row.try_get("contact_email").map_err(backend)?;
    let priority_str: String = row.try_get("priority").map_err(backend)?;
    let status_str: String = row.try_get("status").map_err(backend)?;
    let description: String = row.try_get("description").map_err(backend)?;
    let created_at_str: String = row.try_get("created_at").map_err(backend)?;
    let resolved_at_str: Option<String> = row.try_get("resolved_at").map_err(backend)?;

    let priority = TicketPriority::parse(&priority_str).ok_or_else(|| {
        StoreError::Backend(format!("ticket `{id}` has unknown priority `{priority_str}`"))
    })?;
    let status = TicketStatus::parse(&status_str).ok_or_else(|| {
        StoreError::Backend(format!("ticket `{id}` has unknown status `{status_str}`"))
    })?;

    Ok(SupportTicket {
        id: TicketId(id),
        order_id: order_id.map(OrderId),
        contact_email,
        priority,
        status,
        description,
        created_at: decode_timestamp("created_at", &created_at_str)?,
        resolved_at: resolved_at_str
            .map(|raw| decode_timestamp("resolved_at", &raw))
            .transpose()?,
    })
}

#[async_trait::async_trait]
impl Ticketing for SqlTicketStore {
    async fn create(&self, draft: TicketDraft) -> Result<SupportTicket, StoreError> {
        let ticket = SupportTicket::open(draft);

        sqlx::query(
            "INSERT INTO support_tickets (id, order_id, contact_email, priority, status,
                                          description, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&ticket.id.0)
        .bind(ticket.order_id.as_ref().map(|id| id.0.as_str()))
        .bind(&ticket.contact_email)
        .bind(ticket.priority.as_str())
        .bind(ticket.status.as_str())
        .bind(&ticket.description)
        .bind(ticket.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(ticket)
    }

    async fn find(&self, id: &TicketId) -> Result<Option<SupportTicket>, StoreError> {
        let row = sqlx::query(
            "SELECT id, order_id, contact_email, priority, status, description, created_at,
                    resolved_at
             FROM support_tickets WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(ref r) => Ok(Some(row_to_ticket(r)?)),
            None => Ok(None),
        }
    }

    async fn resolve(&self, id: &TicketId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE support_tickets SET status = 'resolved', resolved_at = ?
             WHERE id = ? AND status = 'open'",
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }
}
