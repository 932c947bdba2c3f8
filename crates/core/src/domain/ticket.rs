use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::OrderId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(pub String);

impl TicketId {
    /// Ticket ids follow the `TKT` + 8 hex chars convention exposed to
    /// customers for follow-ups.
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("TKT{}", hex[..8].to_ascii_uppercase()))
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Resolved,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Resolved => "resolved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => Some(Self::Open),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }
}

/// What the workflow supplies when it needs a human in the loop; the ticket
/// store assigns the id and timestamps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDraft {
    pub order_id: Option<OrderId>,
    pub contact_email: String,
    pub priority: TicketPriority,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportTicket {
    pub id: TicketId,
    pub order_id: Option<OrderId>,
    pub contact_email: String,
    pub priority: TicketPriority,
    pub description: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SupportTicket {
    pub fn open(draft: TicketDraft) -> Self {
        Self {
            id: TicketId::generate(),
            order_id: draft.order_id,
            contact_email: draft.contact_email,
            priority: draft.priority,
            description: draft.description,
            status: TicketStatus::Open,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{TicketDraft, TicketId, TicketPriority, TicketStatus};

    #[test]
    fn generated_ids_use_the_customer_facing_prefix() {
        let id = TicketId::generate();
        assert!(id.0.starts_with("TKT"));
        assert_eq!(id.0.len(), 11);
        assert!(id.0[3..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn opening_a_draft_starts_in_open_status() {
        let ticket = super::SupportTicket::open(TicketDraft {
            order_id: None,
            contact_email: "customer@example.com".to_string(),
            priority: TicketPriority::Medium,
            description: "customer declined automated refund".to_string(),
        });

        assert_eq!(ticket.status, TicketStatus::Open);
        assert!(ticket.resolved_at.is_none());
    }

    #[test]
    fn priority_round_trips_from_storage_encoding() {
        for priority in [TicketPriority::Low, TicketPriority::Medium, TicketPriority::High] {
            assert_eq!(TicketPriority::parse(priority.as_str()), Some(priority));
        }
    }
}
