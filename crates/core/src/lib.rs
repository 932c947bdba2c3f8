pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod policy;
pub mod workflow;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use config::{
    AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, NotifyTransportKind,
};
pub use domain::order::{Order, OrderId, OrderStatus};
pub use domain::payment::{Payment, PaymentId, PaymentStatus};
pub use domain::ticket::{SupportTicket, TicketDraft, TicketId, TicketPriority, TicketStatus};
pub use errors::{DomainError, WorkflowError};
pub use policy::{RefundDecision, RefundPolicy};
pub use workflow::{
    Confirmation, Notification, NotificationKind, Notifier, NotifyError, OrderStore,
    PaymentProcessor, PaymentStore, ProcessorError, ProcessorRefund, ProcessorRefundRequest,
    RefundRequest, RefundWorkflow, StoreError, Ticketing, WorkflowOutcome, WorkflowTimeouts,
};
