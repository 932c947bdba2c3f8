pub mod collaborators;
pub mod engine;
pub mod memory;
pub mod outcome;

pub use collaborators::{
    Notification, NotificationKind, Notifier, NotifyError, OrderStore, PaymentProcessor,
    PaymentStore, ProcessorError, ProcessorRefund, ProcessorRefundRequest, StoreError, Ticketing,
};
pub use engine::{RefundWorkflow, WorkflowTimeouts};
pub use memory::{
    InMemoryNotifier, InMemoryOrderStore, InMemoryPaymentStore, InMemoryTicketing,
    ScriptedProcessor,
};
pub use outcome::{Confirmation, RefundRequest, WorkflowOutcome};
