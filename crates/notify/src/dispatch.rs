use async_trait::async_trait;
use tracing::info;

use redress_core::workflow::{Notification, Notifier, NotifyError};

use crate::message::{render, RenderedMessage};

/// Delivery seam below the workflow's `Notifier`: rendering happens once in
/// the dispatcher, transports only move the finished message.
#[async_trait]
pub trait NotifyTransport: Send + Sync {
    async fn deliver(
        &self,
        recipient: &str,
        message: &RenderedMessage,
    ) -> Result<(), NotifyError>;
}

pub struct Dispatcher {
    transport: Box<dyn NotifyTransport>,
}

impl Dispatcher {
    pub fn new(transport: Box<dyn NotifyTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Notifier for Dispatcher {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        let message = render(&notification);
        self.transport.deliver(&notification.contact_email, &message).await?;

        info!(
            event_name = "notify.delivered",
            kind = notification.kind.as_str(),
            recipient = %notification.contact_email,
            "notification delivered"
        );
        Ok(())
    }
}

/// Logs the rendered message instead of sending it. Default transport for
/// local development and the test fixtures.
#[derive(Default)]
pub struct LogTransport;

#[async_trait]
impl NotifyTransport for LogTransport {
    async fn deliver(
        &self,
        recipient: &str,
        message: &RenderedMessage,
    ) -> Result<(), NotifyError> {
        info!(
            event_name = "notify.log_transport",
            recipient,
            subject = %message.subject,
            body = %message.body,
            "notification (log transport)"
        );
        Ok(())
    }
}
