use redress_core::workflow::{Notification, NotificationKind};

/// Rendered customer-facing message, transport-agnostic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

pub fn render(notification: &Notification) -> RenderedMessage {
    match notification.kind {
        NotificationKind::RefundProcessed => render_refund_processed(notification),
        NotificationKind::TicketCreated => render_ticket_created(notification),
    }
}

fn order_label(notification: &Notification) -> String {
    notification
        .order_id
        .as_ref()
        .map(|id| id.0.clone())
        .unwrap_or_else(|| "your order".to_string())
}

fn amount_line(notification: &Notification) -> Option<String> {
    match (&notification.amount, &notification.currency) {
        (Some(amount), Some(currency)) => Some(format!("Refund amount: {amount} {currency}")),
        _ => None,
    }
}

fn render_refund_processed(notification: &Notification) -> RenderedMessage {
    let order = order_label(notification);
    let mut lines = vec![format!("We are processing your refund request for order {order}.")];
    if let Some(amount) = amount_line(notification) {
        lines.push(amount);
    }
    if let Some(reference) = &notification.refund_reference {
        lines.push(format!("Refund reference: {reference}"));
    }
    lines.push(
        "The refund has been initiated and will be credited to your original payment method \
         within 5-7 business days."
            .to_string(),
    );

    RenderedMessage {
        subject: format!("Refund confirmation for order {order}"),
        body: lines.join("\n"),
    }
}

fn render_ticket_created(notification: &Notification) -> RenderedMessage {
    let order = order_label(notification);
    let ticket = notification
        .ticket_id
        .as_ref()
        .map(|id| id.0.clone())
        .unwrap_or_else(|| "pending".to_string());

    let mut lines = vec![format!(
        "A support ticket ({ticket}) has been opened for your refund request on order {order}."
    )];
    if let Some(amount) = amount_line(notification) {
        lines.push(amount);
    }
    lines.push(
        "Our support team will review it and follow up at this email address.".to_string(),
    );

    RenderedMessage {
        subject: format!("Support ticket {ticket} created"),
        body: lines.join("\n"),
    }
}
