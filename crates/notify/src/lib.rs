//! Best-effort customer notifications for refund workflow outcomes.
//!
//! Rendering (`message`) is separated from delivery (`dispatch`, `slack`):
//! the workflow talks to a `Notifier`, the `Dispatcher` renders once, and a
//! `NotifyTransport` moves the finished message.

pub mod dispatch;
pub mod message;
pub mod slack;

pub use dispatch::{Dispatcher, LogTransport, NotifyTransport};
pub use message::{render, RenderedMessage};
pub use slack::SlackTransport;
