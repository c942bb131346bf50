//! Tracing-backed notification sink.
//!
//! Stands in for an external notification dispatcher: every
//! notification is emitted as a structured log line. Delivery to real
//! channels (push, email, chat) is a separate service consuming the
//! event feed.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::ports::{DealNotification, Notifier};

/// Notifier that writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: DealNotification) -> Result<(), DomainError> {
        tracing::info!(
            deal_id = %notification.deal_id,
            recipient = %notification.recipient_id,
            title = %notification.title,
            link = notification.link.as_deref().unwrap_or(""),
            "deal notification dispatched"
        );
        Ok(())
    }
}
