//! EventSubscriber port - Interface for subscribing to domain events.
//!
//! Collaborators (chat, notification fan-out, read models) register
//! interest in event types without knowing the transport.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Handler for processing domain events.
///
/// Implementations should be:
/// - **Idempotent** - safe to call multiple times with the same event
/// - **Quick** - long operations should be queued for async processing
/// - **Isolated** - errors don't affect other handlers
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Process an event.
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Handler name for logging and metrics.
    fn name(&self) -> &'static str;
}

/// Port for subscribing to domain events.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Registers a handler for a specific event type
    /// (e.g. "deal.terms_accepted.v1").
    async fn subscribe(
        &self,
        event_type: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn EventSubscriber) {}

    #[allow(dead_code)]
    fn assert_handler_object_safe(_: &dyn EventHandler) {}
}
