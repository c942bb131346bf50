//! EventPublisher port - Interface for publishing domain events.
//!
//! The core emits an event on every committed transition; any transport
//! (polling, push, webhook) consumes the feed. Publishing is best
//! effort from the command handler's point of view: a failed publish is
//! logged, never rolled back into the transition.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Port for publishing domain events.
///
/// Implementations must ensure:
/// - Events are delivered at-least-once (handlers may receive duplicates)
/// - Errors are propagated to the caller, who decides whether they are
///   fatal (they are not, for committed deal transitions)
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single event.
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Publish multiple events in order, best effort per event.
    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn EventPublisher) {}
}
