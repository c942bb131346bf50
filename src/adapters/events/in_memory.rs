//! In-memory event bus implementation.
//!
//! Provides synchronous, deterministic event delivery for unit tests
//! and single-process deployments. Handlers are invoked inline on
//! publish; a failing handler is logged and skipped, never propagated,
//! matching the best-effort delivery contract.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::ports::{EventHandler, EventPublisher, EventSubscriber};

/// In-memory event bus.
///
/// Features:
/// - Synchronous delivery (deterministic for tests)
/// - Event capture for assertions
/// - Handler registration and invocation
///
/// # Panics
///
/// Methods may panic if internal locks are poisoned.
pub struct InMemoryEventBus {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
    published: RwLock<Vec<EventEnvelope>>,
}

impl InMemoryEventBus {
    /// Creates a new empty event bus.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            published: RwLock::new(Vec::new()),
        }
    }

    // === Test helpers ===

    /// Returns all published events (for test assertions).
    pub fn published_events(&self) -> Vec<EventEnvelope> {
        self.published
            .read()
            .expect("InMemoryEventBus: published lock poisoned")
            .clone()
    }

    /// Returns events of a specific type.
    pub fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.published_events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    /// Returns events for a specific aggregate.
    pub fn events_for_aggregate(&self, aggregate_id: &str) -> Vec<EventEnvelope> {
        self.published_events()
            .into_iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .collect()
    }

    /// Returns count of published events.
    pub fn event_count(&self) -> usize {
        self.published
            .read()
            .expect("InMemoryEventBus: published lock poisoned")
            .len()
    }

    /// Checks if a specific event type was published.
    pub fn has_event(&self, event_type: &str) -> bool {
        !self.events_of_type(event_type).is_empty()
    }

    /// Clears all published events (for test isolation).
    pub fn clear(&self) {
        self.published
            .write()
            .expect("InMemoryEventBus: published write lock poisoned")
            .clear();
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let handlers: Vec<Arc<dyn EventHandler>> = {
            let map = self
                .handlers
                .read()
                .expect("InMemoryEventBus: handlers lock poisoned");
            map.get(&event.event_type).cloned().unwrap_or_default()
        };

        for handler in handlers {
            if let Err(err) = handler.handle(event.clone()).await {
                tracing::warn!(
                    handler = handler.name(),
                    event_type = %event.event_type,
                    error = %err,
                    "event handler failed"
                );
            }
        }

        self.published
            .write()
            .expect("InMemoryEventBus: published write lock poisoned")
            .push(event);
        Ok(())
    }

    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for InMemoryEventBus {
    async fn subscribe(
        &self,
        event_type: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), DomainError> {
        self.handlers
            .write()
            .expect("InMemoryEventBus: handlers write lock poisoned")
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Recorder {
        fn new(fail: bool) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
            if self.fail {
                return Err(DomainError::new(
                    crate::domain::foundation::ErrorCode::InternalError,
                    "boom",
                ));
            }
            self.seen.lock().unwrap().push(event.event_type);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "Recorder"
        }
    }

    fn envelope(event_type: &str) -> EventEnvelope {
        EventEnvelope::new(event_type, "deal-1", "Deal", json!({}))
    }

    #[tokio::test]
    async fn publish_captures_events() {
        let bus = InMemoryEventBus::new();
        bus.publish(envelope("deal.proposed.v1")).await.unwrap();
        bus.publish(envelope("deal.rejected.v1")).await.unwrap();

        assert_eq!(bus.event_count(), 2);
        assert!(bus.has_event("deal.proposed.v1"));
        assert_eq!(bus.events_of_type("deal.rejected.v1").len(), 1);
    }

    #[tokio::test]
    async fn subscribed_handler_receives_matching_events() {
        let bus = InMemoryEventBus::new();
        let recorder = Arc::new(Recorder::new(false));
        bus.subscribe("deal.proposed.v1", recorder.clone())
            .await
            .unwrap();

        bus.publish(envelope("deal.proposed.v1")).await.unwrap();
        bus.publish(envelope("deal.rejected.v1")).await.unwrap();

        assert_eq!(
            recorder.seen.lock().unwrap().clone(),
            vec!["deal.proposed.v1".to_string()]
        );
    }

    #[tokio::test]
    async fn failing_handler_does_not_fail_publish() {
        let bus = InMemoryEventBus::new();
        bus.subscribe("deal.proposed.v1", Arc::new(Recorder::new(true)))
            .await
            .unwrap();

        let result = bus.publish(envelope("deal.proposed.v1")).await;
        assert!(result.is_ok());
        assert_eq!(bus.event_count(), 1);
    }

    #[tokio::test]
    async fn events_for_aggregate_filters_by_id() {
        let bus = InMemoryEventBus::new();
        bus.publish(envelope("deal.proposed.v1")).await.unwrap();

        assert_eq!(bus.events_for_aggregate("deal-1").len(), 1);
        assert!(bus.events_for_aggregate("deal-2").is_empty());
    }
}
