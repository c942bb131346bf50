//! Event infrastructure for domain event publishing.
//!
//! Every committed deal transition produces an event for external
//! subscribers (chat, notifications, read models). This module provides:
//! - `EventId` - Unique identifier for events (deduplication)
//! - `EventMetadata` - Tracing and correlation context
//! - `EventEnvelope` - Transport wrapper for domain events
//! - `DomainEvent` - Trait that all domain events implement
//! - `domain_event!` - Macro to simplify DomainEvent implementations

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

use super::Timestamp;

/// Trait that all domain events must implement.
///
/// Provides the contract for event identification, routing, ordering and
/// versioning. Use the `domain_event!` macro to implement this trait with
/// minimal boilerplate.
pub trait DomainEvent: Send + Sync {
    /// Returns the event type string (e.g., "deal.terms_accepted.v1").
    /// Used for routing and filtering.
    fn event_type(&self) -> &'static str;

    /// Returns the schema version number.
    /// MUST match the version suffix in event_type.
    fn schema_version(&self) -> u32;

    /// Returns the ID of the aggregate that emitted this event.
    fn aggregate_id(&self) -> String;

    /// Returns the type of aggregate (e.g., "Deal").
    fn aggregate_type(&self) -> &'static str;

    /// Returns when the event occurred.
    fn occurred_at(&self) -> Timestamp;

    /// Returns the unique ID for this event instance.
    fn event_id(&self) -> EventId;
}

/// Extension trait that provides `to_envelope()` for serializable domain
/// events. Automatically implemented for any `DomainEvent + Serialize`.
pub trait SerializableDomainEvent: DomainEvent + Serialize {
    /// Converts this domain event into an `EventEnvelope` for transport.
    fn to_envelope(&self) -> EventEnvelope {
        let event_type = self.event_type().to_string();
        let schema_version = EventEnvelope::extract_version(&event_type);

        EventEnvelope {
            event_id: self.event_id(),
            event_type,
            schema_version,
            aggregate_id: self.aggregate_id(),
            aggregate_type: self.aggregate_type().to_string(),
            occurred_at: self.occurred_at(),
            payload: serde_json::to_value(self)
                .expect("Event serialization should never fail for well-formed events"),
            metadata: EventMetadata::default(),
        }
    }
}

impl<T: DomainEvent + Serialize> SerializableDomainEvent for T {}

/// Macro to implement DomainEvent trait with minimal boilerplate.
///
/// # Example
///
/// ```ignore
/// domain_event!(
///     DealProposedEvent,
///     event_type = "deal.proposed.v1",
///     schema_version = 1,
///     aggregate_id = deal_id,
///     aggregate_type = "Deal",
///     occurred_at = created_at,
///     event_id = event_id
/// );
/// ```
#[macro_export]
macro_rules! domain_event {
    (
        $event_name:ident,
        event_type = $event_type:expr,
        schema_version = $schema_version:expr,
        aggregate_id = $agg_id_field:ident,
        aggregate_type = $agg_type:expr,
        occurred_at = $occurred_field:ident,
        event_id = $event_id_field:ident
    ) => {
        impl $crate::domain::foundation::DomainEvent for $event_name {
            fn event_type(&self) -> &'static str {
                $event_type
            }

            fn schema_version(&self) -> u32 {
                $schema_version
            }

            fn aggregate_id(&self) -> String {
                self.$agg_id_field.to_string()
            }

            fn aggregate_type(&self) -> &'static str {
                $agg_type
            }

            fn occurred_at(&self) -> $crate::domain::foundation::Timestamp {
                self.$occurred_field
            }

            fn event_id(&self) -> $crate::domain::foundation::EventId {
                self.$event_id_field.clone()
            }
        }
    };
}

// Re-export the macro
pub use domain_event;

/// Unique identifier for events (used for deduplication).
///
/// Unlike other IDs in the system, EventId uses a String internally
/// to allow for various ID formats while staying serializable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Creates a new random EventId using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Creates an EventId from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata for tracing and correlation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// ID linking related events across a single user request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// ID of the event that directly caused this event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,

    /// User who initiated the action that led to this event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Distributed tracing span/trace ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// Transport envelope for domain events.
///
/// Wraps event-specific data with metadata needed for routing
/// (event_type), deduplication (event_id), correlation (aggregate_id,
/// metadata), ordering (occurred_at) and versioning (schema_version).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique ID for this event instance.
    pub event_id: EventId,

    /// Event type for routing (e.g., "deal.proposed.v1").
    pub event_type: String,

    /// Schema version number (extracted from event_type).
    pub schema_version: u32,

    /// ID of the aggregate that emitted this event.
    pub aggregate_id: String,

    /// Type of aggregate (e.g., "Deal").
    pub aggregate_type: String,

    /// When the event occurred.
    pub occurred_at: Timestamp,

    /// Event-specific payload as JSON.
    pub payload: JsonValue,

    /// Tracing and correlation metadata.
    pub metadata: EventMetadata,
}

impl EventEnvelope {
    /// Creates a new EventEnvelope with required fields.
    ///
    /// Automatically extracts the schema version from the event_type
    /// suffix (e.g., "deal.proposed.v2" -> 2), defaulting to v1.
    pub fn new(
        event_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        payload: JsonValue,
    ) -> Self {
        let event_type = event_type.into();
        let schema_version = Self::extract_version(&event_type);

        Self {
            event_id: EventId::new(),
            event_type,
            schema_version,
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.into(),
            occurred_at: Timestamp::now(),
            payload,
            metadata: EventMetadata::default(),
        }
    }

    /// Extracts the version number from an event_type string.
    pub(crate) fn extract_version(event_type: &str) -> u32 {
        event_type
            .rsplit_once(".v")
            .and_then(|(_, version_str)| version_str.parse::<u32>().ok())
            .unwrap_or(1)
    }

    /// Add correlation ID for request tracing.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.correlation_id = Some(id.into());
        self
    }

    /// Add causation ID (ID of event that caused this one).
    pub fn with_causation_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.causation_id = Some(id.into());
        self
    }

    /// Add user ID for audit.
    pub fn with_user_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.user_id = Some(id.into());
        self
    }

    /// Deserialize the payload to a specific event type.
    pub fn payload_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_id_generates_unique_values() {
        let id1 = EventId::new();
        let id2 = EventId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn event_envelope_new_creates_with_defaults() {
        let envelope = EventEnvelope::new(
            "deal.proposed.v1",
            "deal-123",
            "Deal",
            json!({"title": "Spring campaign"}),
        );

        assert_eq!(envelope.event_type, "deal.proposed.v1");
        assert_eq!(envelope.aggregate_id, "deal-123");
        assert_eq!(envelope.aggregate_type, "Deal");
        assert_eq!(envelope.schema_version, 1);
        assert_eq!(envelope.payload["title"], "Spring campaign");
        assert!(envelope.metadata.correlation_id.is_none());
    }

    #[test]
    fn event_envelope_extracts_version_from_event_type() {
        let envelope = EventEnvelope::new("deal.proposed.v2", "deal-123", "Deal", json!({}));
        assert_eq!(envelope.schema_version, 2);
    }

    #[test]
    fn event_envelope_defaults_to_v1_without_version_suffix() {
        let envelope = EventEnvelope::new("legacy.event", "agg-123", "Legacy", json!({}));
        assert_eq!(envelope.schema_version, 1);
    }

    #[test]
    fn event_envelope_builder_chain() {
        let envelope = EventEnvelope::new("test.event", "agg-1", "Test", json!({}))
            .with_correlation_id("req-123")
            .with_causation_id("evt-0")
            .with_user_id("adv-456");

        assert_eq!(envelope.metadata.correlation_id, Some("req-123".to_string()));
        assert_eq!(envelope.metadata.causation_id, Some("evt-0".to_string()));
        assert_eq!(envelope.metadata.user_id, Some("adv-456".to_string()));
    }

    #[test]
    fn event_envelope_payload_as_deserializes() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct TestPayload {
            value: i32,
        }

        let envelope = EventEnvelope::new("test.event", "agg-1", "Test", json!({"value": 42}));

        let payload: TestPayload = envelope.payload_as().unwrap();
        assert_eq!(payload.value, 42);
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct TestDealProposed {
        event_id: EventId,
        deal_id: String,
        occurred_at: Timestamp,
    }

    impl DomainEvent for TestDealProposed {
        fn event_type(&self) -> &'static str {
            "test.deal.proposed.v1"
        }

        fn schema_version(&self) -> u32 {
            1
        }

        fn aggregate_id(&self) -> String {
            self.deal_id.clone()
        }

        fn aggregate_type(&self) -> &'static str {
            "Deal"
        }

        fn occurred_at(&self) -> Timestamp {
            self.occurred_at
        }

        fn event_id(&self) -> EventId {
            self.event_id.clone()
        }
    }

    #[test]
    fn domain_event_to_envelope_creates_valid_envelope() {
        let event = TestDealProposed {
            event_id: EventId::from_string("evt-123"),
            deal_id: "deal-456".to_string(),
            occurred_at: Timestamp::now(),
        };

        let envelope = event.to_envelope();

        assert_eq!(envelope.event_id.as_str(), "evt-123");
        assert_eq!(envelope.event_type, "test.deal.proposed.v1");
        assert_eq!(envelope.aggregate_id, "deal-456");
        assert_eq!(envelope.aggregate_type, "Deal");
    }

    #[test]
    fn domain_event_to_envelope_preserves_occurred_at() {
        let occurred_at = Timestamp::now();
        let event = TestDealProposed {
            event_id: EventId::new(),
            deal_id: "deal-1".to_string(),
            occurred_at,
        };

        assert_eq!(event.to_envelope().occurred_at, occurred_at);
    }
}
