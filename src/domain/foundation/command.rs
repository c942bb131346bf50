//! Command infrastructure for CQRS handlers.
//!
//! Instead of each handler accepting `correlation_id: Option<String>,
//! user_id: UserId, source: Option<String>`, they accept a single
//! `CommandMetadata` struct, which keeps signatures stable as
//! metadata fields are added.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

/// Metadata context for command handlers.
///
/// Carries the acting user plus tracing context through the command
/// processing pipeline and into emitted events and audit entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMetadata {
    /// The user executing this command (required for authorization).
    pub user_id: UserId,

    /// Links related operations across a single user request.
    /// Generated at the API boundary if not provided.
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,

    /// Source of this command (e.g., "api", "scheduler").
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

impl CommandMetadata {
    /// Creates new command metadata with required user ID.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            correlation_id: None,
            source: None,
        }
    }

    /// Builder: Add correlation ID for request tracing.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Builder: Add source identifier.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns the correlation ID, generating one if not set.
    pub fn correlation_id(&self) -> String {
        self.correlation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }

    /// Returns the correlation ID only if explicitly set.
    pub fn correlation_id_opt(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Returns the source if set.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

#[cfg(test)]
impl CommandMetadata {
    /// Creates a test fixture with a test user ID.
    pub fn test_fixture() -> Self {
        Self::new(UserId::new("test-user-123").unwrap())
            .with_correlation_id("test-correlation-id")
            .with_source("test")
    }
}
