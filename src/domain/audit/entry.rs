//! Audit log entries.
//!
//! The definitive history of a deal. Every state-changing operation
//! appends at least one entry in the same logical transaction as the
//! change it describes; entries are never edited or removed.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{AuditEntryId, DealId, Timestamp, UserId};

/// Partition of audit entries for downstream consumers.
///
/// Categories never affect transition logic. `Ord` covers regulatory
/// ad-marking duties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Terms,
    Payments,
    Files,
    General,
    Ord,
}

impl AuditCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditCategory::Terms => "terms",
            AuditCategory::Payments => "payments",
            AuditCategory::Files => "files",
            AuditCategory::General => "general",
            AuditCategory::Ord => "ord",
        }
    }
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuditCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "terms" => Ok(AuditCategory::Terms),
            "payments" => Ok(AuditCategory::Payments),
            "files" => Ok(AuditCategory::Files),
            "general" => Ok(AuditCategory::General),
            "ord" => Ok(AuditCategory::Ord),
            other => Err(format!("unknown audit category: {}", other)),
        }
    }
}

/// One immutable line in a deal's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: AuditEntryId,
    pub deal_id: DealId,
    pub user_id: UserId,
    /// Human-readable description of what happened.
    pub action: String,
    pub category: AuditCategory,
    /// Structured context (amounts, versions, status moves).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
    pub created_at: Timestamp,
}

impl AuditLogEntry {
    /// Records a new audit entry.
    pub fn record(
        deal_id: DealId,
        user_id: UserId,
        action: impl Into<String>,
        category: AuditCategory,
    ) -> Self {
        Self {
            id: AuditEntryId::new(),
            deal_id,
            user_id,
            action: action.into(),
            category,
            metadata: None,
            created_at: Timestamp::now(),
        }
    }

    /// Attaches structured metadata.
    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
