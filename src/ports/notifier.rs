//! Notifier port - best-effort notification dispatch.
//!
//! Called on every transition; delivery is fire and forget. A failure
//! to notify must never roll back the state change, but should be
//! logged by the caller for observability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DealId, DomainError, UserId};

/// One notification about a deal, addressed to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealNotification {
    pub deal_id: DealId,
    pub recipient_id: UserId,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl DealNotification {
    /// Builds a notification with the conventional deal link.
    pub fn new(
        deal_id: DealId,
        recipient_id: UserId,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            deal_id,
            recipient_id,
            title: title.into(),
            message: message.into(),
            link: Some(format!("/deals/{}", deal_id)),
        }
    }
}

/// Port for dispatching notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Dispatches a notification. Best effort.
    async fn notify(&self, notification: DealNotification) -> Result<(), DomainError>;
}
