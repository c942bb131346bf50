//! RejectDealHandler - declines a proposal or counter-offer. Terminal.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::audit::{AuditCategory, AuditLogEntry};
use crate::domain::foundation::{
    domain_event, CommandMetadata, DealId, DomainError, ErrorCode, EventId,
    SerializableDomainEvent, Timestamp, UserId,
};
use crate::ports::{DealNotification, DealReader, DealRepository, EventPublisher, Notifier};

use super::DealCommandResult;

/// Command to reject a deal.
#[derive(Debug, Clone)]
pub struct RejectDealCommand {
    pub deal_id: DealId,
    pub reason: Option<String>,
}

/// Event published when a deal is rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealRejectedEvent {
    pub event_id: EventId,
    pub deal_id: DealId,
    pub rejected_by: UserId,
    pub reason: Option<String>,
    pub occurred_at: Timestamp,
}

domain_event!(
    DealRejectedEvent,
    event_type = "deal.rejected.v1",
    schema_version = 1,
    aggregate_id = deal_id,
    aggregate_type = "Deal",
    occurred_at = occurred_at,
    event_id = event_id
);

/// Handler for rejecting deals. Either party may reject while the deal
/// is still in negotiation; the latest terms version stays a draft
/// forever.
pub struct RejectDealHandler {
    repository: Arc<dyn DealRepository>,
    reader: Arc<dyn DealReader>,
    event_publisher: Arc<dyn EventPublisher>,
    notifier: Arc<dyn Notifier>,
}

impl RejectDealHandler {
    pub fn new(
        repository: Arc<dyn DealRepository>,
        reader: Arc<dyn DealReader>,
        event_publisher: Arc<dyn EventPublisher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repository,
            reader,
            event_publisher,
            notifier,
        }
    }

    pub async fn handle(
        &self,
        cmd: RejectDealCommand,
        metadata: CommandMetadata,
    ) -> Result<DealCommandResult, DomainError> {
        let mut deal = self
            .reader
            .find_deal(&cmd.deal_id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;
        deal.check_party(&metadata.user_id)?;

        let expected_version = deal.record_version;
        deal.reject(cmd.reason.clone())?;

        let audit = AuditLogEntry::record(
            deal.id,
            metadata.user_id.clone(),
            "Rejected the deal",
            AuditCategory::Terms,
        )
        .with_metadata(serde_json::json!({ "reason": &cmd.reason }));

        self.repository
            .update(&deal, expected_version, &[audit.clone()])
            .await?;

        let event = DealRejectedEvent {
            event_id: EventId::new(),
            deal_id: deal.id,
            rejected_by: metadata.user_id.clone(),
            reason: cmd.reason,
            occurred_at: deal.rejected_at.unwrap_or(deal.updated_at),
        };
        let envelope = event
            .to_envelope()
            .with_correlation_id(metadata.correlation_id())
            .with_user_id(metadata.user_id.to_string());
        if let Err(err) = self.event_publisher.publish(envelope).await {
            tracing::warn!(deal_id = %deal.id, error = %err, "failed to publish deal event");
        }

        if let Some(recipient) = deal.counterparty_of(&metadata.user_id) {
            let notification = DealNotification::new(
                deal.id,
                recipient.clone(),
                "Deal rejected",
                format!("\"{}\" was rejected", deal.title),
            );
            if let Err(err) = self.notifier.notify(notification).await {
                tracing::warn!(deal_id = %deal.id, error = %err, "failed to dispatch notification");
            }
        }

        Ok(DealCommandResult {
            deal,
            audit: vec![audit],
        })
    }
}
