//! MarkDraftSubmittedHandler - moves the work into review.
//!
//! Gated on attachment existence: a draft cannot go to review with zero
//! draft files on the deal.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::audit::{AuditCategory, AuditLogEntry};
use crate::domain::deal::DealRole;
use crate::domain::foundation::{
    domain_event, CommandMetadata, DealId, DomainError, ErrorCode, EventId,
    SerializableDomainEvent, Timestamp, UserId,
};
use crate::ports::{
    DealNotification, DealReader, DealRepository, EventPublisher, FileCategory, FileGate, Notifier,
};

use super::DealCommandResult;

/// Command to submit the current draft for review.
#[derive(Debug, Clone)]
pub struct MarkDraftSubmittedCommand {
    pub deal_id: DealId,
}

/// Event published when a draft goes to review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftSubmittedEvent {
    pub event_id: EventId,
    pub deal_id: DealId,
    pub submitted_by: UserId,
    pub occurred_at: Timestamp,
}

domain_event!(
    DraftSubmittedEvent,
    event_type = "deal.draft_submitted.v1",
    schema_version = 1,
    aggregate_id = deal_id,
    aggregate_type = "Deal",
    occurred_at = occurred_at,
    event_id = event_id
);

/// Handler for submitting drafts. Creator only.
pub struct MarkDraftSubmittedHandler {
    repository: Arc<dyn DealRepository>,
    reader: Arc<dyn DealReader>,
    file_gate: Arc<dyn FileGate>,
    event_publisher: Arc<dyn EventPublisher>,
    notifier: Arc<dyn Notifier>,
}

impl MarkDraftSubmittedHandler {
    pub fn new(
        repository: Arc<dyn DealRepository>,
        reader: Arc<dyn DealReader>,
        file_gate: Arc<dyn FileGate>,
        event_publisher: Arc<dyn EventPublisher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repository,
            reader,
            file_gate,
            event_publisher,
            notifier,
        }
    }

    pub async fn handle(
        &self,
        cmd: MarkDraftSubmittedCommand,
        metadata: CommandMetadata,
    ) -> Result<DealCommandResult, DomainError> {
        let mut deal = self
            .reader
            .find_deal(&cmd.deal_id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;
        deal.check_role(&metadata.user_id, DealRole::Creator)?;

        if !self
            .file_gate
            .has_file(&cmd.deal_id, FileCategory::Draft)
            .await?
        {
            return Err(DomainError::validation(
                "files",
                "Cannot submit a draft for review without draft files",
            ));
        }

        let expected_version = deal.record_version;
        deal.submit_draft()?;

        let audit = AuditLogEntry::record(
            deal.id,
            metadata.user_id.clone(),
            "Submitted draft for review",
            AuditCategory::Files,
        );

        self.repository
            .update(&deal, expected_version, &[audit.clone()])
            .await?;

        let event = DraftSubmittedEvent {
            event_id: EventId::new(),
            deal_id: deal.id,
            submitted_by: metadata.user_id.clone(),
            occurred_at: deal.updated_at,
        };
        let envelope = event
            .to_envelope()
            .with_correlation_id(metadata.correlation_id())
            .with_user_id(metadata.user_id.to_string());
        if let Err(err) = self.event_publisher.publish(envelope).await {
            tracing::warn!(deal_id = %deal.id, error = %err, "failed to publish deal event");
        }

        let notification = DealNotification::new(
            deal.id,
            deal.advertiser_id.clone(),
            "Draft submitted",
            format!("A draft is ready for review on \"{}\"", deal.title),
        );
        if let Err(err) = self.notifier.notify(notification).await {
            tracing::warn!(deal_id = %deal.id, error = %err, "failed to dispatch notification");
        }

        Ok(DealCommandResult {
            deal,
            audit: vec![audit],
        })
    }
}
