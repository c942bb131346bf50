//! MarkDraftAcceptedHandler - the requester signs off on a review cycle.
//!
//! Accepting the draft settles the milestone the finished cycle covered
//! (the earliest funded, unreleased one) in the same commit. The deal
//! completes when every milestone is released, or immediately when the
//! deal never had escrow; otherwise the next work cycle starts.
//!
//! Completion records the commission accounting entry and, when the
//! deal carries ad-marking duties, an `ord`-category entry.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::audit::{AuditCategory, AuditLogEntry};
use crate::domain::deal::{Deal, DealRole, DealStatus};
use crate::domain::escrow::EscrowMilestone;
use crate::domain::foundation::{
    domain_event, CommandMetadata, DealId, DomainError, ErrorCode, EventId,
    SerializableDomainEvent, Timestamp, UserId,
};
use crate::ports::{DealNotification, DealReader, DealRepository, EventPublisher, Notifier};

/// Command to accept the submitted draft.
#[derive(Debug, Clone)]
pub struct MarkDraftAcceptedCommand {
    pub deal_id: DealId,
}

/// Result of a draft acceptance.
#[derive(Debug, Clone)]
pub struct MarkDraftAcceptedResult {
    pub deal: Deal,
    /// The milestone settled by this acceptance, if any.
    pub released_milestone: Option<EscrowMilestone>,
    pub audit: Vec<AuditLogEntry>,
}

/// Event published when a draft is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftAcceptedEvent {
    pub event_id: EventId,
    pub deal_id: DealId,
    pub accepted_by: UserId,
    pub status: DealStatus,
    pub occurred_at: Timestamp,
}

domain_event!(
    DraftAcceptedEvent,
    event_type = "deal.draft_accepted.v1",
    schema_version = 1,
    aggregate_id = deal_id,
    aggregate_type = "Deal",
    occurred_at = occurred_at,
    event_id = event_id
);

/// Event published when a deal completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealCompletedEvent {
    pub event_id: EventId,
    pub deal_id: DealId,
    pub total_amount: crate::domain::foundation::Money,
    pub commission: crate::domain::foundation::Money,
    pub occurred_at: Timestamp,
}

domain_event!(
    DealCompletedEvent,
    event_type = "deal.completed.v1",
    schema_version = 1,
    aggregate_id = deal_id,
    aggregate_type = "Deal",
    occurred_at = occurred_at,
    event_id = event_id
);

/// Handler for accepting drafts. Advertiser only.
pub struct MarkDraftAcceptedHandler {
    repository: Arc<dyn DealRepository>,
    reader: Arc<dyn DealReader>,
    event_publisher: Arc<dyn EventPublisher>,
    notifier: Arc<dyn Notifier>,
    commission_percent: u8,
}

impl MarkDraftAcceptedHandler {
    pub fn new(
        repository: Arc<dyn DealRepository>,
        reader: Arc<dyn DealReader>,
        event_publisher: Arc<dyn EventPublisher>,
        notifier: Arc<dyn Notifier>,
        commission_percent: u8,
    ) -> Self {
        Self {
            repository,
            reader,
            event_publisher,
            notifier,
            commission_percent,
        }
    }

    pub async fn handle(
        &self,
        cmd: MarkDraftAcceptedCommand,
        metadata: CommandMetadata,
    ) -> Result<MarkDraftAcceptedResult, DomainError> {
        let mut deal = self
            .reader
            .find_deal(&cmd.deal_id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;
        deal.check_role(&metadata.user_id, DealRole::Advertiser)?;
        if deal.status != DealStatus::Review {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Draft can only be accepted during review, deal is {}", deal.status),
            ));
        }

        let milestones = self.reader.milestones(&cmd.deal_id).await?;

        // Settle the milestone this review cycle covered.
        let mut released: Option<EscrowMilestone> = None;
        for m in &milestones {
            if m.is_funded() && !m.is_released() {
                let mut settled = m.clone();
                settled.release()?;
                released = Some(settled);
                break;
            }
        }

        let remaining = milestones
            .iter()
            .filter(|m| released.as_ref().map(|r| r.id) != Some(m.id))
            .any(|m| !m.is_released());

        let expected_version = deal.record_version;
        let landed = deal.accept_draft(remaining)?;

        let mut audit = vec![AuditLogEntry::record(
            deal.id,
            metadata.user_id.clone(),
            "Accepted the draft",
            AuditCategory::General,
        )];
        if let Some(m) = &released {
            audit.push(
                AuditLogEntry::record(
                    deal.id,
                    metadata.user_id.clone(),
                    format!("Released milestone \"{}\"", m.label),
                    AuditCategory::Payments,
                )
                .with_metadata(serde_json::json!({
                    "milestone_id": m.id,
                    "amount": m.amount,
                })),
            );
        }
        let commission = deal.budget.percentage(self.commission_percent);
        if landed == DealStatus::Completed {
            audit.push(
                AuditLogEntry::record(
                    deal.id,
                    metadata.user_id.clone(),
                    "Deal completed, commission settled",
                    AuditCategory::Payments,
                )
                .with_metadata(serde_json::json!({
                    "total": deal.budget,
                    "commission_percent": self.commission_percent,
                    "commission": commission,
                })),
            );
            if deal.marking_required {
                audit.push(AuditLogEntry::record(
                    deal.id,
                    metadata.user_id.clone(),
                    "Ad-marking obligations recorded for the published material",
                    AuditCategory::Ord,
                ));
            }
        }

        self.repository
            .update_with_release(&deal, expected_version, released.as_ref(), &audit)
            .await?;

        let accepted_event = DraftAcceptedEvent {
            event_id: EventId::new(),
            deal_id: deal.id,
            accepted_by: metadata.user_id.clone(),
            status: landed,
            occurred_at: deal.updated_at,
        };
        let mut envelopes = vec![accepted_event
            .to_envelope()
            .with_correlation_id(metadata.correlation_id())
            .with_user_id(metadata.user_id.to_string())];
        if landed == DealStatus::Completed {
            let completed_event = DealCompletedEvent {
                event_id: EventId::new(),
                deal_id: deal.id,
                total_amount: deal.budget,
                commission,
                occurred_at: deal.updated_at,
            };
            envelopes.push(
                completed_event
                    .to_envelope()
                    .with_correlation_id(metadata.correlation_id())
                    .with_user_id(metadata.user_id.to_string()),
            );
        }
        if let Err(err) = self.event_publisher.publish_all(envelopes).await {
            tracing::warn!(deal_id = %deal.id, error = %err, "failed to publish deal events");
        }

        let notification = DealNotification::new(
            deal.id,
            deal.creator_id.clone(),
            if landed == DealStatus::Completed {
                "Deal completed"
            } else {
                "Draft accepted"
            },
            format!("\"{}\" is now {}", deal.title, deal.status.label()),
        );
        if let Err(err) = self.notifier.notify(notification).await {
            tracing::warn!(deal_id = %deal.id, error = %err, "failed to dispatch notification");
        }

        Ok(MarkDraftAcceptedResult {
            deal,
            released_milestone: released,
            audit,
        })
    }
}
