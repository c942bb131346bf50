//! ReleaseMilestoneHandler - pays out one milestone to the fulfiller.
//!
//! Idempotent: releasing an already-released milestone is a no-op
//! success (no audit entry, no event), so retries never double-pay.
//! Releasing a milestone whose funds were never reserved is an
//! `IllegalOperation`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::audit::{AuditCategory, AuditLogEntry};
use crate::domain::deal::DealRole;
use crate::domain::escrow::{EscrowMilestone, EscrowSummary, ReleaseOutcome};
use crate::domain::foundation::{
    domain_event, CommandMetadata, DealId, DomainError, ErrorCode, EventId, MilestoneId, Money,
    SerializableDomainEvent, Timestamp, UserId,
};
use crate::ports::{DealNotification, DealReader, DealRepository, EventPublisher, Notifier};

/// Command to release a milestone's funds.
#[derive(Debug, Clone)]
pub struct ReleaseMilestoneCommand {
    pub deal_id: DealId,
    pub milestone_id: MilestoneId,
}

/// Result of a release attempt.
#[derive(Debug, Clone)]
pub struct ReleaseMilestoneResult {
    pub deal: crate::domain::deal::Deal,
    pub milestone: EscrowMilestone,
    /// Reconciliation snapshot after the release.
    pub summary: EscrowSummary,
    /// False when the milestone had already been released.
    pub released_now: bool,
    pub audit: Vec<AuditLogEntry>,
}

/// Event published when a milestone is released.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneReleasedEvent {
    pub event_id: EventId,
    pub deal_id: DealId,
    pub milestone_id: MilestoneId,
    pub amount: Money,
    pub released_by: UserId,
    pub occurred_at: Timestamp,
}

domain_event!(
    MilestoneReleasedEvent,
    event_type = "deal.milestone_released.v1",
    schema_version = 1,
    aggregate_id = deal_id,
    aggregate_type = "Deal",
    occurred_at = occurred_at,
    event_id = event_id
);

/// Handler for milestone release. Advertiser only.
pub struct ReleaseMilestoneHandler {
    repository: Arc<dyn DealRepository>,
    reader: Arc<dyn DealReader>,
    event_publisher: Arc<dyn EventPublisher>,
    notifier: Arc<dyn Notifier>,
    commission_percent: u8,
}

impl ReleaseMilestoneHandler {
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
        cmd: ReleaseMilestoneCommand,
        metadata: CommandMetadata,
    ) -> Result<ReleaseMilestoneResult, DomainError> {
        let deal = self
            .reader
            .find_deal(&cmd.deal_id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;
        deal.check_role(&metadata.user_id, DealRole::Advertiser)?;

        let mut milestone = self
            .reader
            .find_milestone(&cmd.deal_id, &cmd.milestone_id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::MilestoneNotFound, "Milestone not found"))?;

        let outcome = milestone.release()?;
        if outcome == ReleaseOutcome::AlreadyReleased {
            let summary = self.summary_for(&deal.id, deal.budget).await?;
            return Ok(ReleaseMilestoneResult {
                deal,
                milestone,
                summary,
                released_now: false,
                audit: Vec::new(),
            });
        }

        let audit = AuditLogEntry::record(
            deal.id,
            metadata.user_id.clone(),
            format!("Released milestone \"{}\"", milestone.label),
            AuditCategory::Payments,
        )
        .with_metadata(serde_json::json!({
            "milestone_id": milestone.id,
            "amount": milestone.amount,
        }));

        self.repository
            .update_milestone(&deal.id, &milestone, &[audit.clone()])
            .await?;

        let event = MilestoneReleasedEvent {
            event_id: EventId::new(),
            deal_id: deal.id,
            milestone_id: milestone.id,
            amount: milestone.amount,
            released_by: metadata.user_id.clone(),
            occurred_at: milestone.released_at.unwrap_or(milestone.updated_at),
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
            deal.creator_id.clone(),
            "Milestone released",
            format!("\"{}\" ({}) was paid out", milestone.label, milestone.amount),
        );
        if let Err(err) = self.notifier.notify(notification).await {
            tracing::warn!(deal_id = %deal.id, error = %err, "failed to dispatch notification");
        }

        let summary = self.summary_for(&deal.id, deal.budget).await?;
        Ok(ReleaseMilestoneResult {
            deal,
            milestone,
            summary,
            released_now: true,
            audit: vec![audit],
        })
    }

    async fn summary_for(
        &self,
        deal_id: &DealId,
        budget: Money,
    ) -> Result<EscrowSummary, DomainError> {
        let milestones = self.reader.milestones(deal_id).await?;
        EscrowSummary::compute(budget, self.commission_percent, &milestones)
    }
}
