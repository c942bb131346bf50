//! AcceptTermsHandler - finalizes the latest terms version.
//!
//! A single acceptance by the non-authoring party finalizes a version;
//! the author's own endorsement is implicit in authorship. Acceptance
//! routes the deal into `accepted` (escrow required, not yet funded),
//! `in_progress` (escrow already established) or `briefing`, and
//! derives the milestone schedule from the accepted fields.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::audit::{AuditCategory, AuditLogEntry};
use crate::domain::deal::{Deal, DealStatus};
use crate::domain::escrow::EscrowMilestone;
use crate::domain::foundation::{
    domain_event, CommandMetadata, DealId, DomainError, ErrorCode, EventId, MilestoneId, Money,
    SerializableDomainEvent, Timestamp, UserId,
};
use crate::domain::terms::{TermsAcceptance, TermsVersion};
use crate::ports::{DealNotification, DealReader, DealRepository, EventPublisher, Notifier};

/// Command to accept the latest terms version of a deal.
#[derive(Debug, Clone)]
pub struct AcceptTermsCommand {
    pub deal_id: DealId,
}

/// Result of a successful acceptance.
#[derive(Debug, Clone)]
pub struct AcceptTermsResult {
    pub deal: Deal,
    pub terms: TermsVersion,
    pub acceptance: TermsAcceptance,
    /// Milestones derived from the accepted payment schedule.
    pub milestones: Vec<EscrowMilestone>,
    pub audit: Vec<AuditLogEntry>,
}

/// Event published when terms are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermsAcceptedEvent {
    pub event_id: EventId,
    pub deal_id: DealId,
    pub version: u32,
    pub accepted_by: UserId,
    pub status: DealStatus,
    pub occurred_at: Timestamp,
}

domain_event!(
    TermsAcceptedEvent,
    event_type = "deal.terms_accepted.v1",
    schema_version = 1,
    aggregate_id = deal_id,
    aggregate_type = "Deal",
    occurred_at = occurred_at,
    event_id = event_id
);

/// Handler for accepting terms.
pub struct AcceptTermsHandler {
    repository: Arc<dyn DealRepository>,
    reader: Arc<dyn DealReader>,
    event_publisher: Arc<dyn EventPublisher>,
    notifier: Arc<dyn Notifier>,
}

impl AcceptTermsHandler {
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
        cmd: AcceptTermsCommand,
        metadata: CommandMetadata,
    ) -> Result<AcceptTermsResult, DomainError> {
        let mut deal = self
            .reader
            .find_deal(&cmd.deal_id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;
        deal.check_party(&metadata.user_id)?;

        let mut terms = self
            .reader
            .latest_terms(&cmd.deal_id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::TermsNotFound, "Deal has no terms yet"))?;

        // Guards author asymmetry and double acceptance.
        let acceptance = terms.finalize(&metadata.user_id)?;

        let existing = self.reader.milestones(&cmd.deal_id).await?;
        let escrow_established = existing.iter().any(|m| m.is_funded() || m.is_released());
        let escrow_required = terms.fields.requires_escrow();

        let expected_version = deal.record_version;
        deal.apply_agreed_terms(terms.fields.price, terms.fields.deadline);
        let landed = deal.accept_terms(escrow_required, escrow_established)?;

        let new_milestones = if escrow_required && existing.is_empty() {
            derive_milestones(&deal, &terms)?
        } else {
            Vec::new()
        };

        let audit = AuditLogEntry::record(
            deal.id,
            metadata.user_id.clone(),
            format!("Accepted terms v{}", terms.version),
            AuditCategory::Terms,
        )
        .with_metadata(serde_json::json!({
            "terms_version": terms.version,
            "status": deal.status,
            "milestones": new_milestones.len(),
        }));

        self.repository
            .update_with_acceptance(
                &deal,
                expected_version,
                &terms,
                &acceptance,
                &new_milestones,
                &[audit.clone()],
            )
            .await?;

        let event = TermsAcceptedEvent {
            event_id: EventId::new(),
            deal_id: deal.id,
            version: terms.version,
            accepted_by: metadata.user_id.clone(),
            status: landed,
            occurred_at: acceptance.accepted_at,
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
                "Terms accepted",
                format!("Terms v{} accepted; deal is now {}", terms.version, deal.status.label()),
            );
            if let Err(err) = self.notifier.notify(notification).await {
                tracing::warn!(deal_id = %deal.id, error = %err, "failed to dispatch notification");
            }
        }

        Ok(AcceptTermsResult {
            deal,
            terms,
            acceptance,
            milestones: new_milestones,
            audit: vec![audit],
        })
    }
}

/// Builds the milestone plan from the accepted schedule, or a single
/// full-budget milestone when no schedule was negotiated.
fn derive_milestones(
    deal: &Deal,
    terms: &TermsVersion,
) -> Result<Vec<EscrowMilestone>, DomainError> {
    let specs = match &terms.fields.milestones {
        Some(specs) if !specs.is_empty() => specs.clone(),
        _ => {
            return Ok(vec![EscrowMilestone::planned(
                MilestoneId::new(),
                deal.id,
                "Full payment",
                deal.budget,
            )])
        }
    };

    let total = Money::sum(specs.iter().map(|s| &s.amount))?;
    if total > deal.budget {
        return Err(DomainError::validation(
            "milestones",
            format!(
                "Milestone schedule ({}) exceeds the agreed budget ({})",
                total, deal.budget
            ),
        ));
    }

    Ok(specs
        .into_iter()
        .map(|spec| EscrowMilestone::planned(MilestoneId::new(), deal.id, spec.label, spec.amount))
        .collect())
}
