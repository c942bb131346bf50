//! CreateProposalHandler - opens a new deal with terms v1.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::audit::{AuditCategory, AuditLogEntry};
use crate::domain::deal::Deal;
use crate::domain::foundation::{
    domain_event, CommandMetadata, DealId, DomainError, EventId, Money, SerializableDomainEvent,
    TermsId, Timestamp, UserId,
};
use crate::domain::terms::{TermsFields, TermsVersion};
use crate::ports::{DealNotification, DealRepository, EventPublisher, Notifier};

/// Command to propose a new deal to a creator.
#[derive(Debug, Clone)]
pub struct CreateProposalCommand {
    /// The fulfiller the proposal is addressed to.
    pub creator_id: UserId,
    pub title: String,
    /// Budget in minor currency units.
    pub budget: Money,
    pub deadline: Option<NaiveDate>,
    pub description: String,
    /// Whether regulatory ad-marking duties apply.
    pub marking_required: bool,
    /// Initial negotiated parameters; the price defaults to the budget.
    pub terms: TermsFields,
}

/// Result of a successful proposal.
#[derive(Debug, Clone)]
pub struct CreateProposalResult {
    pub deal: Deal,
    pub terms: TermsVersion,
    pub audit: Vec<AuditLogEntry>,
}

/// Event published when a deal is proposed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealProposedEvent {
    pub event_id: EventId,
    pub deal_id: DealId,
    pub advertiser_id: UserId,
    pub creator_id: UserId,
    pub title: String,
    pub budget: Money,
    pub created_at: Timestamp,
}

domain_event!(
    DealProposedEvent,
    event_type = "deal.proposed.v1",
    schema_version = 1,
    aggregate_id = deal_id,
    aggregate_type = "Deal",
    occurred_at = created_at,
    event_id = event_id
);

/// Handler for creating proposals. The acting user becomes the
/// advertiser.
pub struct CreateProposalHandler {
    repository: Arc<dyn DealRepository>,
    event_publisher: Arc<dyn EventPublisher>,
    notifier: Arc<dyn Notifier>,
}

impl CreateProposalHandler {
    pub fn new(
        repository: Arc<dyn DealRepository>,
        event_publisher: Arc<dyn EventPublisher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repository,
            event_publisher,
            notifier,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateProposalCommand,
        metadata: CommandMetadata,
    ) -> Result<CreateProposalResult, DomainError> {
        let deal = Deal::propose(
            DealId::new(),
            metadata.user_id.clone(),
            cmd.creator_id.clone(),
            cmd.title,
            cmd.budget,
            cmd.deadline,
            cmd.description,
            cmd.marking_required,
        )?;

        // The ledger always opens with an explicit price.
        let mut fields = cmd.terms;
        if fields.price.is_none() {
            fields.price = Some(cmd.budget);
        }
        let terms = TermsVersion::initial(TermsId::new(), deal.id, metadata.user_id.clone(), fields);

        let audit = AuditLogEntry::record(
            deal.id,
            metadata.user_id.clone(),
            format!("Proposed deal \"{}\"", deal.title),
            AuditCategory::Terms,
        )
        .with_metadata(serde_json::json!({
            "budget": deal.budget,
            "terms_version": terms.version,
        }));

        self.repository.create(&deal, &terms, &[audit.clone()]).await?;

        let event = DealProposedEvent {
            event_id: EventId::new(),
            deal_id: deal.id,
            advertiser_id: deal.advertiser_id.clone(),
            creator_id: deal.creator_id.clone(),
            title: deal.title.clone(),
            budget: deal.budget,
            created_at: deal.created_at,
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
            "New deal proposal",
            format!("{} proposed \"{}\"", deal.advertiser_id, deal.title),
        );
        if let Err(err) = self.notifier.notify(notification).await {
            tracing::warn!(deal_id = %deal.id, error = %err, "failed to dispatch notification");
        }

        Ok(CreateProposalResult {
            deal,
            terms,
            audit: vec![audit],
        })
    }
}
