//! OpenDisputeHandler - escalates a deal from any non-terminal state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::audit::{AuditCategory, AuditLogEntry};
use crate::domain::foundation::{
    domain_event, CommandMetadata, DealId, DomainError, ErrorCode, EventId,
    SerializableDomainEvent, Timestamp, UserId,
};
use crate::ports::{DealNotification, DealReader, DealRepository, EventPublisher, Notifier};

use super::DealCommandResult;

/// Command to open a dispute.
#[derive(Debug, Clone)]
pub struct OpenDisputeCommand {
    pub deal_id: DealId,
    pub reason: Option<String>,
}

/// Event published when a dispute is opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeOpenedEvent {
    pub event_id: EventId,
    pub deal_id: DealId,
    pub opened_by: UserId,
    pub reason: Option<String>,
    pub occurred_at: Timestamp,
}

domain_event!(
    DisputeOpenedEvent,
    event_type = "deal.dispute_opened.v1",
    schema_version = 1,
    aggregate_id = deal_id,
    aggregate_type = "Deal",
    occurred_at = occurred_at,
    event_id = event_id
);

/// Handler for opening disputes. A dispute is a first-class transition,
/// not a cancellation signal; resolution happens in external
/// arbitration.
pub struct OpenDisputeHandler {
    repository: Arc<dyn DealRepository>,
    reader: Arc<dyn DealReader>,
    event_publisher: Arc<dyn EventPublisher>,
    notifier: Arc<dyn Notifier>,
}

impl OpenDisputeHandler {
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
        cmd: OpenDisputeCommand,
        metadata: CommandMetadata,
    ) -> Result<DealCommandResult, DomainError> {
        let mut deal = self
            .reader
            .find_deal(&cmd.deal_id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;
        deal.check_party(&metadata.user_id)?;

        let expected_version = deal.record_version;
        deal.open_dispute()?;

        let audit = AuditLogEntry::record(
            deal.id,
            metadata.user_id.clone(),
            "Opened a dispute",
            AuditCategory::General,
        )
        .with_metadata(serde_json::json!({ "reason": &cmd.reason }));

        self.repository
            .update(&deal, expected_version, &[audit.clone()])
            .await?;

        let event = DisputeOpenedEvent {
            event_id: EventId::new(),
            deal_id: deal.id,
            opened_by: metadata.user_id.clone(),
            reason: cmd.reason,
            occurred_at: deal.updated_at,
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
                "Dispute opened",
                format!("A dispute was opened on \"{}\"", deal.title),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::memory::InMemoryDealStore;
    use crate::application::handlers::support::{
        advertiser, creator, metadata_for, seeded_pending_deal, CapturingNotifier,
    };
    use crate::domain::deal::DealStatus;
    use crate::domain::terms::TermsFields;

    fn handler(store: Arc<InMemoryDealStore>, bus: Arc<InMemoryEventBus>) -> OpenDisputeHandler {
        OpenDisputeHandler::new(store.clone(), store, bus, Arc::new(CapturingNotifier::new()))
    }

    #[tokio::test]
    async fn either_party_can_open_a_dispute() {
        let (store, bus, deal_id) = seeded_pending_deal(TermsFields::default()).await;
        let h = handler(store, bus.clone());

        let result = h
            .handle(
                OpenDisputeCommand {
                    deal_id,
                    reason: Some("unresponsive".to_string()),
                },
                metadata_for(advertiser()),
            )
            .await
            .unwrap();

        assert_eq!(result.deal.status, DealStatus::Disputed);
        assert!(bus.has_event("deal.dispute_opened.v1"));
    }

    #[tokio::test]
    async fn disputed_deal_cannot_be_disputed_again() {
        let (store, bus, deal_id) = seeded_pending_deal(TermsFields::default()).await;
        let h = handler(store, bus);

        h.handle(
            OpenDisputeCommand {
                deal_id,
                reason: None,
            },
            metadata_for(creator()),
        )
        .await
        .unwrap();

        let err = h
            .handle(
                OpenDisputeCommand {
                    deal_id,
                    reason: None,
                },
                metadata_for(advertiser()),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }
}
