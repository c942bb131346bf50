//! RequestChangesHandler - the requester sends the draft back.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::audit::{AuditCategory, AuditLogEntry};
use crate::domain::deal::DealRole;
use crate::domain::foundation::{
    domain_event, CommandMetadata, DealId, DomainError, ErrorCode, EventId,
    SerializableDomainEvent, Timestamp, UserId,
};
use crate::ports::{DealNotification, DealReader, DealRepository, EventPublisher, Notifier};

use super::DealCommandResult;

/// Command to request changes on the submitted draft.
#[derive(Debug, Clone)]
pub struct RequestChangesCommand {
    pub deal_id: DealId,
    pub note: Option<String>,
}

/// Event published when changes are requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesRequestedEvent {
    pub event_id: EventId,
    pub deal_id: DealId,
    pub requested_by: UserId,
    pub note: Option<String>,
    pub occurred_at: Timestamp,
}

domain_event!(
    ChangesRequestedEvent,
    event_type = "deal.changes_requested.v1",
    schema_version = 1,
    aggregate_id = deal_id,
    aggregate_type = "Deal",
    occurred_at = occurred_at,
    event_id = event_id
);

/// Handler for requesting changes. Advertiser only.
pub struct RequestChangesHandler {
    repository: Arc<dyn DealRepository>,
    reader: Arc<dyn DealReader>,
    event_publisher: Arc<dyn EventPublisher>,
    notifier: Arc<dyn Notifier>,
}

impl RequestChangesHandler {
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
        cmd: RequestChangesCommand,
        metadata: CommandMetadata,
    ) -> Result<DealCommandResult, DomainError> {
        let mut deal = self
            .reader
            .find_deal(&cmd.deal_id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;
        deal.check_role(&metadata.user_id, DealRole::Advertiser)?;

        let expected_version = deal.record_version;
        deal.request_changes()?;

        let audit = AuditLogEntry::record(
            deal.id,
            metadata.user_id.clone(),
            "Requested changes on the draft",
            AuditCategory::General,
        )
        .with_metadata(serde_json::json!({ "note": &cmd.note }));

        self.repository
            .update(&deal, expected_version, &[audit.clone()])
            .await?;

        let event = ChangesRequestedEvent {
            event_id: EventId::new(),
            deal_id: deal.id,
            requested_by: metadata.user_id.clone(),
            note: cmd.note,
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
            deal.creator_id.clone(),
            "Changes requested",
            format!("Changes requested on \"{}\"", deal.title),
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
    use crate::ports::DealRepository as _;

    async fn deal_in_review() -> (Arc<InMemoryDealStore>, Arc<InMemoryEventBus>, DealId) {
        let (store, bus, deal_id) = seeded_pending_deal(TermsFields::default()).await;
        let mut deal = store.find_deal(&deal_id).await.unwrap().unwrap();
        let mut terms = store.latest_terms(&deal_id).await.unwrap().unwrap();
        let acceptance = terms.finalize(&creator()).unwrap();
        let expected = deal.record_version;
        deal.accept_terms(false, false).unwrap();
        deal.start_work().unwrap();
        deal.submit_draft().unwrap();
        let audit = AuditLogEntry::record(deal_id, creator(), "Into review", AuditCategory::General);
        store
            .update_with_acceptance(&deal, expected, &terms, &acceptance, &[], &[audit])
            .await
            .unwrap();
        (store, bus, deal_id)
    }

    fn handler(store: Arc<InMemoryDealStore>, bus: Arc<InMemoryEventBus>) -> RequestChangesHandler {
        RequestChangesHandler::new(store.clone(), store, bus, Arc::new(CapturingNotifier::new()))
    }

    #[tokio::test]
    async fn requesting_changes_returns_the_deal_to_in_progress() {
        let (store, bus, deal_id) = deal_in_review().await;
        let h = handler(store, bus.clone());

        let result = h
            .handle(
                RequestChangesCommand {
                    deal_id,
                    note: Some("tighten the intro".to_string()),
                },
                metadata_for(advertiser()),
            )
            .await
            .unwrap();

        assert_eq!(result.deal.status, DealStatus::InProgress);
        assert!(bus.has_event("deal.changes_requested.v1"));
    }

    #[tokio::test]
    async fn only_the_advertiser_can_request_changes() {
        let (store, bus, deal_id) = deal_in_review().await;
        let h = handler(store, bus);

        let err = h
            .handle(
                RequestChangesCommand {
                    deal_id,
                    note: None,
                },
                metadata_for(creator()),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotAuthorized);
    }

    #[tokio::test]
    async fn changes_cannot_be_requested_outside_review() {
        let (store, bus, deal_id) = seeded_pending_deal(TermsFields::default()).await;
        let h = handler(store, bus);

        let err = h
            .handle(
                RequestChangesCommand {
                    deal_id,
                    note: None,
                },
                metadata_for(advertiser()),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }
}
