//! StartWorkHandler - the fulfiller leaves the briefing phase.

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

/// Command to start work on a briefed deal.
#[derive(Debug, Clone)]
pub struct StartWorkCommand {
    pub deal_id: DealId,
}

/// Event published when work starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkStartedEvent {
    pub event_id: EventId,
    pub deal_id: DealId,
    pub started_by: UserId,
    pub occurred_at: Timestamp,
}

domain_event!(
    WorkStartedEvent,
    event_type = "deal.work_started.v1",
    schema_version = 1,
    aggregate_id = deal_id,
    aggregate_type = "Deal",
    occurred_at = occurred_at,
    event_id = event_id
);

/// Handler for starting work. Creator only.
pub struct StartWorkHandler {
    repository: Arc<dyn DealRepository>,
    reader: Arc<dyn DealReader>,
    event_publisher: Arc<dyn EventPublisher>,
    notifier: Arc<dyn Notifier>,
}

impl StartWorkHandler {
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
        cmd: StartWorkCommand,
        metadata: CommandMetadata,
    ) -> Result<DealCommandResult, DomainError> {
        let mut deal = self
            .reader
            .find_deal(&cmd.deal_id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;
        deal.check_role(&metadata.user_id, DealRole::Creator)?;

        let expected_version = deal.record_version;
        deal.start_work()?;

        let audit = AuditLogEntry::record(
            deal.id,
            metadata.user_id.clone(),
            "Started work",
            AuditCategory::General,
        );

        self.repository
            .update(&deal, expected_version, &[audit.clone()])
            .await?;

        let event = WorkStartedEvent {
            event_id: EventId::new(),
            deal_id: deal.id,
            started_by: metadata.user_id.clone(),
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
            "Work started",
            format!("Work started on \"{}\"", deal.title),
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
    use crate::application::handlers::deal::{AcceptTermsCommand, AcceptTermsHandler};
    use crate::application::handlers::support::{
        advertiser, creator, metadata_for, seeded_pending_deal, CapturingNotifier,
    };
    use crate::domain::deal::DealStatus;
    use crate::domain::terms::TermsFields;

    async fn briefed_deal() -> (Arc<InMemoryDealStore>, Arc<InMemoryEventBus>, DealId) {
        let (store, bus, deal_id) = seeded_pending_deal(TermsFields::default()).await;
        AcceptTermsHandler::new(
            store.clone(),
            store.clone(),
            bus.clone(),
            Arc::new(CapturingNotifier::new()),
        )
        .handle(AcceptTermsCommand { deal_id }, metadata_for(creator()))
        .await
        .unwrap();
        (store, bus, deal_id)
    }

    fn handler(store: Arc<InMemoryDealStore>, bus: Arc<InMemoryEventBus>) -> StartWorkHandler {
        StartWorkHandler::new(store.clone(), store, bus, Arc::new(CapturingNotifier::new()))
    }

    #[tokio::test]
    async fn creator_starts_work_from_briefing() {
        let (store, bus, deal_id) = briefed_deal().await;
        let h = handler(store, bus.clone());

        let result = h
            .handle(StartWorkCommand { deal_id }, metadata_for(creator()))
            .await
            .unwrap();

        assert_eq!(result.deal.status, DealStatus::InProgress);
        assert!(bus.has_event("deal.work_started.v1"));
    }

    #[tokio::test]
    async fn advertiser_cannot_start_work() {
        let (store, bus, deal_id) = briefed_deal().await;
        let h = handler(store, bus);

        let err = h
            .handle(StartWorkCommand { deal_id }, metadata_for(advertiser()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotAuthorized);
    }

    #[tokio::test]
    async fn starting_work_twice_is_an_invalid_transition() {
        let (store, bus, deal_id) = briefed_deal().await;
        let h = handler(store, bus);

        h.handle(StartWorkCommand { deal_id }, metadata_for(creator()))
            .await
            .unwrap();
        let err = h
            .handle(StartWorkCommand { deal_id }, metadata_for(creator()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }
}
