//! GetTermsHistoryHandler - the negotiation ledger as seen by a party.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CommandMetadata, DealId, DomainError, ErrorCode, UserId};
use crate::domain::terms::{awaiting_response_from, TermsVersion};
use crate::ports::DealReader;

/// Query for the full terms history of a deal.
#[derive(Debug, Clone)]
pub struct GetTermsHistoryQuery {
    pub deal_id: DealId,
}

/// The ledger plus derived negotiation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermsHistoryView {
    /// All versions, ascending.
    pub versions: Vec<TermsVersion>,
    /// Whose turn it is to respond, if anyone's.
    pub awaiting_response_from: Option<UserId>,
    /// Field keys the latest version changed against its predecessor.
    pub latest_changes: Vec<String>,
}

/// Handler for reading the terms history. Parties only.
pub struct GetTermsHistoryHandler {
    reader: Arc<dyn DealReader>,
}

impl GetTermsHistoryHandler {
    pub fn new(reader: Arc<dyn DealReader>) -> Self {
        Self { reader }
    }

    pub async fn handle(
        &self,
        query: GetTermsHistoryQuery,
        metadata: CommandMetadata,
    ) -> Result<TermsHistoryView, DomainError> {
        let deal = self
            .reader
            .find_deal(&query.deal_id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;
        deal.check_party(&metadata.user_id)?;

        let versions = self.reader.terms_history(&query.deal_id).await?;
        let awaiting = versions
            .last()
            .and_then(|latest| awaiting_response_from(&deal, latest).cloned());
        let latest_changes = match versions.len() {
            0 | 1 => Vec::new(),
            n => versions[n - 2]
                .fields
                .diff(&versions[n - 1].fields)
                .into_iter()
                .map(String::from)
                .collect(),
        };

        Ok(TermsHistoryView {
            versions,
            awaiting_response_from: awaiting,
            latest_changes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::deal::{SubmitCounterOfferCommand, SubmitCounterOfferHandler};
    use crate::application::handlers::support::{
        advertiser, creator, metadata_for, seeded_pending_deal, CapturingNotifier,
    };
    use crate::domain::foundation::Money;
    use crate::domain::terms::TermsFields;

    #[tokio::test]
    async fn fresh_proposal_awaits_the_responder() {
        let (store, _bus, deal_id) = seeded_pending_deal(TermsFields::default()).await;
        let h = GetTermsHistoryHandler::new(store);

        let view = h
            .handle(GetTermsHistoryQuery { deal_id }, metadata_for(advertiser()))
            .await
            .unwrap();

        assert_eq!(view.versions.len(), 1);
        assert_eq!(view.awaiting_response_from, Some(creator()));
        assert!(view.latest_changes.is_empty());
    }

    #[tokio::test]
    async fn after_a_counter_the_turn_flips_and_changes_show() {
        let (store, bus, deal_id) = seeded_pending_deal(TermsFields::default()).await;
        SubmitCounterOfferHandler::new(
            store.clone(),
            store.clone(),
            bus,
            Arc::new(CapturingNotifier::new()),
        )
        .handle(
            SubmitCounterOfferCommand {
                deal_id,
                fields: TermsFields {
                    price: Some(Money::new(50000).unwrap()),
                    ..Default::default()
                },
                rationale: "rate card went up".to_string(),
            },
            metadata_for(creator()),
        )
        .await
        .unwrap();

        let h = GetTermsHistoryHandler::new(store);
        let view = h
            .handle(GetTermsHistoryQuery { deal_id }, metadata_for(advertiser()))
            .await
            .unwrap();

        assert_eq!(view.versions.len(), 2);
        assert_eq!(view.awaiting_response_from, Some(advertiser()));
        assert_eq!(view.latest_changes, vec!["price".to_string()]);
    }

    #[tokio::test]
    async fn outsiders_cannot_read_the_ledger() {
        let (store, _bus, deal_id) = seeded_pending_deal(TermsFields::default()).await;
        let h = GetTermsHistoryHandler::new(store);

        let err = h
            .handle(
                GetTermsHistoryQuery { deal_id },
                metadata_for(crate::application::handlers::support::outsider()),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotAuthorized);
    }
}
