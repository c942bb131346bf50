//! GetDealStateHandler - read-only deal snapshot.

use std::sync::Arc;

use crate::domain::deal::Deal;
use crate::domain::foundation::{CommandMetadata, DealId, DomainError, ErrorCode};
use crate::ports::DealReader;

/// Query for the current deal snapshot.
#[derive(Debug, Clone)]
pub struct GetDealStateQuery {
    pub deal_id: DealId,
}

/// Handler for reading deal state. Parties only.
pub struct GetDealStateHandler {
    reader: Arc<dyn DealReader>,
}

impl GetDealStateHandler {
    pub fn new(reader: Arc<dyn DealReader>) -> Self {
        Self { reader }
    }

    pub async fn handle(
        &self,
        query: GetDealStateQuery,
        metadata: CommandMetadata,
    ) -> Result<Deal, DomainError> {
        let deal = self
            .reader
            .find_deal(&query.deal_id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;
        deal.check_party(&metadata.user_id)?;
        Ok(deal)
    }
}
