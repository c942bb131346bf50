//! GetEscrowSummaryHandler - reconciliation view of a deal's money.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::escrow::{EscrowMilestone, EscrowSummary, Invoice};
use crate::domain::foundation::{CommandMetadata, DealId, DomainError, ErrorCode};
use crate::ports::DealReader;

/// Query for the escrow summary of a deal.
#[derive(Debug, Clone)]
pub struct GetEscrowSummaryQuery {
    pub deal_id: DealId,
}

/// Escrow state as exposed to the parties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowView {
    pub summary: EscrowSummary,
    pub milestones: Vec<EscrowMilestone>,
    pub invoices: Vec<Invoice>,
}

/// Handler for the escrow summary. Parties only.
pub struct GetEscrowSummaryHandler {
    reader: Arc<dyn DealReader>,
    commission_percent: u8,
}

impl GetEscrowSummaryHandler {
    pub fn new(reader: Arc<dyn DealReader>, commission_percent: u8) -> Self {
        Self {
            reader,
            commission_percent,
        }
    }

    pub async fn handle(
        &self,
        query: GetEscrowSummaryQuery,
        metadata: CommandMetadata,
    ) -> Result<EscrowView, DomainError> {
        let deal = self
            .reader
            .find_deal(&query.deal_id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;
        deal.check_party(&metadata.user_id)?;

        let milestones = self.reader.milestones(&query.deal_id).await?;
        let invoices = self.reader.invoices(&query.deal_id).await?;
        let summary = EscrowSummary::compute(deal.budget, self.commission_percent, &milestones)?;

        Ok(EscrowView {
            summary,
            milestones,
            invoices,
        })
    }
}
