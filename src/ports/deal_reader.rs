//! Deal reader port (read side).
//!
//! Read-only queries over the deal aggregate and its children. Kept
//! separate from the write port so read models and UIs never hold a
//! write capability.

use async_trait::async_trait;

use crate::domain::audit::AuditLogEntry;
use crate::domain::deal::Deal;
use crate::domain::escrow::{EscrowMilestone, Invoice};
use crate::domain::foundation::{DealId, DomainError, InvoiceId, MilestoneId};
use crate::domain::terms::TermsVersion;

/// Read-side port for deals.
#[async_trait]
pub trait DealReader: Send + Sync {
    /// Finds a deal by id. Returns `None` if it does not exist.
    async fn find_deal(&self, id: &DealId) -> Result<Option<Deal>, DomainError>;

    /// Full terms history, ordered by version ascending.
    async fn terms_history(&self, deal_id: &DealId) -> Result<Vec<TermsVersion>, DomainError>;

    /// The most recent terms version, if any exist.
    async fn latest_terms(&self, deal_id: &DealId) -> Result<Option<TermsVersion>, DomainError>;

    /// All milestones for a deal, ordered by creation.
    async fn milestones(&self, deal_id: &DealId) -> Result<Vec<EscrowMilestone>, DomainError>;

    /// A single milestone of the deal.
    async fn find_milestone(
        &self,
        deal_id: &DealId,
        milestone_id: &MilestoneId,
    ) -> Result<Option<EscrowMilestone>, DomainError>;

    /// All invoices for a deal, ordered by issue time.
    async fn invoices(&self, deal_id: &DealId) -> Result<Vec<Invoice>, DomainError>;

    /// A single invoice of the deal.
    async fn find_invoice(
        &self,
        deal_id: &DealId,
        invoice_id: &InvoiceId,
    ) -> Result<Option<Invoice>, DomainError>;

    /// Audit log entries, newest first, capped at `limit`.
    async fn audit_log(
        &self,
        deal_id: &DealId,
        limit: u32,
    ) -> Result<Vec<AuditLogEntry>, DomainError>;
}
