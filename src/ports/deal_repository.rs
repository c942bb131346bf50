//! Deal repository port (write side).
//!
//! The Deal is the aggregate root: terms versions, acceptances,
//! milestones, invoices and audit entries commit inside its
//! consistency boundary. Each method below is one atomic unit of work;
//! either everything in the call is persisted or nothing is.
//!
//! # Concurrency contract
//!
//! - `expected_version` is the deal record version the caller read.
//!   A mismatch means another writer won the race; implementations
//!   return `VersionConflict` and persist nothing. The caller must
//!   re-read before retrying.
//! - Terms versions are unique per (deal_id, version). A duplicate
//!   insert, as happens when two counter-offers race, also surfaces as
//!   `VersionConflict`.
//! - Milestone updates are atomic per milestone id + current state so
//!   concurrent release attempts cannot double-pay.
//!
//! # Audit contract
//!
//! Every mutating method takes the audit entries describing the change
//! and persists them in the same transaction. A failed audit write
//! fails the whole operation; an unaudited state change must never
//! commit.

use async_trait::async_trait;

use crate::domain::audit::AuditLogEntry;
use crate::domain::deal::Deal;
use crate::domain::escrow::{EscrowMilestone, Invoice};
use crate::domain::foundation::{DealId, DomainError};
use crate::domain::terms::{TermsAcceptance, TermsVersion};

/// Repository port for the Deal aggregate.
#[async_trait]
pub trait DealRepository: Send + Sync {
    /// Persists a new deal with its initial terms version.
    ///
    /// # Errors
    ///
    /// - `VersionConflict` if the deal id already exists
    /// - `AuditWriteFailed` / `DatabaseError` on persistence failure
    async fn create(
        &self,
        deal: &Deal,
        initial_terms: &TermsVersion,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError>;

    /// Persists a plain status mutation.
    async fn update(
        &self,
        deal: &Deal,
        expected_version: u64,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError>;

    /// Persists a counter-offer: status mutation plus a new terms
    /// version, guarded by (deal_id, version) uniqueness.
    async fn update_with_terms(
        &self,
        deal: &Deal,
        expected_version: u64,
        terms: &TermsVersion,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError>;

    /// Persists an acceptance: status mutation, the finalized version,
    /// the acceptance record and any milestones derived from the
    /// accepted payment schedule.
    async fn update_with_acceptance(
        &self,
        deal: &Deal,
        expected_version: u64,
        accepted: &TermsVersion,
        acceptance: &TermsAcceptance,
        milestones: &[EscrowMilestone],
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError>;

    /// Persists an invoice request: status mutation, the new invoice
    /// and the optional milestone whose escrow state advanced.
    async fn update_with_invoice(
        &self,
        deal: &Deal,
        expected_version: u64,
        invoice: &Invoice,
        milestone: Option<&EscrowMilestone>,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError>;

    /// Persists an invoice payment: status mutation, the paid invoice
    /// and the funded milestone.
    async fn update_with_payment(
        &self,
        deal: &Deal,
        expected_version: u64,
        invoice: &Invoice,
        milestone: &EscrowMilestone,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError>;

    /// Persists a draft-acceptance outcome: status mutation plus the
    /// milestone settled by the finished review cycle, if any.
    async fn update_with_release(
        &self,
        deal: &Deal,
        expected_version: u64,
        milestone: Option<&EscrowMilestone>,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError>;

    /// Persists a milestone mutation that does not move the deal
    /// status (e.g. a standalone release). Atomic per milestone:
    /// writing a released milestone over an already-released one is a
    /// silent no-op so retried releases never double-pay or
    /// double-audit.
    async fn update_milestone(
        &self,
        deal_id: &DealId,
        milestone: &EscrowMilestone,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Trait object safety check
    #[test]
    fn deal_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn DealRepository) {}
    }
}
