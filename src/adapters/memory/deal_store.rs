//! In-memory deal store.
//!
//! Implements the repository, reader and file-gate ports over a mutexed
//! map with the same concurrency semantics as the Postgres adapter:
//! record-version checks, (deal_id, version) uniqueness for terms and
//! no-op overwrites of released milestones. Used by unit and
//! integration tests; not meant for production.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::domain::audit::AuditLogEntry;
use crate::domain::deal::Deal;
use crate::domain::escrow::{EscrowMilestone, Invoice};
use crate::domain::foundation::{DealId, DomainError, ErrorCode, InvoiceId, MilestoneId};
use crate::domain::terms::{TermsAcceptance, TermsVersion};
use crate::ports::{DealReader, DealRepository, FileCategory, FileGate};

#[derive(Debug, Clone)]
struct DealRecord {
    deal: Deal,
    terms: Vec<TermsVersion>,
    acceptances: Vec<TermsAcceptance>,
    milestones: Vec<EscrowMilestone>,
    invoices: Vec<Invoice>,
    audit: Vec<AuditLogEntry>,
    files: HashSet<FileCategory>,
}

impl DealRecord {
    fn new(deal: Deal) -> Self {
        Self {
            deal,
            terms: Vec::new(),
            acceptances: Vec::new(),
            milestones: Vec::new(),
            invoices: Vec::new(),
            audit: Vec::new(),
            files: HashSet::new(),
        }
    }
}

/// In-memory implementation of `DealRepository`, `DealReader` and
/// `FileGate`.
///
/// # Panics
///
/// Methods panic if the internal lock is poisoned. Acceptable for test
/// code; production uses the Postgres adapter.
pub struct InMemoryDealStore {
    state: Mutex<HashMap<DealId, DealRecord>>,
    fail_next_audit: AtomicBool,
}

impl InMemoryDealStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HashMap::new()),
            fail_next_audit: AtomicBool::new(false),
        }
    }

    // === Test helpers ===

    /// Registers an attachment of the given category for a deal.
    pub fn add_file(&self, deal_id: &DealId, category: FileCategory) {
        let mut state = self.state.lock().expect("InMemoryDealStore lock poisoned");
        if let Some(record) = state.get_mut(deal_id) {
            record.files.insert(category);
        }
    }

    /// Makes the next audit write fail, to exercise the contract that
    /// an unaudited state change never commits.
    pub fn fail_next_audit(&self) {
        self.fail_next_audit.store(true, Ordering::SeqCst);
    }

    /// Returns all audit entries of a deal in append order.
    pub fn audit_entries(&self, deal_id: &DealId) -> Vec<AuditLogEntry> {
        let state = self.state.lock().expect("InMemoryDealStore lock poisoned");
        state
            .get(deal_id)
            .map(|r| r.audit.clone())
            .unwrap_or_default()
    }

    fn append_audit(
        &self,
        record: &mut DealRecord,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError> {
        if audit.is_empty() {
            return Err(DomainError::new(
                ErrorCode::AuditWriteFailed,
                "Refusing to commit an unaudited state change",
            ));
        }
        if self.fail_next_audit.swap(false, Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::AuditWriteFailed,
                "Simulated audit write failure",
            ));
        }
        record.audit.extend_from_slice(audit);
        Ok(())
    }

    fn check_version(record: &DealRecord, expected_version: u64) -> Result<(), DomainError> {
        if record.deal.record_version != expected_version {
            return Err(DomainError::version_conflict(format!(
                "Deal was modified concurrently (expected version {}, found {})",
                expected_version, record.deal.record_version
            ))
            .with_detail("deal_id", record.deal.id.to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryDealStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DealRepository for InMemoryDealStore {
    async fn create(
        &self,
        deal: &Deal,
        initial_terms: &TermsVersion,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().expect("InMemoryDealStore lock poisoned");
        if state.contains_key(&deal.id) {
            return Err(DomainError::version_conflict("Deal already exists"));
        }
        let mut record = DealRecord::new(deal.clone());
        record.terms.push(initial_terms.clone());
        self.append_audit(&mut record, audit)?;
        state.insert(deal.id, record);
        Ok(())
    }

    async fn update(
        &self,
        deal: &Deal,
        expected_version: u64,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().expect("InMemoryDealStore lock poisoned");
        let record = state
            .get_mut(&deal.id)
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;
        Self::check_version(record, expected_version)?;

        // Stage on a copy so an audit failure commits nothing.
        let mut staged = record.clone();
        staged.deal = deal.clone();
        self.append_audit(&mut staged, audit)?;
        *record = staged;
        Ok(())
    }

    async fn update_with_terms(
        &self,
        deal: &Deal,
        expected_version: u64,
        terms: &TermsVersion,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().expect("InMemoryDealStore lock poisoned");
        let record = state
            .get_mut(&deal.id)
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;
        Self::check_version(record, expected_version)?;
        if record.terms.iter().any(|t| t.version == terms.version) {
            return Err(DomainError::version_conflict(format!(
                "Terms version {} already exists for this deal",
                terms.version
            )));
        }

        let mut staged = record.clone();
        staged.deal = deal.clone();
        staged.terms.push(terms.clone());
        self.append_audit(&mut staged, audit)?;
        *record = staged;
        Ok(())
    }

    async fn update_with_acceptance(
        &self,
        deal: &Deal,
        expected_version: u64,
        accepted: &TermsVersion,
        acceptance: &TermsAcceptance,
        milestones: &[EscrowMilestone],
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().expect("InMemoryDealStore lock poisoned");
        let record = state
            .get_mut(&deal.id)
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;
        Self::check_version(record, expected_version)?;

        let mut staged = record.clone();
        staged.deal = deal.clone();
        match staged.terms.iter_mut().find(|t| t.id == accepted.id) {
            Some(slot) => *slot = accepted.clone(),
            None => {
                return Err(DomainError::new(
                    ErrorCode::TermsNotFound,
                    "Accepted terms version is not part of this deal",
                ))
            }
        }
        staged.acceptances.push(acceptance.clone());
        staged.milestones.extend_from_slice(milestones);
        self.append_audit(&mut staged, audit)?;
        *record = staged;
        Ok(())
    }

    async fn update_with_invoice(
        &self,
        deal: &Deal,
        expected_version: u64,
        invoice: &Invoice,
        milestone: Option<&EscrowMilestone>,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().expect("InMemoryDealStore lock poisoned");
        let record = state
            .get_mut(&deal.id)
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;
        Self::check_version(record, expected_version)?;

        let mut staged = record.clone();
        staged.deal = deal.clone();
        staged.invoices.push(invoice.clone());
        if let Some(milestone) = milestone {
            upsert_milestone(&mut staged.milestones, milestone);
        }
        self.append_audit(&mut staged, audit)?;
        *record = staged;
        Ok(())
    }

    async fn update_with_payment(
        &self,
        deal: &Deal,
        expected_version: u64,
        invoice: &Invoice,
        milestone: &EscrowMilestone,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().expect("InMemoryDealStore lock poisoned");
        let record = state
            .get_mut(&deal.id)
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;
        Self::check_version(record, expected_version)?;

        let mut staged = record.clone();
        staged.deal = deal.clone();
        match staged.invoices.iter_mut().find(|i| i.id == invoice.id) {
            Some(slot) => *slot = invoice.clone(),
            None => {
                return Err(DomainError::new(
                    ErrorCode::InvoiceNotFound,
                    "Paid invoice is not part of this deal",
                ))
            }
        }
        upsert_milestone(&mut staged.milestones, milestone);
        self.append_audit(&mut staged, audit)?;
        *record = staged;
        Ok(())
    }

    async fn update_with_release(
        &self,
        deal: &Deal,
        expected_version: u64,
        milestone: Option<&EscrowMilestone>,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().expect("InMemoryDealStore lock poisoned");
        let record = state
            .get_mut(&deal.id)
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;
        Self::check_version(record, expected_version)?;

        let mut staged = record.clone();
        staged.deal = deal.clone();
        if let Some(milestone) = milestone {
            upsert_milestone(&mut staged.milestones, milestone);
        }
        self.append_audit(&mut staged, audit)?;
        *record = staged;
        Ok(())
    }

    async fn update_milestone(
        &self,
        deal_id: &DealId,
        milestone: &EscrowMilestone,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().expect("InMemoryDealStore lock poisoned");
        let record = state
            .get_mut(deal_id)
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;

        let stored = record
            .milestones
            .iter()
            .find(|m| m.id == milestone.id)
            .ok_or_else(|| {
                DomainError::new(ErrorCode::MilestoneNotFound, "Milestone not found")
            })?;
        // A concurrent release already settled this milestone; the
        // retry must not double-pay or double-audit.
        if stored.is_released() && milestone.is_released() {
            return Ok(());
        }

        let mut staged = record.clone();
        upsert_milestone(&mut staged.milestones, milestone);
        self.append_audit(&mut staged, audit)?;
        *record = staged;
        Ok(())
    }
}

fn upsert_milestone(milestones: &mut Vec<EscrowMilestone>, milestone: &EscrowMilestone) {
    match milestones.iter_mut().find(|m| m.id == milestone.id) {
        Some(slot) => *slot = milestone.clone(),
        None => milestones.push(milestone.clone()),
    }
}

#[async_trait]
impl DealReader for InMemoryDealStore {
    async fn find_deal(&self, id: &DealId) -> Result<Option<Deal>, DomainError> {
        let state = self.state.lock().expect("InMemoryDealStore lock poisoned");
        Ok(state.get(id).map(|r| r.deal.clone()))
    }

    async fn terms_history(&self, deal_id: &DealId) -> Result<Vec<TermsVersion>, DomainError> {
        let state = self.state.lock().expect("InMemoryDealStore lock poisoned");
        let mut terms = state
            .get(deal_id)
            .map(|r| r.terms.clone())
            .unwrap_or_default();
        terms.sort_by_key(|t| t.version);
        Ok(terms)
    }

    async fn latest_terms(&self, deal_id: &DealId) -> Result<Option<TermsVersion>, DomainError> {
        Ok(self
            .terms_history(deal_id)
            .await?
            .into_iter()
            .max_by_key(|t| t.version))
    }

    async fn milestones(&self, deal_id: &DealId) -> Result<Vec<EscrowMilestone>, DomainError> {
        let state = self.state.lock().expect("InMemoryDealStore lock poisoned");
        Ok(state
            .get(deal_id)
            .map(|r| r.milestones.clone())
            .unwrap_or_default())
    }

    async fn find_milestone(
        &self,
        deal_id: &DealId,
        milestone_id: &MilestoneId,
    ) -> Result<Option<EscrowMilestone>, DomainError> {
        Ok(self
            .milestones(deal_id)
            .await?
            .into_iter()
            .find(|m| &m.id == milestone_id))
    }

    async fn invoices(&self, deal_id: &DealId) -> Result<Vec<Invoice>, DomainError> {
        let state = self.state.lock().expect("InMemoryDealStore lock poisoned");
        Ok(state
            .get(deal_id)
            .map(|r| r.invoices.clone())
            .unwrap_or_default())
    }

    async fn find_invoice(
        &self,
        deal_id: &DealId,
        invoice_id: &InvoiceId,
    ) -> Result<Option<Invoice>, DomainError> {
        Ok(self
            .invoices(deal_id)
            .await?
            .into_iter()
            .find(|i| &i.id == invoice_id))
    }

    async fn audit_log(
        &self,
        deal_id: &DealId,
        limit: u32,
    ) -> Result<Vec<AuditLogEntry>, DomainError> {
        let state = self.state.lock().expect("InMemoryDealStore lock poisoned");
        let mut entries = state
            .get(deal_id)
            .map(|r| r.audit.clone())
            .unwrap_or_default();
        entries.reverse();
        entries.truncate(limit as usize);
        Ok(entries)
    }
}

#[async_trait]
impl FileGate for InMemoryDealStore {
    async fn has_file(
        &self,
        deal_id: &DealId,
        category: FileCategory,
    ) -> Result<bool, DomainError> {
        let state = self.state.lock().expect("InMemoryDealStore lock poisoned");
        Ok(state
            .get(deal_id)
            .map(|r| r.files.contains(&category))
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::AuditCategory;
    use crate::domain::foundation::{Money, TermsId, UserId};
    use crate::domain::terms::TermsFields;

    fn advertiser() -> UserId {
        UserId::new("adv-1").unwrap()
    }

    async fn seeded_store() -> (InMemoryDealStore, Deal) {
        let deal = Deal::propose(
            DealId::new(),
            advertiser(),
            UserId::new("cr-1").unwrap(),
            "Campaign",
            Money::new(45000).unwrap(),
            None,
            "",
            false,
        )
        .unwrap();
        let terms =
            TermsVersion::initial(TermsId::new(), deal.id, advertiser(), TermsFields::default());
        let audit = AuditLogEntry::record(
            deal.id,
            advertiser(),
            "Proposed deal",
            AuditCategory::Terms,
        );
        let store = InMemoryDealStore::new();
        store.create(&deal, &terms, &[audit]).await.unwrap();
        (store, deal)
    }

    #[tokio::test]
    async fn create_then_find_round_trips() {
        let (store, deal) = seeded_store().await;
        let found = store.find_deal(&deal.id).await.unwrap().unwrap();
        assert_eq!(found.id, deal.id);
        assert_eq!(store.terms_history(&deal.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_with_stale_version_conflicts() {
        let (store, mut deal) = seeded_store().await;
        deal.accept_terms(false, false).unwrap();
        let audit =
            AuditLogEntry::record(deal.id, advertiser(), "Accepted", AuditCategory::Terms);

        // Correct expected version succeeds.
        store.update(&deal, 1, &[audit.clone()]).await.unwrap();

        // Replaying with the stale expected version conflicts.
        let err = store.update(&deal, 1, &[audit]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::VersionConflict);
    }

    #[tokio::test]
    async fn duplicate_terms_version_conflicts() {
        let (store, deal) = seeded_store().await;
        let dup =
            TermsVersion::initial(TermsId::new(), deal.id, advertiser(), TermsFields::default());
        let audit =
            AuditLogEntry::record(deal.id, advertiser(), "Counter", AuditCategory::Terms);

        let err = store
            .update_with_terms(&deal, 1, &dup, &[audit])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::VersionConflict);
    }

    #[tokio::test]
    async fn audit_failure_commits_nothing() {
        let (store, mut deal) = seeded_store().await;
        deal.accept_terms(false, false).unwrap();
        let audit =
            AuditLogEntry::record(deal.id, advertiser(), "Accepted", AuditCategory::Terms);

        store.fail_next_audit();
        let err = store.update(&deal, 1, &[audit]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AuditWriteFailed);

        // The deal is untouched and a retry with the same expected
        // version succeeds.
        let stored = store.find_deal(&deal.id).await.unwrap().unwrap();
        assert_eq!(stored.record_version, 1);
    }

    #[tokio::test]
    async fn empty_audit_is_refused() {
        let (store, mut deal) = seeded_store().await;
        deal.accept_terms(false, false).unwrap();
        let err = store.update(&deal, 1, &[]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AuditWriteFailed);
    }

    #[tokio::test]
    async fn audit_log_returns_newest_first_with_limit() {
        let (store, mut deal) = seeded_store().await;
        deal.accept_terms(false, false).unwrap();
        let audit =
            AuditLogEntry::record(deal.id, advertiser(), "Accepted terms", AuditCategory::Terms);
        store.update(&deal, 1, &[audit]).await.unwrap();

        let entries = store.audit_log(&deal.id, 1).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "Accepted terms");
    }

    #[tokio::test]
    async fn released_milestone_overwrite_is_a_no_op() {
        let (store, deal) = seeded_store().await;
        let mut milestone = EscrowMilestone::planned(
            MilestoneId::new(),
            deal.id,
            "Full payment",
            Money::new(45000).unwrap(),
        );
        milestone.mark_funds_reserved().unwrap();
        let audit = AuditLogEntry::record(
            deal.id,
            advertiser(),
            "Funded milestone",
            AuditCategory::Payments,
        );
        store
            .update_with_release(&deal, 1, Some(&milestone), &[audit])
            .await
            .unwrap();

        milestone.release().unwrap();
        let release_audit = AuditLogEntry::record(
            deal.id,
            advertiser(),
            "Released milestone",
            AuditCategory::Payments,
        );
        store
            .update_milestone(&deal.id, &milestone, &[release_audit.clone()])
            .await
            .unwrap();
        let count_after_first = store.audit_entries(&deal.id).len();

        // The retry writes nothing.
        store
            .update_milestone(&deal.id, &milestone, &[release_audit])
            .await
            .unwrap();
        assert_eq!(store.audit_entries(&deal.id).len(), count_after_first);
    }

    #[tokio::test]
    async fn file_gate_reports_registered_categories() {
        let (store, deal) = seeded_store().await;
        assert!(!store.has_file(&deal.id, FileCategory::Draft).await.unwrap());
        store.add_file(&deal.id, FileCategory::Draft);
        assert!(store.has_file(&deal.id, FileCategory::Draft).await.unwrap());
        assert!(!store.has_file(&deal.id, FileCategory::Final).await.unwrap());
    }
}
