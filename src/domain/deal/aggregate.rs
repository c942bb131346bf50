//! Deal aggregate entity.
//!
//! The Deal is the aggregate root of one negotiated engagement between
//! an advertiser (requester) and a creator (fulfiller). It owns the
//! lifecycle status and is the only place that decides transitions;
//! terms versions, milestones, invoices and audit entries hang off it.
//!
//! # Invariants
//!
//! - `status` only moves along the transition table in [`DealStatus`]
//! - both parties are distinct; every mutation names an acting party
//! - `record_version` increases by one per committed mutation and backs
//!   optimistic concurrency in the repositories

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    DealId, DomainError, ErrorCode, Money, StateMachine, Timestamp, UserId,
};

use super::DealStatus;

/// Role of a user relative to a specific deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealRole {
    /// The requester: proposes, pays, reviews.
    Advertiser,
    /// The fulfiller: counters, invoices, delivers.
    Creator,
}

impl DealRole {
    /// Stable string form for persistence and audit metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            DealRole::Advertiser => "advertiser",
            DealRole::Creator => "creator",
        }
    }
}

/// Deal aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    /// Unique identifier for this deal.
    pub id: DealId,

    /// Requester party.
    pub advertiser_id: UserId,

    /// Fulfiller party.
    pub creator_id: UserId,

    /// Short human-readable title.
    pub title: String,

    /// Total budget in minor currency units.
    pub budget: Money,

    /// Current lifecycle status.
    pub status: DealStatus,

    /// Agreed delivery deadline, if any.
    pub deadline: Option<NaiveDate>,

    /// Free-text description of the engagement.
    pub description: String,

    /// Reason supplied when the deal was rejected.
    pub rejection_reason: Option<String>,

    /// When the deal was rejected.
    pub rejected_at: Option<Timestamp>,

    /// Whether regulatory ad-marking duties apply on completion.
    pub marking_required: bool,

    /// Optimistic concurrency token; bumped on every mutation.
    pub record_version: u64,

    /// When the deal was created.
    pub created_at: Timestamp,

    /// When the deal was last updated.
    pub updated_at: Timestamp,
}

impl Deal {
    /// Creates a new deal in `pending` from an advertiser's proposal.
    pub fn propose(
        id: DealId,
        advertiser_id: UserId,
        creator_id: UserId,
        title: impl Into<String>,
        budget: Money,
        deadline: Option<NaiveDate>,
        description: impl Into<String>,
        marking_required: bool,
    ) -> Result<Self, DomainError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DomainError::validation("title", "Title cannot be empty"));
        }
        if advertiser_id == creator_id {
            return Err(DomainError::validation(
                "creator_id",
                "Advertiser and creator must be distinct parties",
            ));
        }

        let now = Timestamp::now();
        Ok(Self {
            id,
            advertiser_id,
            creator_id,
            title,
            budget,
            status: DealStatus::Pending,
            deadline,
            description: description.into(),
            rejection_reason: None,
            rejected_at: None,
            marking_required,
            record_version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    // === Party checks ===

    /// Returns the role of the given user on this deal, if any.
    pub fn role_of(&self, user_id: &UserId) -> Option<DealRole> {
        if user_id == &self.advertiser_id {
            Some(DealRole::Advertiser)
        } else if user_id == &self.creator_id {
            Some(DealRole::Creator)
        } else {
            None
        }
    }

    /// Validates that the user is a party to this deal.
    pub fn check_party(&self, user_id: &UserId) -> Result<DealRole, DomainError> {
        self.role_of(user_id).ok_or_else(|| {
            DomainError::not_authorized("User is not a party to this deal")
                .with_detail("deal_id", self.id.to_string())
                .with_detail("user_id", user_id.to_string())
        })
    }

    /// Validates that the user holds a specific role on this deal.
    pub fn check_role(&self, user_id: &UserId, role: DealRole) -> Result<(), DomainError> {
        match self.check_party(user_id)? {
            r if r == role => Ok(()),
            r => Err(DomainError::not_authorized(format!(
                "Action reserved for the {}, actor is the {}",
                role.as_str(),
                r.as_str()
            ))),
        }
    }

    /// Returns the other party's id.
    pub fn counterparty_of(&self, user_id: &UserId) -> Option<&UserId> {
        match self.role_of(user_id)? {
            DealRole::Advertiser => Some(&self.creator_id),
            DealRole::Creator => Some(&self.advertiser_id),
        }
    }

    // === Lifecycle transitions ===

    /// Moves the deal into `needs_changes` after a counter-offer.
    pub fn move_to_needs_changes(&mut self) -> Result<(), DomainError> {
        if !self.status.allows_renegotiation() {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot counter-offer while deal is {}", self.status),
            ));
        }
        self.transition_to(DealStatus::NeedsChanges)
    }

    /// Routes the deal after the latest terms version was accepted.
    ///
    /// Returns the status the deal landed in: `accepted` when escrow is
    /// required but not yet funded, `in_progress` when escrow was
    /// already established (mid-flight renegotiation), `briefing`
    /// otherwise.
    pub fn accept_terms(
        &mut self,
        escrow_required: bool,
        escrow_established: bool,
    ) -> Result<DealStatus, DomainError> {
        let target = if escrow_established {
            DealStatus::InProgress
        } else if escrow_required {
            DealStatus::Accepted
        } else {
            DealStatus::Briefing
        };
        self.transition_to(target)?;
        Ok(target)
    }

    /// Syncs the agreed parameters onto the deal when a terms version
    /// is accepted. The accepted price becomes the total agreed budget.
    pub fn apply_agreed_terms(&mut self, price: Option<Money>, deadline: Option<NaiveDate>) {
        if let Some(price) = price {
            self.budget = price;
        }
        if let Some(deadline) = deadline {
            self.deadline = Some(deadline);
        }
    }

    /// Rejects the deal. Terminal.
    pub fn reject(&mut self, reason: Option<String>) -> Result<(), DomainError> {
        self.transition_to(DealStatus::Rejected)?;
        self.rejection_reason = reason;
        self.rejected_at = Some(Timestamp::now());
        Ok(())
    }

    /// Fulfiller asked to invoice: `accepted -> invoice_needed`.
    pub fn request_invoice(&mut self) -> Result<(), DomainError> {
        if self.status != DealStatus::Accepted {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Invoice can only be requested while accepted, deal is {}", self.status),
            ));
        }
        self.transition_to(DealStatus::InvoiceNeeded)
    }

    /// Invoice issued: `invoice_needed -> waiting_payment`.
    pub fn invoice_issued(&mut self) -> Result<(), DomainError> {
        self.transition_to(DealStatus::WaitingPayment)
    }

    /// Funds reserved in escrow: `waiting_payment -> briefing`.
    pub fn funds_reserved(&mut self) -> Result<(), DomainError> {
        self.transition_to(DealStatus::Briefing)
    }

    /// Work started: `briefing -> in_progress`.
    pub fn start_work(&mut self) -> Result<(), DomainError> {
        self.transition_to(DealStatus::InProgress)
    }

    /// Draft submitted for review: `in_progress -> review`.
    pub fn submit_draft(&mut self) -> Result<(), DomainError> {
        self.transition_to(DealStatus::Review)
    }

    /// Draft accepted: completes the deal, or starts the next work
    /// cycle when unreleased milestones remain.
    pub fn accept_draft(&mut self, milestones_remaining: bool) -> Result<DealStatus, DomainError> {
        let target = if milestones_remaining {
            DealStatus::InProgress
        } else {
            DealStatus::Completed
        };
        self.transition_to(target)?;
        Ok(target)
    }

    /// Changes requested on the draft: `review -> in_progress`.
    pub fn request_changes(&mut self) -> Result<(), DomainError> {
        if self.status != DealStatus::Review {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Changes can only be requested during review, deal is {}", self.status),
            ));
        }
        self.transition_to(DealStatus::InProgress)
    }

    /// Opens a dispute from any non-terminal state.
    pub fn open_dispute(&mut self) -> Result<(), DomainError> {
        self.transition_to(DealStatus::Disputed)
    }

    /// Transition to a new status using the state machine.
    fn transition_to(&mut self, target: DealStatus) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot transition deal from {} to {}", self.status, target),
            )
            .with_detail("deal_id", self.id.to_string())
            .with_detail("from", self.status.to_string())
            .with_detail("to", target.to_string())
        })?;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.record_version += 1;
        self.updated_at = Timestamp::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advertiser() -> UserId {
        UserId::new("adv-1").unwrap()
    }

    fn creator() -> UserId {
        UserId::new("cr-1").unwrap()
    }

    fn test_deal() -> Deal {
        Deal::propose(
            DealId::new(),
            advertiser(),
            creator(),
            "Spring campaign",
            Money::new(45000).unwrap(),
            None,
            "Three integration videos",
            false,
        )
        .unwrap()
    }

    // Construction

    #[test]
    fn propose_starts_pending() {
        let deal = test_deal();
        assert_eq!(deal.status, DealStatus::Pending);
        assert_eq!(deal.record_version, 1);
        assert!(deal.rejection_reason.is_none());
    }

    #[test]
    fn propose_rejects_empty_title() {
        let result = Deal::propose(
            DealId::new(),
            advertiser(),
            creator(),
            "   ",
            Money::ZERO,
            None,
            "",
            false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn propose_rejects_same_party_on_both_sides() {
        let result = Deal::propose(
            DealId::new(),
            advertiser(),
            advertiser(),
            "Self deal",
            Money::ZERO,
            None,
            "",
            false,
        );
        assert!(result.is_err());
    }

    // Party checks

    #[test]
    fn role_of_identifies_both_parties() {
        let deal = test_deal();
        assert_eq!(deal.role_of(&advertiser()), Some(DealRole::Advertiser));
        assert_eq!(deal.role_of(&creator()), Some(DealRole::Creator));
        assert_eq!(deal.role_of(&UserId::new("other").unwrap()), None);
    }

    #[test]
    fn check_party_rejects_outsiders() {
        let deal = test_deal();
        let err = deal.check_party(&UserId::new("other").unwrap()).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotAuthorized);
    }

    #[test]
    fn check_role_enforces_specific_role() {
        let deal = test_deal();
        assert!(deal.check_role(&creator(), DealRole::Creator).is_ok());
        let err = deal.check_role(&creator(), DealRole::Advertiser).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotAuthorized);
    }

    #[test]
    fn counterparty_of_returns_other_side() {
        let deal = test_deal();
        assert_eq!(deal.counterparty_of(&advertiser()), Some(&creator()));
        assert_eq!(deal.counterparty_of(&creator()), Some(&advertiser()));
    }

    // Lifecycle

    #[test]
    fn accept_terms_without_escrow_goes_to_briefing() {
        let mut deal = test_deal();
        let landed = deal.accept_terms(false, false).unwrap();
        assert_eq!(landed, DealStatus::Briefing);
        assert_eq!(deal.status, DealStatus::Briefing);
    }

    #[test]
    fn accept_terms_with_escrow_goes_to_accepted() {
        let mut deal = test_deal();
        let landed = deal.accept_terms(true, false).unwrap();
        assert_eq!(landed, DealStatus::Accepted);
    }

    #[test]
    fn accept_terms_resumes_work_when_escrow_established() {
        let mut deal = test_deal();
        deal.move_to_needs_changes().unwrap();
        let landed = deal.accept_terms(true, true).unwrap();
        assert_eq!(landed, DealStatus::InProgress);
    }

    #[test]
    fn reject_records_reason_and_time() {
        let mut deal = test_deal();
        deal.reject(Some("budget too low".to_string())).unwrap();
        assert_eq!(deal.status, DealStatus::Rejected);
        assert_eq!(deal.rejection_reason.as_deref(), Some("budget too low"));
        assert!(deal.rejected_at.is_some());
    }

    #[test]
    fn rejected_deal_refuses_further_mutations() {
        let mut deal = test_deal();
        deal.reject(None).unwrap();

        let err = deal.open_dispute().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        let err = deal.move_to_needs_changes().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        assert_eq!(deal.status, DealStatus::Rejected);
    }

    #[test]
    fn escrow_corridor_walks_in_order() {
        let mut deal = test_deal();
        deal.accept_terms(true, false).unwrap();
        deal.request_invoice().unwrap();
        assert_eq!(deal.status, DealStatus::InvoiceNeeded);
        deal.invoice_issued().unwrap();
        assert_eq!(deal.status, DealStatus::WaitingPayment);
        deal.funds_reserved().unwrap();
        assert_eq!(deal.status, DealStatus::Briefing);
    }

    #[test]
    fn request_invoice_requires_accepted() {
        let mut deal = test_deal();
        let err = deal.request_invoice().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }

    #[test]
    fn accept_draft_completes_when_no_milestones_remain() {
        let mut deal = test_deal();
        deal.accept_terms(false, false).unwrap();
        deal.start_work().unwrap();
        deal.submit_draft().unwrap();
        let landed = deal.accept_draft(false).unwrap();
        assert_eq!(landed, DealStatus::Completed);
    }

    #[test]
    fn accept_draft_cycles_back_when_milestones_remain() {
        let mut deal = test_deal();
        deal.accept_terms(false, false).unwrap();
        deal.start_work().unwrap();
        deal.submit_draft().unwrap();
        let landed = deal.accept_draft(true).unwrap();
        assert_eq!(landed, DealStatus::InProgress);
    }

    #[test]
    fn dispute_is_reachable_mid_work() {
        let mut deal = test_deal();
        deal.accept_terms(false, false).unwrap();
        deal.start_work().unwrap();
        deal.open_dispute().unwrap();
        assert_eq!(deal.status, DealStatus::Disputed);
    }

    #[test]
    fn every_mutation_bumps_record_version() {
        let mut deal = test_deal();
        assert_eq!(deal.record_version, 1);
        deal.accept_terms(false, false).unwrap();
        assert_eq!(deal.record_version, 2);
        deal.start_work().unwrap();
        assert_eq!(deal.record_version, 3);
    }
}
