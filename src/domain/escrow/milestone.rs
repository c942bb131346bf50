//! Escrow milestones.
//!
//! A milestone is one independently reserved and released portion of
//! the total payment. Two state machines run side by side: the work
//! status visible to the parties and the escrow funding state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    DealId, DomainError, ErrorCode, MilestoneId, Money, StateMachine, Timestamp,
};

/// Work status of a milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    Reserved,
    InProgress,
    Review,
    Released,
}

impl MilestoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneStatus::Reserved => "reserved",
            MilestoneStatus::InProgress => "in_progress",
            MilestoneStatus::Review => "review",
            MilestoneStatus::Released => "released",
        }
    }
}

impl StateMachine for MilestoneStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use MilestoneStatus::*;
        matches!(
            (self, target),
            (Reserved, InProgress)
                | (InProgress, Review)
                | (Review, Released)
                // Release may settle a milestone from any earlier phase.
                | (Reserved, Released)
                | (InProgress, Released)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use MilestoneStatus::*;
        match self {
            Reserved => vec![InProgress, Released],
            InProgress => vec![Review, Released],
            Review => vec![Released],
            Released => vec![],
        }
    }
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MilestoneStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reserved" => Ok(MilestoneStatus::Reserved),
            "in_progress" => Ok(MilestoneStatus::InProgress),
            "review" => Ok(MilestoneStatus::Review),
            "released" => Ok(MilestoneStatus::Released),
            other => Err(format!("unknown milestone status: {}", other)),
        }
    }
}

/// Escrow funding state of a milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscrowState {
    WaitingInvoice,
    InvoiceSent,
    FundsReserved,
    ActivePeriod,
    PayoutReady,
    PaidOut,
}

impl EscrowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowState::WaitingInvoice => "WAITING_INVOICE",
            EscrowState::InvoiceSent => "INVOICE_SENT",
            EscrowState::FundsReserved => "FUNDS_RESERVED",
            EscrowState::ActivePeriod => "ACTIVE_PERIOD",
            EscrowState::PayoutReady => "PAYOUT_READY",
            EscrowState::PaidOut => "PAID_OUT",
        }
    }

    /// True once funds sit in escrow and have not been paid out.
    pub fn is_funded(&self) -> bool {
        matches!(
            self,
            EscrowState::FundsReserved | EscrowState::ActivePeriod | EscrowState::PayoutReady
        )
    }
}

impl StateMachine for EscrowState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use EscrowState::*;
        matches!(
            (self, target),
            (WaitingInvoice, InvoiceSent)
                | (InvoiceSent, FundsReserved)
                | (FundsReserved, ActivePeriod)
                | (ActivePeriod, PayoutReady)
                | (PayoutReady, PaidOut)
                // Release settles directly from any funded state.
                | (FundsReserved, PaidOut)
                | (ActivePeriod, PaidOut)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use EscrowState::*;
        match self {
            WaitingInvoice => vec![InvoiceSent],
            InvoiceSent => vec![FundsReserved],
            FundsReserved => vec![ActivePeriod, PaidOut],
            ActivePeriod => vec![PayoutReady, PaidOut],
            PayoutReady => vec![PaidOut],
            PaidOut => vec![],
        }
    }
}

impl fmt::Display for EscrowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EscrowState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING_INVOICE" => Ok(EscrowState::WaitingInvoice),
            "INVOICE_SENT" => Ok(EscrowState::InvoiceSent),
            "FUNDS_RESERVED" => Ok(EscrowState::FundsReserved),
            "ACTIVE_PERIOD" => Ok(EscrowState::ActivePeriod),
            "PAYOUT_READY" => Ok(EscrowState::PayoutReady),
            "PAID_OUT" => Ok(EscrowState::PaidOut),
            other => Err(format!("unknown escrow state: {}", other)),
        }
    }
}

/// Outcome of a release attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Funds moved to the fulfiller.
    Released,
    /// The milestone was already released; nothing changed.
    AlreadyReleased,
}

/// One independently payable portion of a deal's budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowMilestone {
    pub id: MilestoneId,
    pub deal_id: DealId,
    pub label: String,
    pub amount: Money,
    pub status: MilestoneStatus,
    pub escrow_state: EscrowState,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub released_at: Option<Timestamp>,
}

impl EscrowMilestone {
    /// Creates a planned milestone awaiting its invoice.
    pub fn planned(
        id: MilestoneId,
        deal_id: DealId,
        label: impl Into<String>,
        amount: Money,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            deal_id,
            label: label.into(),
            amount,
            status: MilestoneStatus::Reserved,
            escrow_state: EscrowState::WaitingInvoice,
            created_at: now,
            updated_at: now,
            released_at: None,
        }
    }

    /// Marks the invoice for this milestone as sent.
    pub fn invoice_sent(&mut self) -> Result<(), DomainError> {
        self.move_escrow(EscrowState::InvoiceSent)
    }

    /// Marks funds reserved after the requester paid the invoice.
    pub fn mark_funds_reserved(&mut self) -> Result<(), DomainError> {
        // Direct reservation without a separate invoice step is legal
        // when payment and invoicing happen in one operation.
        if self.escrow_state == EscrowState::WaitingInvoice {
            self.move_escrow(EscrowState::InvoiceSent)?;
        }
        self.move_escrow(EscrowState::FundsReserved)
    }

    /// Enters the active delivery period.
    pub fn begin_active_period(&mut self) -> Result<(), DomainError> {
        self.move_escrow(EscrowState::ActivePeriod)
    }

    /// Flags the milestone as ready for payout.
    pub fn mark_payout_ready(&mut self) -> Result<(), DomainError> {
        self.move_escrow(EscrowState::PayoutReady)
    }

    /// Releases this milestone's funds to the fulfiller.
    ///
    /// Idempotent: releasing an already-released milestone is a no-op
    /// success so retries never double-pay. Releasing a milestone whose
    /// funds were never reserved is an `IllegalOperation`.
    pub fn release(&mut self) -> Result<ReleaseOutcome, DomainError> {
        if self.status == MilestoneStatus::Released {
            return Ok(ReleaseOutcome::AlreadyReleased);
        }
        if !self.escrow_state.is_funded() {
            return Err(DomainError::new(
                ErrorCode::IllegalOperation,
                format!(
                    "Cannot release milestone in escrow state {}",
                    self.escrow_state
                ),
            )
            .with_detail("milestone_id", self.id.to_string()));
        }

        self.escrow_state = self
            .escrow_state
            .transition_to(EscrowState::PaidOut)
            .map_err(|e| DomainError::new(ErrorCode::IllegalOperation, e.to_string()))?;
        self.status = self
            .status
            .transition_to(MilestoneStatus::Released)
            .map_err(|e| DomainError::new(ErrorCode::IllegalOperation, e.to_string()))?;
        let now = Timestamp::now();
        self.released_at = Some(now);
        self.updated_at = now;
        Ok(ReleaseOutcome::Released)
    }

    /// True while this milestone still holds reserved funds.
    pub fn is_funded(&self) -> bool {
        self.escrow_state.is_funded()
    }

    /// True once the milestone has been settled.
    pub fn is_released(&self) -> bool {
        self.status == MilestoneStatus::Released
    }

    fn move_escrow(&mut self, target: EscrowState) -> Result<(), DomainError> {
        self.escrow_state = self.escrow_state.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::IllegalOperation,
                format!(
                    "Cannot move escrow state from {} to {}",
                    self.escrow_state, target
                ),
            )
            .with_detail("milestone_id", self.id.to_string())
        })?;
        self.updated_at = Timestamp::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn milestone(amount: i64) -> EscrowMilestone {
        EscrowMilestone::planned(
            MilestoneId::new(),
            DealId::new(),
            "First draft",
            Money::new(amount).unwrap(),
        )
    }

    #[test]
    fn planned_milestone_awaits_invoice() {
        let m = milestone(22500);
        assert_eq!(m.status, MilestoneStatus::Reserved);
        assert_eq!(m.escrow_state, EscrowState::WaitingInvoice);
        assert!(!m.is_funded());
    }

    #[test]
    fn funding_walks_through_invoice_sent() {
        let mut m = milestone(22500);
        m.mark_funds_reserved().unwrap();
        assert_eq!(m.escrow_state, EscrowState::FundsReserved);
        assert!(m.is_funded());
    }

    #[test]
    fn release_settles_a_funded_milestone() {
        let mut m = milestone(22500);
        m.mark_funds_reserved().unwrap();

        let outcome = m.release().unwrap();
        assert_eq!(outcome, ReleaseOutcome::Released);
        assert_eq!(m.status, MilestoneStatus::Released);
        assert_eq!(m.escrow_state, EscrowState::PaidOut);
        assert!(m.released_at.is_some());
    }

    #[test]
    fn release_is_idempotent() {
        let mut m = milestone(22500);
        m.mark_funds_reserved().unwrap();
        m.release().unwrap();
        let released_at = m.released_at;

        let outcome = m.release().unwrap();
        assert_eq!(outcome, ReleaseOutcome::AlreadyReleased);
        assert_eq!(m.released_at, released_at);
    }

    #[test]
    fn releasing_unreserved_milestone_is_illegal() {
        let mut m = milestone(22500);
        let err = m.release().unwrap_err();
        assert_eq!(err.code, ErrorCode::IllegalOperation);
        assert_eq!(m.status, MilestoneStatus::Reserved);
    }

    #[test]
    fn release_works_from_active_period() {
        let mut m = milestone(22500);
        m.mark_funds_reserved().unwrap();
        m.begin_active_period().unwrap();

        assert_eq!(m.release().unwrap(), ReleaseOutcome::Released);
    }

    #[test]
    fn escrow_state_is_linear_with_release_jumps() {
        assert!(EscrowState::WaitingInvoice.can_transition_to(&EscrowState::InvoiceSent));
        assert!(!EscrowState::WaitingInvoice.can_transition_to(&EscrowState::FundsReserved));
        assert!(!EscrowState::WaitingInvoice.can_transition_to(&EscrowState::PaidOut));
        assert!(EscrowState::FundsReserved.can_transition_to(&EscrowState::PaidOut));
        assert!(EscrowState::PaidOut.is_terminal());
    }

    #[test]
    fn status_round_trips_through_string_form() {
        for s in [
            MilestoneStatus::Reserved,
            MilestoneStatus::InProgress,
            MilestoneStatus::Review,
            MilestoneStatus::Released,
        ] {
            let parsed: MilestoneStatus = s.as_str().parse().unwrap();
            assert_eq!(parsed, s);
        }
        for s in [
            EscrowState::WaitingInvoice,
            EscrowState::InvoiceSent,
            EscrowState::FundsReserved,
            EscrowState::ActivePeriod,
            EscrowState::PayoutReady,
            EscrowState::PaidOut,
        ] {
            let parsed: EscrowState = s.as_str().parse().unwrap();
            assert_eq!(parsed, s);
        }
    }
}
