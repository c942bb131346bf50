//! Deal lifecycle status.
//!
//! The whole transition table lives here. Handlers and adapters never
//! compare status strings; they go through the `StateMachine` trait.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::StateMachine;

/// Status of a deal in its lifecycle.
///
/// `Rejected` and `Completed` are terminal. `Disputed` has no outgoing
/// transitions in the core; dispute resolution happens through external
/// arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    /// Initial proposal awaiting the responder.
    Pending,
    /// A counter-offer is on the table.
    NeedsChanges,
    /// Terms agreed, escrow flow not yet started.
    Accepted,
    /// Terminal: proposal or counter-offer declined.
    Rejected,
    /// Fulfiller asked to invoice the agreed amount.
    InvoiceNeeded,
    /// Invoice issued, waiting for the requester to reserve funds.
    WaitingPayment,
    /// Funds settled (or not required); parties align on the brief.
    Briefing,
    /// Work underway.
    InProgress,
    /// Draft submitted, requester reviewing.
    Review,
    /// Terminal: all work accepted and milestones settled.
    Completed,
    /// Either party escalated; frozen pending arbitration.
    Disputed,
}

impl DealStatus {
    /// Stable string form used in persistence and APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::Pending => "pending",
            DealStatus::NeedsChanges => "needs_changes",
            DealStatus::Accepted => "accepted",
            DealStatus::Rejected => "rejected",
            DealStatus::InvoiceNeeded => "invoice_needed",
            DealStatus::WaitingPayment => "waiting_payment",
            DealStatus::Briefing => "briefing",
            DealStatus::InProgress => "in_progress",
            DealStatus::Review => "review",
            DealStatus::Completed => "completed",
            DealStatus::Disputed => "disputed",
        }
    }

    /// Human-readable label for notifications and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            DealStatus::Pending => "Pending response",
            DealStatus::NeedsChanges => "Counter-offer on the table",
            DealStatus::Accepted => "Terms accepted",
            DealStatus::Rejected => "Rejected",
            DealStatus::InvoiceNeeded => "Invoice requested",
            DealStatus::WaitingPayment => "Waiting for payment",
            DealStatus::Briefing => "Briefing",
            DealStatus::InProgress => "In progress",
            DealStatus::Review => "Under review",
            DealStatus::Completed => "Completed",
            DealStatus::Disputed => "Disputed",
        }
    }

    /// States from which a new terms version may be proposed.
    ///
    /// Negotiation states plus the work phase; the escrow corridor
    /// (`accepted` through `waiting_payment`) is excluded so money in
    /// flight settles before terms move again.
    pub fn allows_renegotiation(&self) -> bool {
        matches!(
            self,
            DealStatus::Pending
                | DealStatus::NeedsChanges
                | DealStatus::Briefing
                | DealStatus::InProgress
                | DealStatus::Review
        )
    }

    /// States in which a party's turn to respond to terms exists.
    pub fn awaits_response(&self) -> bool {
        matches!(self, DealStatus::Pending | DealStatus::NeedsChanges)
    }

    /// All statuses, for exhaustive walks in tests.
    pub fn all() -> [DealStatus; 11] {
        [
            DealStatus::Pending,
            DealStatus::NeedsChanges,
            DealStatus::Accepted,
            DealStatus::Rejected,
            DealStatus::InvoiceNeeded,
            DealStatus::WaitingPayment,
            DealStatus::Briefing,
            DealStatus::InProgress,
            DealStatus::Review,
            DealStatus::Completed,
            DealStatus::Disputed,
        ]
    }
}

impl StateMachine for DealStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use DealStatus::*;
        matches!(
            (self, target),
            // Responding to the initial proposal
            (Pending, Briefing)
                | (Pending, Accepted)
                | (Pending, NeedsChanges)
                | (Pending, Rejected)
                // Responding to a counter-offer
                | (NeedsChanges, Briefing)
                | (NeedsChanges, InProgress)
                | (NeedsChanges, Accepted)
                | (NeedsChanges, NeedsChanges)
                | (NeedsChanges, Rejected)
                // Escrow corridor
                | (Accepted, InvoiceNeeded)
                | (InvoiceNeeded, WaitingPayment)
                | (WaitingPayment, Briefing)
                // Work phase, including mid-flight renegotiation
                | (Briefing, InProgress)
                | (Briefing, NeedsChanges)
                | (InProgress, Review)
                | (InProgress, NeedsChanges)
                | (Review, Completed)
                | (Review, InProgress)
                | (Review, NeedsChanges)
                // Dispute from any non-terminal state
                | (Pending, Disputed)
                | (NeedsChanges, Disputed)
                | (Accepted, Disputed)
                | (InvoiceNeeded, Disputed)
                | (WaitingPayment, Disputed)
                | (Briefing, Disputed)
                | (InProgress, Disputed)
                | (Review, Disputed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use DealStatus::*;
        match self {
            Pending => vec![Briefing, Accepted, NeedsChanges, Rejected, Disputed],
            NeedsChanges => vec![Briefing, InProgress, Accepted, NeedsChanges, Rejected, Disputed],
            Accepted => vec![InvoiceNeeded, Disputed],
            InvoiceNeeded => vec![WaitingPayment, Disputed],
            WaitingPayment => vec![Briefing, Disputed],
            Briefing => vec![InProgress, NeedsChanges, Disputed],
            InProgress => vec![Review, NeedsChanges, Disputed],
            Review => vec![Completed, InProgress, NeedsChanges, Disputed],
            Completed => vec![],
            Rejected => vec![],
            Disputed => vec![],
        }
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DealStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DealStatus::Pending),
            "needs_changes" => Ok(DealStatus::NeedsChanges),
            "accepted" => Ok(DealStatus::Accepted),
            "rejected" => Ok(DealStatus::Rejected),
            "invoice_needed" => Ok(DealStatus::InvoiceNeeded),
            "waiting_payment" => Ok(DealStatus::WaitingPayment),
            "briefing" => Ok(DealStatus::Briefing),
            "in_progress" => Ok(DealStatus::InProgress),
            "review" => Ok(DealStatus::Review),
            "completed" => Ok(DealStatus::Completed),
            "disputed" => Ok(DealStatus::Disputed),
            other => Err(format!("unknown deal status: {}", other)),
        }
    }
}
