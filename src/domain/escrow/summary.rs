//! Escrow reconciliation summary.
//!
//! Computed from the milestone set, never stored. The reconciliation
//! invariant `reserved + released + unallocated == total budget` holds
//! by construction; a milestone set that over-commits the budget fails
//! to summarize instead of producing a negative remainder.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ErrorCode, Money};

use super::EscrowMilestone;

/// Snapshot of where every minor unit of the budget sits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowSummary {
    /// Total agreed budget.
    pub total_budget: Money,
    /// Funds currently held in escrow.
    pub reserved: Money,
    /// Funds already paid out to the fulfiller.
    pub released: Money,
    /// Budget not yet committed to any funded milestone.
    pub unallocated: Money,
    /// Commission rate applied at settlement.
    pub commission_percent: u8,
    /// Informational platform fee on the total agreed amount.
    pub commission: Money,
}

impl EscrowSummary {
    /// Computes the summary for a deal's milestones.
    pub fn compute(
        total_budget: Money,
        commission_percent: u8,
        milestones: &[EscrowMilestone],
    ) -> Result<Self, DomainError> {
        let reserved = Money::sum(
            milestones
                .iter()
                .filter(|m| m.is_funded() && !m.is_released())
                .map(|m| &m.amount),
        )?;
        let released = Money::sum(
            milestones
                .iter()
                .filter(|m| m.is_released())
                .map(|m| &m.amount),
        )?;

        let committed = reserved.checked_add(released)?;
        let unallocated = total_budget.checked_sub(committed).map_err(|_| {
            DomainError::new(
                ErrorCode::InternalError,
                format!(
                    "Escrow reconciliation breach: committed {} exceeds budget {}",
                    committed, total_budget
                ),
            )
        })?;

        Ok(Self {
            total_budget,
            reserved,
            released,
            unallocated,
            commission_percent,
            commission: total_budget.percentage(commission_percent),
        })
    }

    /// Reconciliation invariant; holds for every computed summary.
    pub fn reconciles(&self) -> bool {
        self.reserved
            .checked_add(self.released)
            .and_then(|c| c.checked_add(self.unallocated))
            .map(|total| total == self.total_budget)
            .unwrap_or(false)
    }
}
