//! Terms negotiation ledger.
//!
//! Versioned proposal records, acceptance tracking and the counter-offer
//! protocol. The ledger is a strictly linear history per deal; whose
//! turn it is derives purely from stored data.

mod fields;
mod version;

pub use fields::{MilestoneSpec, Placement, TermsFields};
pub use version::{TermsAcceptance, TermsStatus, TermsVersion};

use crate::domain::deal::Deal;
use crate::domain::foundation::UserId;

/// Computes whose turn it is to respond to the latest terms version.
///
/// A party's turn exists when the deal is still awaiting a response
/// (`pending` or `needs_changes`) and that party did not author the
/// most recent version. Returns `None` outside negotiation.
pub fn awaiting_response_from<'a>(deal: &'a Deal, latest: &TermsVersion) -> Option<&'a UserId> {
    if !deal.status.awaits_response() {
        return None;
    }
    deal.counterparty_of(&latest.created_by)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{DealId, Money, TermsId};

    fn parties() -> (UserId, UserId) {
        (UserId::new("adv-1").unwrap(), UserId::new("cr-1").unwrap())
    }

    fn pending_deal() -> Deal {
        let (adv, cr) = parties();
        Deal::propose(
            DealId::new(),
            adv,
            cr,
            "Podcast mention",
            Money::new(45000).unwrap(),
            None,
            "",
            false,
        )
        .unwrap()
    }

    #[test]
    fn responder_has_the_turn_on_a_fresh_proposal() {
        let (adv, cr) = parties();
        let deal = pending_deal();
        let v1 = TermsVersion::initial(TermsId::new(), deal.id, adv, TermsFields::default());

        assert_eq!(awaiting_response_from(&deal, &v1), Some(&cr));
    }

    #[test]
    fn author_of_the_latest_version_has_no_turn() {
        let (adv, cr) = parties();
        let mut deal = pending_deal();
        let v1 = TermsVersion::initial(TermsId::new(), deal.id, adv.clone(), TermsFields::default());
        deal.move_to_needs_changes().unwrap();
        let v2 = v1
            .counter(TermsId::new(), cr, TermsFields::default())
            .unwrap();

        assert_eq!(awaiting_response_from(&deal, &v2), Some(&adv));
    }

    #[test]
    fn no_turn_outside_negotiation_states() {
        let (adv, _) = parties();
        let mut deal = pending_deal();
        let v1 = TermsVersion::initial(TermsId::new(), deal.id, adv, TermsFields::default());
        deal.accept_terms(false, false).unwrap();

        assert_eq!(awaiting_response_from(&deal, &v1), None);
    }
}
