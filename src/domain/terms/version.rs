//! Terms version records and acceptance tracking.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DealId, DomainError, ErrorCode, TermsId, Timestamp, UserId};

use super::TermsFields;

/// Negotiation status of a terms version.
///
/// A version left behind by a rejection stays `draft` forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermsStatus {
    Draft,
    Accepted,
}

impl TermsStatus {
    /// Stable string form for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            TermsStatus::Draft => "draft",
            TermsStatus::Accepted => "accepted",
        }
    }

    /// Parses the stable string form.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "draft" => Ok(TermsStatus::Draft),
            "accepted" => Ok(TermsStatus::Accepted),
            other => Err(format!("unknown terms status: {}", other)),
        }
    }
}

/// Records that a specific party endorsed a specific version.
///
/// The author's own endorsement is implicit in authorship; a single
/// acceptance by the non-authoring party finalizes the version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermsAcceptance {
    pub terms_id: TermsId,
    pub user_id: UserId,
    pub accepted_at: Timestamp,
}

/// One dated snapshot of proposed deal parameters.
///
/// # Invariants
///
/// - `version` is a positive integer, strictly increasing per deal and
///   unique per (deal, version); the repositories enforce uniqueness
///   under concurrency
/// - only the latest version of a deal may be countered or accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermsVersion {
    /// Unique identifier of this record.
    pub id: TermsId,

    /// Deal this version belongs to.
    pub deal_id: DealId,

    /// Position in the linear history, starting at 1.
    pub version: u32,

    /// Party that authored this version.
    pub created_by: UserId,

    /// Negotiation status.
    pub status: TermsStatus,

    /// The proposed parameters, after merge with the prior version.
    pub fields: TermsFields,

    /// Why the author countered; required for every version after the
    /// first.
    pub rationale: Option<String>,

    /// When this version was created.
    pub created_at: Timestamp,
}

impl TermsVersion {
    /// Creates version 1 for a new deal.
    pub fn initial(id: TermsId, deal_id: DealId, created_by: UserId, fields: TermsFields) -> Self {
        Self {
            id,
            deal_id,
            version: 1,
            created_by,
            status: TermsStatus::Draft,
            fields,
            rationale: None,
            created_at: Timestamp::now(),
        }
    }

    /// Creates the next version as a counter-offer to `self`.
    ///
    /// Guard: you cannot counter your own still-pending offer. An
    /// accepted version is fair game for either party; countering it
    /// reopens negotiation with a fresh draft that supersedes it as
    /// the reference point for future diffs.
    /// Unspecified fields inherit from this version.
    pub fn counter(
        &self,
        id: TermsId,
        created_by: UserId,
        fields: TermsFields,
    ) -> Result<TermsVersion, DomainError> {
        if self.status == TermsStatus::Draft && created_by == self.created_by {
            return Err(DomainError::not_authorized(
                "Cannot counter your own still-pending offer",
            )
            .with_detail("terms_version", self.version.to_string()));
        }

        Ok(TermsVersion {
            id,
            deal_id: self.deal_id,
            version: self.version + 1,
            created_by,
            status: TermsStatus::Draft,
            fields: fields.merged_with(&self.fields),
            rationale: None,
            created_at: Timestamp::now(),
        })
    }

    /// Attaches the counter-offer rationale. Required on every version
    /// after the first; validated by the command handler.
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    /// Finalizes this version as accepted by the non-authoring party.
    pub fn finalize(&mut self, acceptor: &UserId) -> Result<TermsAcceptance, DomainError> {
        if acceptor == &self.created_by {
            return Err(DomainError::not_authorized(
                "The author cannot accept their own version",
            ));
        }
        if self.status == TermsStatus::Accepted {
            return Err(DomainError::new(
                ErrorCode::IllegalOperation,
                "Version is already accepted",
            ));
        }
        self.status = TermsStatus::Accepted;
        Ok(TermsAcceptance {
            terms_id: self.id,
            user_id: acceptor.clone(),
            accepted_at: Timestamp::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Money;

    fn advertiser() -> UserId {
        UserId::new("adv-1").unwrap()
    }

    fn creator() -> UserId {
        UserId::new("cr-1").unwrap()
    }

    fn v1() -> TermsVersion {
        TermsVersion::initial(
            TermsId::new(),
            DealId::new(),
            advertiser(),
            TermsFields {
                price: Some(Money::new(45000).unwrap()),
                notes: Some("two videos".to_string()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn initial_version_is_draft_v1() {
        let v = v1();
        assert_eq!(v.version, 1);
        assert_eq!(v.status, TermsStatus::Draft);
        assert!(v.rationale.is_none());
    }

    #[test]
    fn counter_increments_version_and_merges_fields() {
        let first = v1();
        let countered = first
            .counter(
                TermsId::new(),
                creator(),
                TermsFields {
                    price: Some(Money::new(50000).unwrap()),
                    ..Default::default()
                },
            )
            .unwrap()
            .with_rationale("need more time");

        assert_eq!(countered.version, 2);
        assert_eq!(countered.created_by, creator());
        assert_eq!(countered.fields.price, Some(Money::new(50000).unwrap()));
        // Inherited from v1
        assert_eq!(countered.fields.notes.as_deref(), Some("two videos"));
        assert_eq!(countered.rationale.as_deref(), Some("need more time"));
    }

    #[test]
    fn cannot_counter_own_pending_offer() {
        let first = v1();
        let err = first
            .counter(TermsId::new(), advertiser(), TermsFields::default())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotAuthorized);
    }

    #[test]
    fn either_party_can_reopen_accepted_terms() {
        let mut first = v1();
        first.finalize(&creator()).unwrap();

        // Even the original author may reopen once the version is
        // settled; there is no pending offer to protect.
        let reopened = first
            .counter(TermsId::new(), advertiser(), TermsFields::default())
            .unwrap();
        assert_eq!(reopened.version, 2);
        assert_eq!(reopened.status, TermsStatus::Draft);
    }

    #[test]
    fn finalize_records_acceptance_by_the_other_party() {
        let mut first = v1();
        let acceptance = first.finalize(&creator()).unwrap();

        assert_eq!(first.status, TermsStatus::Accepted);
        assert_eq!(acceptance.terms_id, first.id);
        assert_eq!(acceptance.user_id, creator());
    }

    #[test]
    fn author_cannot_accept_own_version() {
        let mut first = v1();
        let err = first.finalize(&advertiser()).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotAuthorized);
        assert_eq!(first.status, TermsStatus::Draft);
    }

    #[test]
    fn finalize_twice_is_rejected() {
        let mut first = v1();
        first.finalize(&creator()).unwrap();
        let err = first.finalize(&creator()).unwrap_err();
        assert_eq!(err.code, ErrorCode::IllegalOperation);
    }
}
