//! Typed terms fields.
//!
//! The negotiated parameters of a deal. Every field is optional so a
//! counter-offer only has to carry what it changes; unspecified fields
//! inherit from the prior version through [`TermsFields::merged_with`].
//!
//! Schema evolution rule: new fields are added as `Option` with
//! `#[serde(default)]` semantics, so versions persisted before the
//! field existed deserialize as "not negotiated".

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::Money;

/// Where and how the creative work is placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Placement {
    /// Video integration or dedicated video.
    Video {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_secs: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        platform: Option<String>,
    },
    /// Feed or blog post.
    Post {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        platform: Option<String>,
    },
    /// Podcast mention or episode segment.
    Podcast {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        episode_hint: Option<String>,
    },
}

/// One planned portion of the payment schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneSpec {
    /// Label shown to both parties (e.g. "First draft").
    pub label: String,
    /// Amount in minor currency units.
    pub amount: Money,
}

/// Negotiated deal parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermsFields {
    /// Agreed price in minor currency units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Money>,

    /// Delivery deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,

    /// Placement type and its parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,

    /// What the requester will judge the delivery against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<String>,

    /// Whether payment goes through escrow before work starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escrow_required: Option<bool>,

    /// Payment schedule; a single implicit milestone when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestones: Option<Vec<MilestoneSpec>>,

    /// Free-text remarks that travel with the version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TermsFields {
    /// Merges this (newer) set of fields over a prior version's fields.
    ///
    /// Fields left unspecified in `self` inherit the prior value.
    pub fn merged_with(&self, prior: &TermsFields) -> TermsFields {
        TermsFields {
            price: self.price.or(prior.price),
            deadline: self.deadline.or(prior.deadline),
            placement: self.placement.clone().or_else(|| prior.placement.clone()),
            acceptance_criteria: self
                .acceptance_criteria
                .clone()
                .or_else(|| prior.acceptance_criteria.clone()),
            escrow_required: self.escrow_required.or(prior.escrow_required),
            milestones: self.milestones.clone().or_else(|| prior.milestones.clone()),
            notes: self.notes.clone().or_else(|| prior.notes.clone()),
        }
    }

    /// Returns the keys of fields whose values differ between the two
    /// versions. Supports "what changed" summaries; carries no
    /// transition semantics.
    pub fn diff(&self, other: &TermsFields) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.price != other.price {
            changed.push("price");
        }
        if self.deadline != other.deadline {
            changed.push("deadline");
        }
        if self.placement != other.placement {
            changed.push("placement");
        }
        if self.acceptance_criteria != other.acceptance_criteria {
            changed.push("acceptance_criteria");
        }
        if self.escrow_required != other.escrow_required {
            changed.push("escrow_required");
        }
        if self.milestones != other.milestones {
            changed.push("milestones");
        }
        if self.notes != other.notes {
            changed.push("notes");
        }
        changed
    }

    /// True when escrow was negotiated on.
    pub fn requires_escrow(&self) -> bool {
        self.escrow_required.unwrap_or(false)
    }
}
