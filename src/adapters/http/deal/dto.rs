//! Request and response types for the deal REST API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::audit::AuditLogEntry;
use crate::domain::deal::Deal;
use crate::domain::escrow::{EscrowMilestone, Invoice};
use crate::domain::foundation::Money;
use crate::domain::terms::{TermsFields, TermsVersion};

/// Body for `POST /deals`.
#[derive(Debug, Deserialize)]
pub struct CreateProposalRequest {
    pub creator_id: String,
    pub title: String,
    /// Budget in minor currency units.
    pub budget: i64,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub marking_required: bool,
    #[serde(default)]
    pub terms: TermsFields,
}

/// Body for `POST /deals/:id/counter-offer`.
#[derive(Debug, Deserialize)]
pub struct CounterOfferRequest {
    #[serde(default)]
    pub fields: TermsFields,
    pub rationale: String,
}

/// Body for `POST /deals/:id/reject`.
#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Body for `POST /deals/:id/dispute`.
#[derive(Debug, Default, Deserialize)]
pub struct DisputeRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Body for `POST /deals/:id/draft/request-changes`.
#[derive(Debug, Default, Deserialize)]
pub struct RequestChangesRequest {
    #[serde(default)]
    pub note: Option<String>,
}

/// Body for `POST /deals/:id/invoices`.
#[derive(Debug, Deserialize)]
pub struct RequestInvoiceRequest {
    /// Amount in minor currency units.
    pub amount: i64,
    pub due_date: NaiveDate,
}

/// Query parameters for `GET /deals/:id/audit`.
#[derive(Debug, Default, Deserialize)]
pub struct AuditLogParams {
    #[serde(default = "default_audit_limit")]
    pub limit: u32,
}

fn default_audit_limit() -> u32 {
    50
}

/// Standard command response: the new deal snapshot plus the audit
/// entries the command produced.
#[derive(Debug, Serialize)]
pub struct DealResponse {
    pub deal: Deal,
    pub audit: Vec<AuditLogEntry>,
}

/// Response for proposal and counter-offer commands.
#[derive(Debug, Serialize)]
pub struct TermsResponse {
    pub deal: Deal,
    pub terms: TermsVersion,
    pub audit: Vec<AuditLogEntry>,
}

/// Response for acceptance.
#[derive(Debug, Serialize)]
pub struct AcceptanceResponse {
    pub deal: Deal,
    pub terms: TermsVersion,
    pub milestones: Vec<EscrowMilestone>,
    pub audit: Vec<AuditLogEntry>,
}

/// Response for invoice commands.
#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub deal: Deal,
    pub invoice: Invoice,
    pub audit: Vec<AuditLogEntry>,
}

/// Response for draft acceptance.
#[derive(Debug, Serialize)]
pub struct DraftAcceptedResponse {
    pub deal: Deal,
    pub released_milestone: Option<EscrowMilestone>,
    pub audit: Vec<AuditLogEntry>,
}

/// Response for milestone release.
#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub deal: Deal,
    pub milestone: EscrowMilestone,
    pub summary: crate::domain::escrow::EscrowSummary,
    pub released_now: bool,
    pub audit: Vec<AuditLogEntry>,
}

/// Error body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "std::collections::HashMap::is_empty")]
    pub details: std::collections::HashMap<String, String>,
}

/// Money helper for request validation.
pub(crate) fn parse_money(
    field: &'static str,
    value: i64,
) -> Result<Money, crate::domain::foundation::DomainError> {
    Money::new(value)
        .map_err(|e| crate::domain::foundation::DomainError::from(e).with_detail("field", field))
}
