//! Axum handlers for the deal REST API.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::application::handlers::deal::{
    AcceptTermsCommand, AcceptTermsHandler, CreateProposalCommand, CreateProposalHandler,
    GetAuditLogHandler, GetAuditLogQuery, GetDealStateHandler, GetDealStateQuery,
    GetTermsHistoryHandler, GetTermsHistoryQuery, MarkDraftAcceptedCommand,
    MarkDraftAcceptedHandler, MarkDraftSubmittedCommand, MarkDraftSubmittedHandler,
    OpenDisputeCommand, OpenDisputeHandler, RejectDealCommand, RejectDealHandler,
    RequestChangesCommand, RequestChangesHandler, StartWorkCommand, StartWorkHandler,
    SubmitCounterOfferCommand, SubmitCounterOfferHandler, TermsHistoryView,
};
use crate::application::handlers::escrow::{
    GetEscrowSummaryHandler, GetEscrowSummaryQuery, PayInvoiceCommand, PayInvoiceHandler,
    ReleaseMilestoneCommand, ReleaseMilestoneHandler, RequestInvoiceCommand,
    RequestInvoiceHandler,
};
use crate::domain::foundation::{
    CommandMetadata, DealId, DomainError, ErrorCode, InvoiceId, MilestoneId, UserId,
};
use crate::ports::AuthProvider;

use super::dto::*;

/// Shared state for the deal API.
#[derive(Clone)]
pub struct DealAppState {
    pub auth: Arc<dyn AuthProvider>,
    pub create_proposal: Arc<CreateProposalHandler>,
    pub submit_counter_offer: Arc<SubmitCounterOfferHandler>,
    pub accept_terms: Arc<AcceptTermsHandler>,
    pub reject_deal: Arc<RejectDealHandler>,
    pub open_dispute: Arc<OpenDisputeHandler>,
    pub start_work: Arc<StartWorkHandler>,
    pub mark_draft_submitted: Arc<MarkDraftSubmittedHandler>,
    pub mark_draft_accepted: Arc<MarkDraftAcceptedHandler>,
    pub request_changes: Arc<RequestChangesHandler>,
    pub request_invoice: Arc<RequestInvoiceHandler>,
    pub pay_invoice: Arc<PayInvoiceHandler>,
    pub release_milestone: Arc<ReleaseMilestoneHandler>,
    pub get_deal_state: Arc<GetDealStateHandler>,
    pub get_terms_history: Arc<GetTermsHistoryHandler>,
    pub get_escrow_summary: Arc<GetEscrowSummaryHandler>,
    pub get_audit_log: Arc<GetAuditLogHandler>,
}

/// HTTP-facing wrapper around the domain error taxonomy.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.code {
            ErrorCode::DealNotFound
            | ErrorCode::TermsNotFound
            | ErrorCode::MilestoneNotFound
            | ErrorCode::InvoiceNotFound => StatusCode::NOT_FOUND,
            ErrorCode::NotAuthorized => StatusCode::FORBIDDEN,
            ErrorCode::ValidationFailed
            | ErrorCode::EmptyField
            | ErrorCode::OutOfRange
            | ErrorCode::InvalidFormat => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::InvalidStateTransition
            | ErrorCode::VersionConflict
            | ErrorCode::StaleStateConflict
            | ErrorCode::IllegalOperation => StatusCode::CONFLICT,
            ErrorCode::AuditWriteFailed
            | ErrorCode::DatabaseError
            | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            code: self.0.code.to_string(),
            message: self.0.message,
            details: self.0.details,
        };
        (status, Json(body)).into_response()
    }
}

fn metadata(user: UserId) -> CommandMetadata {
    CommandMetadata::new(user).with_source("api")
}

// === Commands ===

pub async fn create_deal(
    State(state): State<DealAppState>,
    Extension(user): Extension<UserId>,
    Json(body): Json<CreateProposalRequest>,
) -> Result<(StatusCode, Json<TermsResponse>), ApiError> {
    let creator_id = UserId::new(body.creator_id).map_err(DomainError::from)?;
    let cmd = CreateProposalCommand {
        creator_id,
        title: body.title,
        budget: parse_money("budget", body.budget)?,
        deadline: body.deadline,
        description: body.description,
        marking_required: body.marking_required,
        terms: body.terms,
    };
    let result = state.create_proposal.handle(cmd, metadata(user)).await?;
    Ok((
        StatusCode::CREATED,
        Json(TermsResponse {
            deal: result.deal,
            terms: result.terms,
            audit: result.audit,
        }),
    ))
}

pub async fn counter_offer(
    State(state): State<DealAppState>,
    Extension(user): Extension<UserId>,
    Path(deal_id): Path<Uuid>,
    Json(body): Json<CounterOfferRequest>,
) -> Result<Json<TermsResponse>, ApiError> {
    let cmd = SubmitCounterOfferCommand {
        deal_id: DealId::from_uuid(deal_id),
        fields: body.fields,
        rationale: body.rationale,
    };
    let result = state.submit_counter_offer.handle(cmd, metadata(user)).await?;
    Ok(Json(TermsResponse {
        deal: result.deal,
        terms: result.terms,
        audit: result.audit,
    }))
}

pub async fn accept_terms(
    State(state): State<DealAppState>,
    Extension(user): Extension<UserId>,
    Path(deal_id): Path<Uuid>,
) -> Result<Json<AcceptanceResponse>, ApiError> {
    let cmd = AcceptTermsCommand {
        deal_id: DealId::from_uuid(deal_id),
    };
    let result = state.accept_terms.handle(cmd, metadata(user)).await?;
    Ok(Json(AcceptanceResponse {
        deal: result.deal,
        terms: result.terms,
        milestones: result.milestones,
        audit: result.audit,
    }))
}

pub async fn reject_deal(
    State(state): State<DealAppState>,
    Extension(user): Extension<UserId>,
    Path(deal_id): Path<Uuid>,
    Json(body): Json<RejectRequest>,
) -> Result<Json<DealResponse>, ApiError> {
    let cmd = RejectDealCommand {
        deal_id: DealId::from_uuid(deal_id),
        reason: body.reason,
    };
    let result = state.reject_deal.handle(cmd, metadata(user)).await?;
    Ok(Json(DealResponse {
        deal: result.deal,
        audit: result.audit,
    }))
}

pub async fn open_dispute(
    State(state): State<DealAppState>,
    Extension(user): Extension<UserId>,
    Path(deal_id): Path<Uuid>,
    Json(body): Json<DisputeRequest>,
) -> Result<Json<DealResponse>, ApiError> {
    let cmd = OpenDisputeCommand {
        deal_id: DealId::from_uuid(deal_id),
        reason: body.reason,
    };
    let result = state.open_dispute.handle(cmd, metadata(user)).await?;
    Ok(Json(DealResponse {
        deal: result.deal,
        audit: result.audit,
    }))
}

pub async fn start_work(
    State(state): State<DealAppState>,
    Extension(user): Extension<UserId>,
    Path(deal_id): Path<Uuid>,
) -> Result<Json<DealResponse>, ApiError> {
    let cmd = StartWorkCommand {
        deal_id: DealId::from_uuid(deal_id),
    };
    let result = state.start_work.handle(cmd, metadata(user)).await?;
    Ok(Json(DealResponse {
        deal: result.deal,
        audit: result.audit,
    }))
}

pub async fn submit_draft(
    State(state): State<DealAppState>,
    Extension(user): Extension<UserId>,
    Path(deal_id): Path<Uuid>,
) -> Result<Json<DealResponse>, ApiError> {
    let cmd = MarkDraftSubmittedCommand {
        deal_id: DealId::from_uuid(deal_id),
    };
    let result = state.mark_draft_submitted.handle(cmd, metadata(user)).await?;
    Ok(Json(DealResponse {
        deal: result.deal,
        audit: result.audit,
    }))
}

pub async fn accept_draft(
    State(state): State<DealAppState>,
    Extension(user): Extension<UserId>,
    Path(deal_id): Path<Uuid>,
) -> Result<Json<DraftAcceptedResponse>, ApiError> {
    let cmd = MarkDraftAcceptedCommand {
        deal_id: DealId::from_uuid(deal_id),
    };
    let result = state.mark_draft_accepted.handle(cmd, metadata(user)).await?;
    Ok(Json(DraftAcceptedResponse {
        deal: result.deal,
        released_milestone: result.released_milestone,
        audit: result.audit,
    }))
}

pub async fn request_changes(
    State(state): State<DealAppState>,
    Extension(user): Extension<UserId>,
    Path(deal_id): Path<Uuid>,
    Json(body): Json<RequestChangesRequest>,
) -> Result<Json<DealResponse>, ApiError> {
    let cmd = RequestChangesCommand {
        deal_id: DealId::from_uuid(deal_id),
        note: body.note,
    };
    let result = state.request_changes.handle(cmd, metadata(user)).await?;
    Ok(Json(DealResponse {
        deal: result.deal,
        audit: result.audit,
    }))
}

pub async fn request_invoice(
    State(state): State<DealAppState>,
    Extension(user): Extension<UserId>,
    Path(deal_id): Path<Uuid>,
    Json(body): Json<RequestInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), ApiError> {
    let cmd = RequestInvoiceCommand {
        deal_id: DealId::from_uuid(deal_id),
        amount: parse_money("amount", body.amount)?,
        due_date: body.due_date,
    };
    let result = state.request_invoice.handle(cmd, metadata(user)).await?;
    Ok((
        StatusCode::CREATED,
        Json(InvoiceResponse {
            deal: result.deal,
            invoice: result.invoice,
            audit: result.audit,
        }),
    ))
}

pub async fn pay_invoice(
    State(state): State<DealAppState>,
    Extension(user): Extension<UserId>,
    Path((deal_id, invoice_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let cmd = PayInvoiceCommand {
        deal_id: DealId::from_uuid(deal_id),
        invoice_id: InvoiceId::from_uuid(invoice_id),
    };
    let result = state.pay_invoice.handle(cmd, metadata(user)).await?;
    Ok(Json(InvoiceResponse {
        deal: result.deal,
        invoice: result.invoice,
        audit: result.audit,
    }))
}

pub async fn release_milestone(
    State(state): State<DealAppState>,
    Extension(user): Extension<UserId>,
    Path((deal_id, milestone_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ReleaseResponse>, ApiError> {
    let cmd = ReleaseMilestoneCommand {
        deal_id: DealId::from_uuid(deal_id),
        milestone_id: MilestoneId::from_uuid(milestone_id),
    };
    let result = state.release_milestone.handle(cmd, metadata(user)).await?;
    Ok(Json(ReleaseResponse {
        deal: result.deal,
        milestone: result.milestone,
        summary: result.summary,
        released_now: result.released_now,
        audit: result.audit,
    }))
}

// === Queries ===

pub async fn get_deal(
    State(state): State<DealAppState>,
    Extension(user): Extension<UserId>,
    Path(deal_id): Path<Uuid>,
) -> Result<Json<crate::domain::deal::Deal>, ApiError> {
    let query = GetDealStateQuery {
        deal_id: DealId::from_uuid(deal_id),
    };
    let deal = state.get_deal_state.handle(query, metadata(user)).await?;
    Ok(Json(deal))
}

pub async fn get_terms(
    State(state): State<DealAppState>,
    Extension(user): Extension<UserId>,
    Path(deal_id): Path<Uuid>,
) -> Result<Json<TermsHistoryView>, ApiError> {
    let query = GetTermsHistoryQuery {
        deal_id: DealId::from_uuid(deal_id),
    };
    let view = state.get_terms_history.handle(query, metadata(user)).await?;
    Ok(Json(view))
}

pub async fn get_escrow(
    State(state): State<DealAppState>,
    Extension(user): Extension<UserId>,
    Path(deal_id): Path<Uuid>,
) -> Result<Json<crate::application::handlers::escrow::EscrowView>, ApiError> {
    let query = GetEscrowSummaryQuery {
        deal_id: DealId::from_uuid(deal_id),
    };
    let view = state.get_escrow_summary.handle(query, metadata(user)).await?;
    Ok(Json(view))
}

pub async fn get_audit(
    State(state): State<DealAppState>,
    Extension(user): Extension<UserId>,
    Path(deal_id): Path<Uuid>,
    Query(params): Query<AuditLogParams>,
) -> Result<Json<Vec<crate::domain::audit::AuditLogEntry>>, ApiError> {
    let query = GetAuditLogQuery {
        deal_id: DealId::from_uuid(deal_id),
        limit: params.limit,
    };
    let entries = state.get_audit_log.handle(query, metadata(user)).await?;
    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_errors_map_to_409() {
        let err = ApiError(DomainError::version_conflict("race"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn not_authorized_maps_to_403() {
        let err = ApiError(DomainError::not_authorized("not a party"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = ApiError(DomainError::new(ErrorCode::DealNotFound, "missing"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_maps_to_422() {
        let err = ApiError(DomainError::validation("rationale", "empty"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
