//! Axum router configuration for deal endpoints.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::adapters::http::middleware::require_auth;

use super::handlers::{
    accept_draft, accept_terms, counter_offer, create_deal, get_audit, get_deal, get_escrow,
    get_terms, open_dispute, pay_invoice, reject_deal, release_milestone, request_changes,
    request_invoice, start_work, submit_draft, DealAppState,
};

/// Create the deal API router.
///
/// # Routes
///
/// ## Commands
/// - `POST /` - Propose a new deal
/// - `POST /:deal_id/counter-offer` - Submit the next terms version
/// - `POST /:deal_id/accept` - Accept the latest terms version
/// - `POST /:deal_id/reject` - Reject the deal (terminal)
/// - `POST /:deal_id/dispute` - Open a dispute
/// - `POST /:deal_id/start` - Start work (creator)
/// - `POST /:deal_id/draft/submit` - Submit the draft for review
/// - `POST /:deal_id/draft/accept` - Accept the draft (advertiser)
/// - `POST /:deal_id/draft/request-changes` - Send the draft back
/// - `POST /:deal_id/invoices` - Request an invoice (creator)
/// - `POST /:deal_id/invoices/:invoice_id/pay` - Pay and reserve funds
/// - `POST /:deal_id/milestones/:milestone_id/release` - Release funds
///
/// ## Queries
/// - `GET /:deal_id` - Deal snapshot
/// - `GET /:deal_id/terms` - Terms history with turn and diff
/// - `GET /:deal_id/escrow` - Escrow summary, milestones, invoices
/// - `GET /:deal_id/audit?limit=N` - Audit log, newest first
pub fn deal_routes() -> Router<DealAppState> {
    Router::new()
        .route("/", post(create_deal))
        .route("/:deal_id", get(get_deal))
        .route("/:deal_id/counter-offer", post(counter_offer))
        .route("/:deal_id/accept", post(accept_terms))
        .route("/:deal_id/reject", post(reject_deal))
        .route("/:deal_id/dispute", post(open_dispute))
        .route("/:deal_id/start", post(start_work))
        .route("/:deal_id/draft/submit", post(submit_draft))
        .route("/:deal_id/draft/accept", post(accept_draft))
        .route("/:deal_id/draft/request-changes", post(request_changes))
        .route("/:deal_id/invoices", post(request_invoice))
        .route("/:deal_id/invoices/:invoice_id/pay", post(pay_invoice))
        .route(
            "/:deal_id/milestones/:milestone_id/release",
            post(release_milestone),
        )
        .route("/:deal_id/terms", get(get_terms))
        .route("/:deal_id/escrow", get(get_escrow))
        .route("/:deal_id/audit", get(get_audit))
}

/// Create the complete deal module router with bearer auth applied,
/// suitable for mounting at `/api`.
pub fn deal_router(state: DealAppState) -> Router {
    Router::new()
        .nest("/deals", deal_routes())
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
}
