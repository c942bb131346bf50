//! Deal lifecycle command and query handlers.

mod accept_terms;
mod create_proposal;
mod get_audit_log;
mod get_deal_state;
mod get_terms_history;
mod mark_draft_accepted;
mod mark_draft_submitted;
mod open_dispute;
mod reject_deal;
mod request_changes;
mod start_work;
mod submit_counter_offer;

pub use accept_terms::{AcceptTermsCommand, AcceptTermsHandler, AcceptTermsResult, TermsAcceptedEvent};
pub use create_proposal::{
    CreateProposalCommand, CreateProposalHandler, CreateProposalResult, DealProposedEvent,
};
pub use get_audit_log::{GetAuditLogHandler, GetAuditLogQuery};
pub use get_deal_state::{GetDealStateHandler, GetDealStateQuery};
pub use get_terms_history::{GetTermsHistoryHandler, GetTermsHistoryQuery, TermsHistoryView};
pub use mark_draft_accepted::{
    DealCompletedEvent, DraftAcceptedEvent, MarkDraftAcceptedCommand, MarkDraftAcceptedHandler,
    MarkDraftAcceptedResult,
};
pub use mark_draft_submitted::{
    DraftSubmittedEvent, MarkDraftSubmittedCommand, MarkDraftSubmittedHandler,
};
pub use open_dispute::{DisputeOpenedEvent, OpenDisputeCommand, OpenDisputeHandler};
pub use reject_deal::{DealRejectedEvent, RejectDealCommand, RejectDealHandler};
pub use request_changes::{ChangesRequestedEvent, RequestChangesCommand, RequestChangesHandler};
pub use start_work::{StartWorkCommand, StartWorkHandler, WorkStartedEvent};
pub use submit_counter_offer::{
    CounterOfferSubmittedEvent, SubmitCounterOfferCommand, SubmitCounterOfferHandler,
    SubmitCounterOfferResult,
};

use crate::domain::audit::AuditLogEntry;
use crate::domain::deal::Deal;

/// Outcome shared by every deal command: the new deal snapshot plus the
/// audit entries the command produced.
#[derive(Debug, Clone)]
pub struct DealCommandResult {
    pub deal: Deal,
    pub audit: Vec<AuditLogEntry>,
}
