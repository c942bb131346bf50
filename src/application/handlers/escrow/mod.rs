//! Escrow / payment command and query handlers.

mod get_escrow_summary;
mod pay_invoice;
mod release_milestone;
mod request_invoice;

pub use get_escrow_summary::{EscrowView, GetEscrowSummaryHandler, GetEscrowSummaryQuery};
pub use pay_invoice::{InvoicePaidEvent, PayInvoiceCommand, PayInvoiceHandler, PayInvoiceResult};
pub use release_milestone::{
    MilestoneReleasedEvent, ReleaseMilestoneCommand, ReleaseMilestoneHandler,
    ReleaseMilestoneResult,
};
pub use request_invoice::{
    InvoiceRequestedEvent, RequestInvoiceCommand, RequestInvoiceHandler, RequestInvoiceResult,
};
