//! Escrow / payment domain.
//!
//! Tracks the monetary lifecycle of a deal independent of, but
//! triggered by, the negotiation state: invoices, milestone funding and
//! release, and commission accounting.

mod invoice;
mod milestone;
mod summary;

pub use invoice::{Invoice, InvoiceStatus};
pub use milestone::{EscrowMilestone, EscrowState, MilestoneStatus, ReleaseOutcome};
pub use summary::EscrowSummary;
