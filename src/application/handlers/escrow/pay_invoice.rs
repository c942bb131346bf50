//! PayInvoiceHandler - the requester reserves funds in escrow.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::audit::{AuditCategory, AuditLogEntry};
use crate::domain::deal::{Deal, DealRole};
use crate::domain::escrow::{EscrowMilestone, EscrowState, Invoice};
use crate::domain::foundation::{
    domain_event, CommandMetadata, DealId, DomainError, ErrorCode, EventId, InvoiceId, MilestoneId,
    Money, SerializableDomainEvent, Timestamp, UserId,
};
use crate::ports::{DealNotification, DealReader, DealRepository, EventPublisher, Notifier};

/// Command to pay a pending invoice.
#[derive(Debug, Clone)]
pub struct PayInvoiceCommand {
    pub deal_id: DealId,
    pub invoice_id: InvoiceId,
}

/// Result of a successful payment.
#[derive(Debug, Clone)]
pub struct PayInvoiceResult {
    pub deal: Deal,
    pub invoice: Invoice,
    /// The milestone now holding the reserved funds.
    pub milestone: EscrowMilestone,
    pub audit: Vec<AuditLogEntry>,
}

/// Event published when an invoice is paid and funds are reserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoicePaidEvent {
    pub event_id: EventId,
    pub deal_id: DealId,
    pub invoice_number: String,
    pub amount: Money,
    pub milestone_id: MilestoneId,
    pub paid_by: UserId,
    pub occurred_at: Timestamp,
}

domain_event!(
    InvoicePaidEvent,
    event_type = "deal.invoice_paid.v1",
    schema_version = 1,
    aggregate_id = deal_id,
    aggregate_type = "Deal",
    occurred_at = occurred_at,
    event_id = event_id
);

/// Handler for invoice payment. Advertiser only; deal must be
/// `waiting_payment`.
pub struct PayInvoiceHandler {
    repository: Arc<dyn DealRepository>,
    reader: Arc<dyn DealReader>,
    event_publisher: Arc<dyn EventPublisher>,
    notifier: Arc<dyn Notifier>,
}

impl PayInvoiceHandler {
    pub fn new(
        repository: Arc<dyn DealRepository>,
        reader: Arc<dyn DealReader>,
        event_publisher: Arc<dyn EventPublisher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repository,
            reader,
            event_publisher,
            notifier,
        }
    }

    pub async fn handle(
        &self,
        cmd: PayInvoiceCommand,
        metadata: CommandMetadata,
    ) -> Result<PayInvoiceResult, DomainError> {
        let mut deal = self
            .reader
            .find_deal(&cmd.deal_id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;
        deal.check_role(&metadata.user_id, DealRole::Advertiser)?;

        let mut invoice = self
            .reader
            .find_invoice(&cmd.deal_id, &cmd.invoice_id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::InvoiceNotFound, "Invoice not found"))?;
        invoice.mark_paid()?;

        // Activate the milestone the invoice funded, or create one when
        // the schedule never planned any.
        let mut milestone = self
            .reader
            .milestones(&cmd.deal_id)
            .await?
            .into_iter()
            .find(|m| {
                matches!(
                    m.escrow_state,
                    EscrowState::InvoiceSent | EscrowState::WaitingInvoice
                )
            })
            .unwrap_or_else(|| {
                EscrowMilestone::planned(
                    MilestoneId::new(),
                    deal.id,
                    "Full payment",
                    invoice.amount,
                )
            });
        milestone.mark_funds_reserved()?;

        let expected_version = deal.record_version;
        deal.funds_reserved()?;

        let audit = AuditLogEntry::record(
            deal.id,
            metadata.user_id.clone(),
            format!(
                "Paid invoice {}, funds reserved in escrow",
                invoice.invoice_number
            ),
            AuditCategory::Payments,
        )
        .with_metadata(serde_json::json!({
            "invoice_number": &invoice.invoice_number,
            "amount": invoice.amount,
            "milestone_id": milestone.id,
        }));

        self.repository
            .update_with_payment(&deal, expected_version, &invoice, &milestone, &[audit.clone()])
            .await?;

        let event = InvoicePaidEvent {
            event_id: EventId::new(),
            deal_id: deal.id,
            invoice_number: invoice.invoice_number.clone(),
            amount: invoice.amount,
            milestone_id: milestone.id,
            paid_by: metadata.user_id.clone(),
            occurred_at: invoice.paid_at.unwrap_or(deal.updated_at),
        };
        let envelope = event
            .to_envelope()
            .with_correlation_id(metadata.correlation_id())
            .with_user_id(metadata.user_id.to_string());
        if let Err(err) = self.event_publisher.publish(envelope).await {
            tracing::warn!(deal_id = %deal.id, error = %err, "failed to publish deal event");
        }

        let notification = DealNotification::new(
            deal.id,
            deal.creator_id.clone(),
            "Funds reserved",
            format!(
                "Invoice {} was paid; {} is reserved in escrow",
                invoice.invoice_number, invoice.amount
            ),
        );
        if let Err(err) = self.notifier.notify(notification).await {
            tracing::warn!(deal_id = %deal.id, error = %err, "failed to dispatch notification");
        }

        Ok(PayInvoiceResult {
            deal,
            invoice,
            milestone,
            audit: vec![audit],
        })
    }
}
