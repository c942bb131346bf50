//! RequestInvoiceHandler - the fulfiller invoices the agreed amount.
//!
//! The public contract has no separate "issue" step, so this handler
//! walks `accepted -> invoice_needed -> waiting_payment` in one atomic
//! commit, producing one audit entry per transition.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::audit::{AuditCategory, AuditLogEntry};
use crate::domain::deal::{Deal, DealRole};
use crate::domain::escrow::{EscrowMilestone, EscrowState, Invoice};
use crate::domain::foundation::{
    domain_event, CommandMetadata, DealId, DomainError, ErrorCode, EventId, InvoiceId, Money,
    SerializableDomainEvent, Timestamp, UserId,
};
use crate::ports::{DealNotification, DealReader, DealRepository, EventPublisher, Notifier};

/// Command to request an invoice for escrow funding.
#[derive(Debug, Clone)]
pub struct RequestInvoiceCommand {
    pub deal_id: DealId,
    pub amount: Money,
    pub due_date: NaiveDate,
}

/// Result of a successful invoice request.
#[derive(Debug, Clone)]
pub struct RequestInvoiceResult {
    pub deal: Deal,
    pub invoice: Invoice,
    pub audit: Vec<AuditLogEntry>,
}

/// Event published when an invoice is issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRequestedEvent {
    pub event_id: EventId,
    pub deal_id: DealId,
    pub invoice_number: String,
    pub amount: Money,
    pub requested_by: UserId,
    pub occurred_at: Timestamp,
}

domain_event!(
    InvoiceRequestedEvent,
    event_type = "deal.invoice_requested.v1",
    schema_version = 1,
    aggregate_id = deal_id,
    aggregate_type = "Deal",
    occurred_at = occurred_at,
    event_id = event_id
);

/// Handler for invoice requests. Creator only; deal must be `accepted`.
pub struct RequestInvoiceHandler {
    repository: Arc<dyn DealRepository>,
    reader: Arc<dyn DealReader>,
    event_publisher: Arc<dyn EventPublisher>,
    notifier: Arc<dyn Notifier>,
}

impl RequestInvoiceHandler {
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
        cmd: RequestInvoiceCommand,
        metadata: CommandMetadata,
    ) -> Result<RequestInvoiceResult, DomainError> {
        let mut deal = self
            .reader
            .find_deal(&cmd.deal_id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;
        deal.check_role(&metadata.user_id, DealRole::Creator)?;

        let sequence = self.reader.invoices(&cmd.deal_id).await?.len() as u32 + 1;
        let invoice = Invoice::issue(
            InvoiceId::new(),
            deal.id,
            sequence,
            cmd.amount,
            cmd.due_date,
        )?;

        // The earliest unfunded milestone's escrow state follows the
        // invoice.
        let milestone = self
            .reader
            .milestones(&cmd.deal_id)
            .await?
            .into_iter()
            .find(|m| m.escrow_state == EscrowState::WaitingInvoice)
            .map(|mut m| {
                m.invoice_sent()?;
                Ok::<EscrowMilestone, DomainError>(m)
            })
            .transpose()?;

        let expected_version = deal.record_version;
        deal.request_invoice()?;
        let requested = AuditLogEntry::record(
            deal.id,
            metadata.user_id.clone(),
            format!("Requested invoice {} for {}", invoice.invoice_number, invoice.amount),
            AuditCategory::Payments,
        )
        .with_metadata(serde_json::json!({
            "invoice_number": &invoice.invoice_number,
            "amount": invoice.amount,
            "due_date": invoice.due_date,
        }));

        deal.invoice_issued()?;
        let issued = AuditLogEntry::record(
            deal.id,
            metadata.user_id.clone(),
            format!("Invoice {} issued, awaiting payment", invoice.invoice_number),
            AuditCategory::Payments,
        );

        let audit = vec![requested, issued];
        self.repository
            .update_with_invoice(&deal, expected_version, &invoice, milestone.as_ref(), &audit)
            .await?;

        let event = InvoiceRequestedEvent {
            event_id: EventId::new(),
            deal_id: deal.id,
            invoice_number: invoice.invoice_number.clone(),
            amount: invoice.amount,
            requested_by: metadata.user_id.clone(),
            occurred_at: invoice.issued_at,
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
            deal.advertiser_id.clone(),
            "Invoice issued",
            format!(
                "Invoice {} for {} is due {}",
                invoice.invoice_number, invoice.amount, invoice.due_date
            ),
        );
        if let Err(err) = self.notifier.notify(notification).await {
            tracing::warn!(deal_id = %deal.id, error = %err, "failed to dispatch notification");
        }

        Ok(RequestInvoiceResult {
            deal,
            invoice,
            audit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::memory::InMemoryDealStore;
    use crate::application::handlers::deal::{AcceptTermsCommand, AcceptTermsHandler};
    use crate::application::handlers::support::{
        advertiser, creator, metadata_for, seeded_pending_deal, CapturingNotifier,
    };
    use crate::domain::deal::DealStatus;
    use crate::domain::escrow::InvoiceStatus;
    use crate::domain::terms::TermsFields;

    async fn accepted_escrow_deal() -> (Arc<InMemoryDealStore>, Arc<InMemoryEventBus>, DealId) {
        let fields = TermsFields {
            escrow_required: Some(true),
            ..Default::default()
        };
        let (store, bus, deal_id) = seeded_pending_deal(fields).await;
        AcceptTermsHandler::new(
            store.clone(),
            store.clone(),
            bus.clone(),
            Arc::new(CapturingNotifier::new()),
        )
        .handle(AcceptTermsCommand { deal_id }, metadata_for(creator()))
        .await
        .unwrap();
        (store, bus, deal_id)
    }

    fn handler(store: Arc<InMemoryDealStore>, bus: Arc<InMemoryEventBus>) -> RequestInvoiceHandler {
        RequestInvoiceHandler::new(store.clone(), store, bus, Arc::new(CapturingNotifier::new()))
    }

    fn command(deal_id: DealId) -> RequestInvoiceCommand {
        RequestInvoiceCommand {
            deal_id,
            amount: Money::new(45000).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2026, 8, 14).unwrap(),
        }
    }

    #[tokio::test]
    async fn invoice_request_walks_to_waiting_payment() {
        let (store, bus, deal_id) = accepted_escrow_deal().await;
        let h = handler(store.clone(), bus.clone());

        let result = h
            .handle(command(deal_id), metadata_for(creator()))
            .await
            .unwrap();

        assert_eq!(result.deal.status, DealStatus::WaitingPayment);
        assert_eq!(result.invoice.status, InvoiceStatus::Pending);
        assert_eq!(result.audit.len(), 2);
        assert!(bus.has_event("deal.invoice_requested.v1"));

        // The planned milestone followed the invoice.
        let milestones = store.milestones(&deal_id).await.unwrap();
        assert_eq!(milestones[0].escrow_state, EscrowState::InvoiceSent);
    }

    #[tokio::test]
    async fn only_the_creator_can_request_an_invoice() {
        let (store, bus, deal_id) = accepted_escrow_deal().await;
        let h = handler(store, bus);

        let err = h
            .handle(command(deal_id), metadata_for(advertiser()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotAuthorized);
    }

    #[tokio::test]
    async fn invoice_needs_an_accepted_deal() {
        let (store, bus, deal_id) = seeded_pending_deal(TermsFields::default()).await;
        let h = handler(store, bus);

        let err = h
            .handle(command(deal_id), metadata_for(creator()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }

    #[tokio::test]
    async fn invoice_numbers_carry_a_running_sequence() {
        let (store, bus, deal_id) = accepted_escrow_deal().await;
        let h = handler(store, bus);

        let result = h
            .handle(command(deal_id), metadata_for(creator()))
            .await
            .unwrap();
        assert!(result.invoice.invoice_number.ends_with("-0001"));
    }
}
