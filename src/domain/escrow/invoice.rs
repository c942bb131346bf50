//! Invoices.
//!
//! An invoice bridges the moment the fulfiller requests payment and the
//! moment the requester reserves funds in escrow.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    DealId, DomainError, ErrorCode, InvoiceId, Money, Timestamp,
};

/// Payment status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "pending" => Ok(InvoiceStatus::Pending),
            "paid" => Ok(InvoiceStatus::Paid),
            other => Err(format!("unknown invoice status: {}", other)),
        }
    }
}

/// An issued invoice against a deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub deal_id: DealId,
    pub invoice_number: String,
    pub amount: Money,
    pub status: InvoiceStatus,
    pub due_date: NaiveDate,
    pub issued_at: Timestamp,
    pub paid_at: Option<Timestamp>,
}

impl Invoice {
    /// Issues a new pending invoice.
    ///
    /// The invoice number carries the issue year and a per-deal running
    /// sequence, e.g. `INV-2026-0003`.
    pub fn issue(
        id: InvoiceId,
        deal_id: DealId,
        sequence: u32,
        amount: Money,
        due_date: NaiveDate,
    ) -> Result<Self, DomainError> {
        if amount.is_zero() {
            return Err(DomainError::validation(
                "amount",
                "Invoice amount must be positive",
            ));
        }
        let issued_at = Timestamp::now();
        let invoice_number = format!("INV-{}-{:04}", issued_at.as_datetime().year(), sequence);
        Ok(Self {
            id,
            deal_id,
            invoice_number,
            amount,
            status: InvoiceStatus::Pending,
            due_date,
            issued_at,
            paid_at: None,
        })
    }

    /// Marks the invoice paid.
    pub fn mark_paid(&mut self) -> Result<(), DomainError> {
        if self.status == InvoiceStatus::Paid {
            return Err(DomainError::new(
                ErrorCode::IllegalOperation,
                "Invoice is already paid",
            )
            .with_detail("invoice_number", self.invoice_number.clone()));
        }
        self.status = InvoiceStatus::Paid;
        self.paid_at = Some(Timestamp::now());
        Ok(())
    }

    /// True if the due date has passed without payment.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == InvoiceStatus::Pending && today > self.due_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice() -> Invoice {
        Invoice::issue(
            InvoiceId::new(),
            DealId::new(),
            1,
            Money::new(45000).unwrap(),
            NaiveDate::from_ymd_opt(2026, 8, 14).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn issue_creates_pending_invoice_with_numbered_reference() {
        let inv = invoice();
        assert_eq!(inv.status, InvoiceStatus::Pending);
        assert!(inv.invoice_number.starts_with("INV-"));
        assert!(inv.invoice_number.ends_with("-0001"));
        assert!(inv.paid_at.is_none());
    }

    #[test]
    fn issue_rejects_zero_amount() {
        let result = Invoice::issue(
            InvoiceId::new(),
            DealId::new(),
            1,
            Money::ZERO,
            NaiveDate::from_ymd_opt(2026, 8, 14).unwrap(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn mark_paid_sets_status_and_timestamp() {
        let mut inv = invoice();
        inv.mark_paid().unwrap();
        assert_eq!(inv.status, InvoiceStatus::Paid);
        assert!(inv.paid_at.is_some());
    }

    #[test]
    fn mark_paid_twice_is_illegal() {
        let mut inv = invoice();
        inv.mark_paid().unwrap();
        let err = inv.mark_paid().unwrap_err();
        assert_eq!(err.code, ErrorCode::IllegalOperation);
    }

    #[test]
    fn overdue_only_while_pending_and_past_due_date() {
        let mut inv = invoice();
        let before = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();
        let after = NaiveDate::from_ymd_opt(2026, 8, 20).unwrap();

        assert!(!inv.is_overdue(before));
        assert!(inv.is_overdue(after));

        inv.mark_paid().unwrap();
        assert!(!inv.is_overdue(after));
    }
}
