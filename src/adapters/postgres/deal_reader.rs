//! PostgreSQL implementation of DealReader.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::audit::{AuditCategory, AuditLogEntry};
use crate::domain::deal::{Deal, DealStatus};
use crate::domain::escrow::{EscrowMilestone, EscrowState, Invoice, InvoiceStatus, MilestoneStatus};
use crate::domain::foundation::{
    AuditEntryId, DealId, DomainError, ErrorCode, InvoiceId, MilestoneId, Money, TermsId,
    Timestamp, UserId,
};
use crate::domain::terms::{TermsFields, TermsStatus, TermsVersion};
use crate::ports::DealReader;

/// PostgreSQL implementation of the DealReader port.
pub struct PostgresDealReader {
    pool: PgPool,
}

impl PostgresDealReader {
    /// Creates a new reader with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(err: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, err.to_string())
}

fn invalid_row(context: &str, detail: impl std::fmt::Display) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid {} row: {}", context, detail),
    )
}

fn parse_user(context: &str, raw: String) -> Result<UserId, DomainError> {
    UserId::new(raw).map_err(|e| invalid_row(context, e))
}

#[derive(Debug, sqlx::FromRow)]
struct DealRow {
    id: Uuid,
    advertiser_id: String,
    creator_id: String,
    title: String,
    budget: i64,
    status: String,
    deadline: Option<NaiveDate>,
    description: String,
    rejection_reason: Option<String>,
    rejected_at: Option<DateTime<Utc>>,
    marking_required: bool,
    record_version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DealRow> for Deal {
    type Error = DomainError;

    fn try_from(row: DealRow) -> Result<Self, Self::Error> {
        let status: DealStatus = row.status.parse().map_err(|e| invalid_row("deal", e))?;
        Ok(Deal {
            id: DealId::from_uuid(row.id),
            advertiser_id: parse_user("deal", row.advertiser_id)?,
            creator_id: parse_user("deal", row.creator_id)?,
            title: row.title,
            budget: Money::from_minor_units(row.budget),
            status,
            deadline: row.deadline,
            description: row.description,
            rejection_reason: row.rejection_reason,
            rejected_at: row.rejected_at.map(Timestamp::from_datetime),
            marking_required: row.marking_required,
            record_version: row.record_version as u64,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TermsRow {
    id: Uuid,
    deal_id: Uuid,
    version: i32,
    created_by: String,
    status: String,
    fields: String,
    rationale: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TermsRow> for TermsVersion {
    type Error = DomainError;

    fn try_from(row: TermsRow) -> Result<Self, Self::Error> {
        let fields: TermsFields =
            serde_json::from_str(&row.fields).map_err(|e| invalid_row("terms", e))?;
        Ok(TermsVersion {
            id: TermsId::from_uuid(row.id),
            deal_id: DealId::from_uuid(row.deal_id),
            version: row.version as u32,
            created_by: parse_user("terms", row.created_by)?,
            status: TermsStatus::parse(&row.status).map_err(|e| invalid_row("terms", e))?,
            fields,
            rationale: row.rationale,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MilestoneRow {
    id: Uuid,
    deal_id: Uuid,
    label: String,
    amount: i64,
    status: String,
    escrow_state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    released_at: Option<DateTime<Utc>>,
}

impl TryFrom<MilestoneRow> for EscrowMilestone {
    type Error = DomainError;

    fn try_from(row: MilestoneRow) -> Result<Self, Self::Error> {
        let status: MilestoneStatus =
            row.status.parse().map_err(|e| invalid_row("milestone", e))?;
        let escrow_state: EscrowState = row
            .escrow_state
            .parse()
            .map_err(|e| invalid_row("milestone", e))?;
        Ok(EscrowMilestone {
            id: MilestoneId::from_uuid(row.id),
            deal_id: DealId::from_uuid(row.deal_id),
            label: row.label,
            amount: Money::from_minor_units(row.amount),
            status,
            escrow_state,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            released_at: row.released_at.map(Timestamp::from_datetime),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    deal_id: Uuid,
    invoice_number: String,
    amount: i64,
    status: String,
    due_date: NaiveDate,
    issued_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = DomainError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        Ok(Invoice {
            id: InvoiceId::from_uuid(row.id),
            deal_id: DealId::from_uuid(row.deal_id),
            invoice_number: row.invoice_number,
            amount: Money::from_minor_units(row.amount),
            status: InvoiceStatus::parse(&row.status).map_err(|e| invalid_row("invoice", e))?,
            due_date: row.due_date,
            issued_at: Timestamp::from_datetime(row.issued_at),
            paid_at: row.paid_at.map(Timestamp::from_datetime),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    deal_id: Uuid,
    user_id: String,
    action: String,
    category: String,
    metadata: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditLogEntry {
    type Error = DomainError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let category: AuditCategory =
            row.category.parse().map_err(|e| invalid_row("audit", e))?;
        let metadata = row
            .metadata
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| invalid_row("audit", e))?;
        Ok(AuditLogEntry {
            id: AuditEntryId::from_uuid(row.id),
            deal_id: DealId::from_uuid(row.deal_id),
            user_id: parse_user("audit", row.user_id)?,
            action: row.action,
            category,
            metadata,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[async_trait]
impl DealReader for PostgresDealReader {
    async fn find_deal(&self, id: &DealId) -> Result<Option<Deal>, DomainError> {
        let row: Option<DealRow> = sqlx::query_as("SELECT * FROM deals WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(Deal::try_from).transpose()
    }

    async fn terms_history(&self, deal_id: &DealId) -> Result<Vec<TermsVersion>, DomainError> {
        let rows: Vec<TermsRow> =
            sqlx::query_as("SELECT * FROM terms_versions WHERE deal_id = $1 ORDER BY version ASC")
                .bind(*deal_id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        rows.into_iter().map(TermsVersion::try_from).collect()
    }

    async fn latest_terms(&self, deal_id: &DealId) -> Result<Option<TermsVersion>, DomainError> {
        let row: Option<TermsRow> = sqlx::query_as(
            "SELECT * FROM terms_versions WHERE deal_id = $1 ORDER BY version DESC LIMIT 1",
        )
        .bind(*deal_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(TermsVersion::try_from).transpose()
    }

    async fn milestones(&self, deal_id: &DealId) -> Result<Vec<EscrowMilestone>, DomainError> {
        let rows: Vec<MilestoneRow> = sqlx::query_as(
            "SELECT * FROM escrow_milestones WHERE deal_id = $1 ORDER BY created_at ASC",
        )
        .bind(*deal_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(EscrowMilestone::try_from).collect()
    }

    async fn find_milestone(
        &self,
        deal_id: &DealId,
        milestone_id: &MilestoneId,
    ) -> Result<Option<EscrowMilestone>, DomainError> {
        let row: Option<MilestoneRow> =
            sqlx::query_as("SELECT * FROM escrow_milestones WHERE id = $1 AND deal_id = $2")
                .bind(*milestone_id.as_uuid())
                .bind(*deal_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(EscrowMilestone::try_from).transpose()
    }

    async fn invoices(&self, deal_id: &DealId) -> Result<Vec<Invoice>, DomainError> {
        let rows: Vec<InvoiceRow> =
            sqlx::query_as("SELECT * FROM invoices WHERE deal_id = $1 ORDER BY issued_at ASC")
                .bind(*deal_id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        rows.into_iter().map(Invoice::try_from).collect()
    }

    async fn find_invoice(
        &self,
        deal_id: &DealId,
        invoice_id: &InvoiceId,
    ) -> Result<Option<Invoice>, DomainError> {
        let row: Option<InvoiceRow> =
            sqlx::query_as("SELECT * FROM invoices WHERE id = $1 AND deal_id = $2")
                .bind(*invoice_id.as_uuid())
                .bind(*deal_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(Invoice::try_from).transpose()
    }

    async fn audit_log(
        &self,
        deal_id: &DealId,
        limit: u32,
    ) -> Result<Vec<AuditLogEntry>, DomainError> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            "SELECT * FROM audit_log WHERE deal_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(*deal_id.as_uuid())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(AuditLogEntry::try_from).collect()
    }
}
