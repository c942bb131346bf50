//! PostgreSQL implementation of DealRepository.
//!
//! Every method commits one transaction: deal row update (guarded by
//! `record_version`), child rows and audit entries together. A failed
//! audit insert aborts the transaction, so an unaudited state change
//! can never commit.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::audit::AuditLogEntry;
use crate::domain::deal::Deal;
use crate::domain::escrow::{EscrowMilestone, Invoice};
use crate::domain::foundation::{DealId, DomainError, ErrorCode};
use crate::domain::terms::{TermsAcceptance, TermsVersion};
use crate::ports::DealRepository;

/// PostgreSQL implementation of the DealRepository port.
pub struct PostgresDealRepository {
    pool: PgPool,
}

impl PostgresDealRepository {
    /// Creates a new repository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> Result<Transaction<'_, Postgres>, DomainError> {
        self.pool.begin().await.map_err(map_db_err)
    }
}

/// Maps driver errors onto the domain taxonomy. Unique violations are
/// concurrent-writer races (duplicate terms version, duplicate id).
fn map_db_err(err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some("23505") {
            return DomainError::version_conflict(
                "Concurrent writer inserted the same record first",
            );
        }
    }
    DomainError::new(ErrorCode::DatabaseError, err.to_string())
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, DomainError> {
    serde_json::to_string(value)
        .map_err(|e| DomainError::new(ErrorCode::InternalError, e.to_string()))
}

async fn insert_deal_row(
    tx: &mut Transaction<'_, Postgres>,
    deal: &Deal,
) -> Result<(), DomainError> {
    sqlx::query(
        r#"
        INSERT INTO deals (
            id, advertiser_id, creator_id, title, budget, status,
            deadline, description, rejection_reason, rejected_at,
            marking_required, record_version, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(*deal.id.as_uuid())
    .bind(deal.advertiser_id.as_str())
    .bind(deal.creator_id.as_str())
    .bind(&deal.title)
    .bind(deal.budget.minor_units())
    .bind(deal.status.as_str())
    .bind(deal.deadline)
    .bind(&deal.description)
    .bind(&deal.rejection_reason)
    .bind(deal.rejected_at.map(|t| *t.as_datetime()))
    .bind(deal.marking_required)
    .bind(deal.record_version as i64)
    .bind(*deal.created_at.as_datetime())
    .bind(*deal.updated_at.as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(map_db_err)?;
    Ok(())
}

/// Writes the new deal state, failing with `VersionConflict` when
/// another writer moved `record_version` since the caller's read.
async fn update_deal_row(
    tx: &mut Transaction<'_, Postgres>,
    deal: &Deal,
    expected_version: u64,
) -> Result<(), DomainError> {
    let result = sqlx::query(
        r#"
        UPDATE deals SET
            title = $3, budget = $4, status = $5, deadline = $6,
            description = $7, rejection_reason = $8, rejected_at = $9,
            marking_required = $10, record_version = $11, updated_at = $12
        WHERE id = $1 AND record_version = $2
        "#,
    )
    .bind(*deal.id.as_uuid())
    .bind(expected_version as i64)
    .bind(&deal.title)
    .bind(deal.budget.minor_units())
    .bind(deal.status.as_str())
    .bind(deal.deadline)
    .bind(&deal.description)
    .bind(&deal.rejection_reason)
    .bind(deal.rejected_at.map(|t| *t.as_datetime()))
    .bind(deal.marking_required)
    .bind(deal.record_version as i64)
    .bind(*deal.updated_at.as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(map_db_err)?;

    if result.rows_affected() == 0 {
        let exists: Option<(i64,)> =
            sqlx::query_as("SELECT record_version FROM deals WHERE id = $1")
                .bind(*deal.id.as_uuid())
                .fetch_optional(&mut **tx)
                .await
                .map_err(map_db_err)?;
        return Err(match exists {
            Some((found,)) => DomainError::version_conflict(format!(
                "Deal was modified concurrently (expected version {}, found {})",
                expected_version, found
            )),
            None => DomainError::new(ErrorCode::DealNotFound, "Deal not found"),
        });
    }
    Ok(())
}

async fn insert_terms_row(
    tx: &mut Transaction<'_, Postgres>,
    terms: &TermsVersion,
) -> Result<(), DomainError> {
    sqlx::query(
        r#"
        INSERT INTO terms_versions (
            id, deal_id, version, created_by, status, fields, rationale, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(*terms.id.as_uuid())
    .bind(*terms.deal_id.as_uuid())
    .bind(terms.version as i32)
    .bind(terms.created_by.as_str())
    .bind(terms.status.as_str())
    .bind(encode_json(&terms.fields)?)
    .bind(&terms.rationale)
    .bind(*terms.created_at.as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(map_db_err)?;
    Ok(())
}

async fn upsert_milestone_row(
    tx: &mut Transaction<'_, Postgres>,
    milestone: &EscrowMilestone,
) -> Result<(), DomainError> {
    sqlx::query(
        r#"
        INSERT INTO escrow_milestones (
            id, deal_id, label, amount, status, escrow_state,
            created_at, updated_at, released_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (id) DO UPDATE SET
            status = EXCLUDED.status,
            escrow_state = EXCLUDED.escrow_state,
            updated_at = EXCLUDED.updated_at,
            released_at = EXCLUDED.released_at
        "#,
    )
    .bind(*milestone.id.as_uuid())
    .bind(*milestone.deal_id.as_uuid())
    .bind(&milestone.label)
    .bind(milestone.amount.minor_units())
    .bind(milestone.status.as_str())
    .bind(milestone.escrow_state.as_str())
    .bind(*milestone.created_at.as_datetime())
    .bind(*milestone.updated_at.as_datetime())
    .bind(milestone.released_at.map(|t| *t.as_datetime()))
    .execute(&mut **tx)
    .await
    .map_err(map_db_err)?;
    Ok(())
}

async fn append_audit_rows(
    tx: &mut Transaction<'_, Postgres>,
    audit: &[AuditLogEntry],
) -> Result<(), DomainError> {
    if audit.is_empty() {
        return Err(DomainError::new(
            ErrorCode::AuditWriteFailed,
            "Refusing to commit an unaudited state change",
        ));
    }
    for entry in audit {
        let metadata = entry.metadata.as_ref().map(encode_json).transpose()?;
        sqlx::query(
            r#"
            INSERT INTO audit_log (
                id, deal_id, user_id, action, category, metadata, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*entry.id.as_uuid())
        .bind(*entry.deal_id.as_uuid())
        .bind(entry.user_id.as_str())
        .bind(&entry.action)
        .bind(entry.category.as_str())
        .bind(metadata)
        .bind(*entry.created_at.as_datetime())
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::AuditWriteFailed, e.to_string())
        })?;
    }
    Ok(())
}

#[async_trait]
impl DealRepository for PostgresDealRepository {
    async fn create(
        &self,
        deal: &Deal,
        initial_terms: &TermsVersion,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError> {
        let mut tx = self.begin().await?;
        insert_deal_row(&mut tx, deal).await?;
        insert_terms_row(&mut tx, initial_terms).await?;
        append_audit_rows(&mut tx, audit).await?;
        tx.commit().await.map_err(map_db_err)
    }

    async fn update(
        &self,
        deal: &Deal,
        expected_version: u64,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError> {
        let mut tx = self.begin().await?;
        update_deal_row(&mut tx, deal, expected_version).await?;
        append_audit_rows(&mut tx, audit).await?;
        tx.commit().await.map_err(map_db_err)
    }

    async fn update_with_terms(
        &self,
        deal: &Deal,
        expected_version: u64,
        terms: &TermsVersion,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError> {
        let mut tx = self.begin().await?;
        update_deal_row(&mut tx, deal, expected_version).await?;
        // The unique (deal_id, version) index turns the concurrent
        // counter-offer race into a VersionConflict here.
        insert_terms_row(&mut tx, terms).await?;
        append_audit_rows(&mut tx, audit).await?;
        tx.commit().await.map_err(map_db_err)
    }

    async fn update_with_acceptance(
        &self,
        deal: &Deal,
        expected_version: u64,
        accepted: &TermsVersion,
        acceptance: &TermsAcceptance,
        milestones: &[EscrowMilestone],
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError> {
        let mut tx = self.begin().await?;
        update_deal_row(&mut tx, deal, expected_version).await?;

        let result = sqlx::query(
            "UPDATE terms_versions SET status = $2 WHERE id = $1 AND status = 'draft'",
        )
        .bind(*accepted.id.as_uuid())
        .bind(accepted.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::StaleStateConflict,
                "Terms version is no longer a draft",
            ));
        }

        sqlx::query(
            "INSERT INTO terms_acceptances (terms_id, user_id, accepted_at) VALUES ($1, $2, $3)",
        )
        .bind(*acceptance.terms_id.as_uuid())
        .bind(acceptance.user_id.as_str())
        .bind(*acceptance.accepted_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        for milestone in milestones {
            upsert_milestone_row(&mut tx, milestone).await?;
        }
        append_audit_rows(&mut tx, audit).await?;
        tx.commit().await.map_err(map_db_err)
    }

    async fn update_with_invoice(
        &self,
        deal: &Deal,
        expected_version: u64,
        invoice: &Invoice,
        milestone: Option<&EscrowMilestone>,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError> {
        let mut tx = self.begin().await?;
        update_deal_row(&mut tx, deal, expected_version).await?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, deal_id, invoice_number, amount, status, due_date, issued_at, paid_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(*invoice.id.as_uuid())
        .bind(*invoice.deal_id.as_uuid())
        .bind(&invoice.invoice_number)
        .bind(invoice.amount.minor_units())
        .bind(invoice.status.as_str())
        .bind(invoice.due_date)
        .bind(*invoice.issued_at.as_datetime())
        .bind(invoice.paid_at.map(|t| *t.as_datetime()))
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        if let Some(milestone) = milestone {
            upsert_milestone_row(&mut tx, milestone).await?;
        }
        append_audit_rows(&mut tx, audit).await?;
        tx.commit().await.map_err(map_db_err)
    }

    async fn update_with_payment(
        &self,
        deal: &Deal,
        expected_version: u64,
        invoice: &Invoice,
        milestone: &EscrowMilestone,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError> {
        let mut tx = self.begin().await?;
        update_deal_row(&mut tx, deal, expected_version).await?;

        let result = sqlx::query(
            "UPDATE invoices SET status = $2, paid_at = $3 WHERE id = $1 AND status = 'pending'",
        )
        .bind(*invoice.id.as_uuid())
        .bind(invoice.status.as_str())
        .bind(invoice.paid_at.map(|t| *t.as_datetime()))
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::StaleStateConflict,
                "Invoice was already settled",
            ));
        }

        upsert_milestone_row(&mut tx, milestone).await?;
        append_audit_rows(&mut tx, audit).await?;
        tx.commit().await.map_err(map_db_err)
    }

    async fn update_with_release(
        &self,
        deal: &Deal,
        expected_version: u64,
        milestone: Option<&EscrowMilestone>,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError> {
        let mut tx = self.begin().await?;
        update_deal_row(&mut tx, deal, expected_version).await?;
        if let Some(milestone) = milestone {
            upsert_milestone_row(&mut tx, milestone).await?;
        }
        append_audit_rows(&mut tx, audit).await?;
        tx.commit().await.map_err(map_db_err)
    }

    async fn update_milestone(
        &self,
        deal_id: &DealId,
        milestone: &EscrowMilestone,
        audit: &[AuditLogEntry],
    ) -> Result<(), DomainError> {
        let mut tx = self.begin().await?;

        // Atomic per milestone: never overwrite a released row, so a
        // concurrent or retried release cannot double-pay.
        let result = sqlx::query(
            r#"
            UPDATE escrow_milestones SET
                status = $3, escrow_state = $4, updated_at = $5, released_at = $6
            WHERE id = $1 AND deal_id = $2 AND status <> 'released'
            "#,
        )
        .bind(*milestone.id.as_uuid())
        .bind(*deal_id.as_uuid())
        .bind(milestone.status.as_str())
        .bind(milestone.escrow_state.as_str())
        .bind(*milestone.updated_at.as_datetime())
        .bind(milestone.released_at.map(|t| *t.as_datetime()))
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            let status: Option<(String,)> = sqlx::query_as(
                "SELECT status FROM escrow_milestones WHERE id = $1 AND deal_id = $2",
            )
            .bind(*milestone.id.as_uuid())
            .bind(*deal_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_db_err)?;
            return match status {
                // Already settled by the winning writer: silent no-op.
                Some((s,)) if s == "released" && milestone.is_released() => Ok(()),
                Some(_) => Err(DomainError::new(
                    ErrorCode::StaleStateConflict,
                    "Milestone was modified concurrently",
                )),
                None => Err(DomainError::new(
                    ErrorCode::MilestoneNotFound,
                    "Milestone not found",
                )),
            };
        }

        append_audit_rows(&mut tx, audit).await?;
        tx.commit().await.map_err(map_db_err)
    }
}
