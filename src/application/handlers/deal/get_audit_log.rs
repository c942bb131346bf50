//! GetAuditLogHandler - read-only audit trail access.

use std::sync::Arc;

use crate::domain::audit::AuditLogEntry;
use crate::domain::foundation::{CommandMetadata, DealId, DomainError, ErrorCode};
use crate::ports::DealReader;

/// Upper bound on entries per query, regardless of the caller's limit.
const MAX_LIMIT: u32 = 500;

/// Query for a deal's audit trail.
#[derive(Debug, Clone)]
pub struct GetAuditLogQuery {
    pub deal_id: DealId,
    /// Maximum entries to return, newest first.
    pub limit: u32,
}

/// Handler for reading the audit log. Parties only.
pub struct GetAuditLogHandler {
    reader: Arc<dyn DealReader>,
}

impl GetAuditLogHandler {
    pub fn new(reader: Arc<dyn DealReader>) -> Self {
        Self { reader }
    }

    pub async fn handle(
        &self,
        query: GetAuditLogQuery,
        metadata: CommandMetadata,
    ) -> Result<Vec<AuditLogEntry>, DomainError> {
        let deal = self
            .reader
            .find_deal(&query.deal_id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::DealNotFound, "Deal not found"))?;
        deal.check_party(&metadata.user_id)?;

        self.reader
            .audit_log(&query.deal_id, query.limit.min(MAX_LIMIT))
            .await
    }
}
