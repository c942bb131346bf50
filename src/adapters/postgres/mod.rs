//! PostgreSQL adapters.
//!
//! Table layout:
//! - `deals` - aggregate root rows with a `record_version` column
//! - `terms_versions` - unique on (deal_id, version)
//! - `terms_acceptances`, `escrow_milestones`, `invoices`
//! - `audit_log` - append-only, never updated or deleted
//!
//! All mutating operations run in a single transaction with their audit
//! inserts; optimistic-concurrency losers get `VersionConflict`.

mod deal_reader;
mod deal_repository;

pub use deal_reader::PostgresDealReader;
pub use deal_repository::PostgresDealRepository;
