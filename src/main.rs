//! Dealdesk server entry point.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dealdesk::adapters::auth::JwtAuthProvider;
use dealdesk::adapters::events::InMemoryEventBus;
use dealdesk::adapters::http::{deal_router, DealAppState};
use dealdesk::adapters::notify::LogNotifier;
use dealdesk::adapters::postgres::{PostgresDealReader, PostgresDealRepository};
use dealdesk::application::handlers::deal::{
    AcceptTermsHandler, CreateProposalHandler, GetAuditLogHandler, GetDealStateHandler,
    GetTermsHistoryHandler, MarkDraftAcceptedHandler, MarkDraftSubmittedHandler,
    OpenDisputeHandler, RejectDealHandler, RequestChangesHandler, StartWorkHandler,
    SubmitCounterOfferHandler,
};
use dealdesk::application::handlers::escrow::{
    GetEscrowSummaryHandler, PayInvoiceHandler, ReleaseMilestoneHandler, RequestInvoiceHandler,
};
use dealdesk::config::AppConfig;
use dealdesk::ports::{DealReader, DealRepository, EventPublisher, FileGate, Notifier};

use async_trait::async_trait;
use dealdesk::domain::foundation::{DealId, DomainError};
use dealdesk::ports::FileCategory;

/// File gate backed by nothing yet: attachment storage is an external
/// collaborator. Until it is wired in, draft gating reports no files.
struct NoFilesGate;

#[async_trait]
impl FileGate for NoFilesGate {
    async fn has_file(
        &self,
        _deal_id: &DealId,
        _category: FileCategory,
    ) -> Result<bool, DomainError> {
        Ok(false)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.connect_timeout())
        .connect(&config.database.url)
        .await?;

    let repository: Arc<dyn DealRepository> = Arc::new(PostgresDealRepository::new(pool.clone()));
    let reader: Arc<dyn DealReader> = Arc::new(PostgresDealReader::new(pool));
    let event_bus = Arc::new(InMemoryEventBus::new());
    let publisher: Arc<dyn EventPublisher> = event_bus;
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier::new());
    let file_gate: Arc<dyn FileGate> = Arc::new(NoFilesGate);
    let auth = Arc::new(JwtAuthProvider::new(&config.auth.jwt_secret));
    let commission = config.escrow.commission_percent;

    let state = DealAppState {
        auth,
        create_proposal: Arc::new(CreateProposalHandler::new(
            repository.clone(),
            publisher.clone(),
            notifier.clone(),
        )),
        submit_counter_offer: Arc::new(SubmitCounterOfferHandler::new(
            repository.clone(),
            reader.clone(),
            publisher.clone(),
            notifier.clone(),
        )),
        accept_terms: Arc::new(AcceptTermsHandler::new(
            repository.clone(),
            reader.clone(),
            publisher.clone(),
            notifier.clone(),
        )),
        reject_deal: Arc::new(RejectDealHandler::new(
            repository.clone(),
            reader.clone(),
            publisher.clone(),
            notifier.clone(),
        )),
        open_dispute: Arc::new(OpenDisputeHandler::new(
            repository.clone(),
            reader.clone(),
            publisher.clone(),
            notifier.clone(),
        )),
        start_work: Arc::new(StartWorkHandler::new(
            repository.clone(),
            reader.clone(),
            publisher.clone(),
            notifier.clone(),
        )),
        mark_draft_submitted: Arc::new(MarkDraftSubmittedHandler::new(
            repository.clone(),
            reader.clone(),
            file_gate,
            publisher.clone(),
            notifier.clone(),
        )),
        mark_draft_accepted: Arc::new(MarkDraftAcceptedHandler::new(
            repository.clone(),
            reader.clone(),
            publisher.clone(),
            notifier.clone(),
            commission,
        )),
        request_changes: Arc::new(RequestChangesHandler::new(
            repository.clone(),
            reader.clone(),
            publisher.clone(),
            notifier.clone(),
        )),
        request_invoice: Arc::new(RequestInvoiceHandler::new(
            repository.clone(),
            reader.clone(),
            publisher.clone(),
            notifier.clone(),
        )),
        pay_invoice: Arc::new(PayInvoiceHandler::new(
            repository.clone(),
            reader.clone(),
            publisher.clone(),
            notifier.clone(),
        )),
        release_milestone: Arc::new(ReleaseMilestoneHandler::new(
            repository,
            reader.clone(),
            publisher,
            notifier,
            commission,
        )),
        get_deal_state: Arc::new(GetDealStateHandler::new(reader.clone())),
        get_terms_history: Arc::new(GetTermsHistoryHandler::new(reader.clone())),
        get_escrow_summary: Arc::new(GetEscrowSummaryHandler::new(reader.clone(), commission)),
        get_audit_log: Arc::new(GetAuditLogHandler::new(reader)),
    };

    let app = axum::Router::new()
        .nest("/api", deal_router(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(config.server.request_timeout()));

    let addr = config.server.bind_addr();
    tracing::info!(%addr, "dealdesk listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
