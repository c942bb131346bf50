//! Shared fixtures for handler tests.
//!
//! Handler tests run against the in-memory store so they exercise the
//! same conflict and audit semantics as the integration scenarios.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::adapters::events::InMemoryEventBus;
use crate::adapters::memory::InMemoryDealStore;
use crate::domain::deal::Deal;
use crate::domain::foundation::{
    CommandMetadata, DealId, DomainError, ErrorCode, Money, TermsId, UserId,
};
use crate::domain::terms::{TermsFields, TermsVersion};
use crate::ports::{DealNotification, DealRepository, Notifier};

pub fn advertiser() -> UserId {
    UserId::new("adv-1").unwrap()
}

pub fn creator() -> UserId {
    UserId::new("cr-1").unwrap()
}

pub fn outsider() -> UserId {
    UserId::new("nobody").unwrap()
}

pub fn metadata_for(user: UserId) -> CommandMetadata {
    CommandMetadata::new(user).with_correlation_id("test-correlation")
}

/// Notifier that records notifications; optionally failing to prove
/// notification failures never fail a command.
pub struct CapturingNotifier {
    pub sent: Mutex<Vec<DealNotification>>,
    fail: bool,
}

impl CapturingNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<DealNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for CapturingNotifier {
    async fn notify(&self, notification: DealNotification) -> Result<(), DomainError> {
        if self.fail {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                "Simulated notification failure",
            ));
        }
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

/// Seeds a store with a pending deal and its terms v1 authored by the
/// advertiser. Returns the store, bus and deal id.
pub async fn seeded_pending_deal(
    fields: TermsFields,
) -> (Arc<InMemoryDealStore>, Arc<InMemoryEventBus>, DealId) {
    let store = Arc::new(InMemoryDealStore::new());
    let bus = Arc::new(InMemoryEventBus::new());

    let deal = Deal::propose(
        DealId::new(),
        advertiser(),
        creator(),
        "Spring campaign",
        Money::new(45000).unwrap(),
        None,
        "Three integration videos",
        false,
    )
    .unwrap();
    let terms = TermsVersion::initial(TermsId::new(), deal.id, advertiser(), fields);
    let audit = crate::domain::audit::AuditLogEntry::record(
        deal.id,
        advertiser(),
        "Proposed deal",
        crate::domain::audit::AuditCategory::Terms,
    );
    store.create(&deal, &terms, &[audit]).await.unwrap();
    (store, bus, deal.id)
}
