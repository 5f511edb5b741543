//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use loan_broker_server::application::{Application, ApplicationService, ApplicationStatus};
use loan_broker_server::audit::{AuditAction, AuditEntry, AuditSink};
use loan_broker_server::bank::Bank;
use loan_broker_server::error::{DomainError, DomainResult, SinkError};
use loan_broker_server::expiration::{ExpirationWarningService, OfferExpirationService};
use loan_broker_server::market::MarketAnalysisService;
use loan_broker_server::notification::{Notification, NotificationSink, NotificationType};
use loan_broker_server::offer::{
    ExpiredOffer, Offer, OfferCalculationService, OfferService, OfferSettings, OfferStatus,
};
use loan_broker_server::rate_card::{Currency, LoanType, RateCardService, RateCardTerms};
use loan_broker_server::store::{MemoryStore, OfferRepository, SelectionOutcome, SelectionPlan};

/// Audit sink that keeps every entry in memory
#[derive(Default)]
pub struct RecordingAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAuditSink {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<AuditAction> {
        self.entries().into_iter().map(|e| e.action).collect()
    }

    pub fn count(&self, action: AuditAction) -> usize {
        self.actions().into_iter().filter(|a| *a == action).count()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn log_action(&self, entry: AuditEntry) -> Result<(), SinkError> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

/// Notification sink that keeps every message in memory
#[derive(Default)]
pub struct RecordingNotificationSink {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotificationSink {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, recipient_id: Uuid, kind: NotificationType) -> usize {
        self.sent()
            .into_iter()
            .filter(|n| n.recipient_id == recipient_id && n.notification_type == kind)
            .count()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn notify(&self, notification: Notification) -> Result<(), SinkError> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

/// Sinks that always fail, for checking that side effects never block the core
pub struct FailingAuditSink;

#[async_trait]
impl AuditSink for FailingAuditSink {
    async fn log_action(&self, _entry: AuditEntry) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("audit store offline".to_string()))
    }
}

pub struct FailingNotificationSink;

#[async_trait]
impl NotificationSink for FailingNotificationSink {
    async fn notify(&self, _notification: Notification) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("mailer offline".to_string()))
    }
}

/// Offer repository that fails chosen offers on expiry and can stall the due scan
pub struct ScriptedOffers {
    pub inner: MemoryStore,
    pub fail_expiry_of: HashSet<Uuid>,
    pub due_scan_delay: Option<std::time::Duration>,
}

impl ScriptedOffers {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_expiry_of: HashSet::new(),
            due_scan_delay: None,
        }
    }
}

#[async_trait]
impl OfferRepository for ScriptedOffers {
    async fn find_offer(&self, id: Uuid) -> DomainResult<Option<Offer>> {
        self.inner.find_offer(id).await
    }

    async fn list_offers_for_application(&self, application_id: Uuid) -> DomainResult<Vec<Offer>> {
        self.inner.list_offers_for_application(application_id).await
    }

    async fn insert_offer(&self, offer: Offer) -> DomainResult<Offer> {
        self.inner.insert_offer(offer).await
    }

    async fn update_offer_status(
        &self,
        id: Uuid,
        expected: OfferStatus,
        target: OfferStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<Offer> {
        self.inner.update_offer_status(id, expected, target, now).await
    }

    async fn supersede_offers(
        &self,
        superseded: Vec<(Uuid, OfferStatus)>,
        replacement: Offer,
        now: DateTime<Utc>,
    ) -> DomainResult<Offer> {
        self.inner.supersede_offers(superseded, replacement, now).await
    }

    async fn apply_selection(
        &self,
        plan: SelectionPlan,
        now: DateTime<Utc>,
    ) -> DomainResult<SelectionOutcome> {
        self.inner.apply_selection(plan, now).await
    }

    async fn expire_offer(
        &self,
        id: Uuid,
        expected: OfferStatus,
        target: OfferStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<ExpiredOffer> {
        if self.fail_expiry_of.contains(&id) {
            return Err(DomainError::Database("connection reset".to_string()));
        }
        self.inner.expire_offer(id, expected, target, now).await
    }

    async fn find_due_offers(&self, now: DateTime<Utc>) -> DomainResult<Vec<Offer>> {
        if let Some(delay) = self.due_scan_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.find_due_offers(now).await
    }

    async fn find_offers_expiring_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<Offer>> {
        self.inner.find_offers_expiring_between(from, to).await
    }

    async fn mark_notified(&self, id: Uuid) -> DomainResult<()> {
        self.inner.mark_notified(id).await
    }
}

/// Every service wired over one in-memory store
pub struct Harness {
    pub store: MemoryStore,
    pub audit: Arc<RecordingAuditSink>,
    pub notifications: Arc<RecordingNotificationSink>,
    pub rate_cards: RateCardService,
    pub calculation: OfferCalculationService,
    pub offers: OfferService,
    pub applications: ApplicationService,
    pub expiration: OfferExpirationService,
    pub warnings: ExpirationWarningService,
    pub market: MarketAnalysisService,
}

impl Harness {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let audit = Arc::new(RecordingAuditSink::default());
        let notifications = Arc::new(RecordingNotificationSink::default());
        let shared = Arc::new(store.clone());

        Self {
            rate_cards: RateCardService::new(shared.clone(), audit.clone()),
            calculation: OfferCalculationService::new(
                shared.clone(),
                shared.clone(),
                shared.clone(),
                shared.clone(),
                audit.clone(),
                OfferSettings::default(),
            ),
            offers: OfferService::new(
                shared.clone(),
                shared.clone(),
                shared.clone(),
                audit.clone(),
                notifications.clone(),
            ),
            applications: ApplicationService::new(
                shared.clone(),
                shared.clone(),
                audit.clone(),
                notifications.clone(),
            ),
            expiration: OfferExpirationService::new(
                shared.clone(),
                audit.clone(),
                notifications.clone(),
                4,
            ),
            warnings: ExpirationWarningService::new(shared.clone(), notifications.clone(), 24),
            market: MarketAnalysisService::new(shared),
            store,
            audit,
            notifications,
        }
    }

    pub async fn add_bank(&self, name: &str) -> Uuid {
        let bank = Bank {
            id: Uuid::new_v4(),
            name: name.to_string(),
            active: true,
        };
        let id = bank.id;
        self.store.insert_bank(bank).await;
        id
    }

    pub async fn add_application(&self, status: ApplicationStatus) -> Application {
        let app = application(status, dec!(10000), 36);
        self.store.insert_application(app.clone()).await;
        app
    }

    pub async fn add_offer(
        &self,
        application_id: Uuid,
        bank_id: Uuid,
        status: OfferStatus,
        expires_at: DateTime<Utc>,
    ) -> Offer {
        let o = offer(application_id, bank_id, status, expires_at);
        self.store.put_offer(o.clone()).await;
        o
    }

    pub async fn offer(&self, id: Uuid) -> Offer {
        self.store.find_offer(id).await.unwrap().unwrap()
    }

    pub async fn application(&self, id: Uuid) -> Application {
        self.applications.get(id).await.unwrap()
    }
}

pub fn application(status: ApplicationStatus, principal: Decimal, term_months: i32) -> Application {
    let now = Utc::now();
    Application {
        id: Uuid::new_v4(),
        borrower_id: Uuid::new_v4(),
        loan_type: LoanType::Personal,
        currency: Currency::Eur,
        principal,
        term_months,
        status,
        created_at: now,
        submitted_at: None,
        updated_at: now,
    }
}

pub fn offer(
    application_id: Uuid,
    bank_id: Uuid,
    status: OfferStatus,
    expires_at: DateTime<Utc>,
) -> Offer {
    let now = Utc::now();
    Offer {
        id: Uuid::new_v4(),
        application_id,
        bank_id,
        status,
        apr: dec!(7.9),
        monthly_payment: dec!(312.90),
        total_cost: dec!(1264.40),
        origination_fee: dec!(200.00),
        insurance_cost: dec!(25.00),
        processing_time_days: 5,
        validity_period_days: 1,
        expires_at,
        notified: false,
        created_at: now,
        updated_at: now,
        offer_submitted_at: None,
        borrower_selected_at: match status {
            OfferStatus::Accepted => Some(now),
            _ => None,
        },
    }
}

pub fn terms(base_apr: Decimal) -> RateCardTerms {
    RateCardTerms {
        min_amount: dec!(1000),
        max_amount: dec!(100000),
        base_apr,
        apr_adjustment_range: dec!(2.0),
        origination_fee_percent: dec!(2.0),
        insurance_percent: dec!(0.25),
        processing_time_days: 5,
    }
}

pub fn hours_ago(hours: i64) -> DateTime<Utc> {
    Utc::now() - Duration::hours(hours)
}

pub fn hours_from_now(hours: i64) -> DateTime<Utc> {
    Utc::now() + Duration::hours(hours)
}
