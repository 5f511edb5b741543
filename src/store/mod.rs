//! Storage abstraction
//!
//! Each trait method is one unit of work: implementations must apply every
//! write a method performs atomically. Status writes are compare-and-set on
//! the expected prior status and fail with `DomainError::Conflict` when the
//! row has moved on.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::application::{Application, ApplicationStatus};
use crate::bank::Bank;
use crate::error::DomainResult;
use crate::offer::{ExpiredOffer, Offer, OfferStatus};
use crate::rate_card::{Currency, LoanType, RateCard, RateCardKey};

/// Versioned rate card storage
#[async_trait]
pub trait RateCardRepository: Send + Sync {
    async fn find_active(&self, key: RateCardKey) -> DomainResult<Option<RateCard>>;

    /// Close the active version for `card`'s key (if any) and insert `card` as
    /// the new active version. The switch-over instant is taken inside the unit
    /// of work and is never earlier than the closed row's `valid_from`; it
    /// overrides `card.valid_from`.
    async fn replace_active(&self, card: RateCard) -> DomainResult<RateCardReplacement>;

    /// Active cards, optionally restricted to one loan type and currency
    async fn list_active(
        &self,
        market: Option<(LoanType, Currency)>,
    ) -> DomainResult<Vec<RateCard>>;

    async fn list_active_for_bank(&self, bank_id: Uuid) -> DomainResult<Vec<RateCard>>;

    /// Every version for `key`, oldest first
    async fn history(&self, key: RateCardKey) -> DomainResult<Vec<RateCard>>;
}

/// Result of a committed rate card version switch
#[derive(Debug, Clone, PartialEq)]
pub struct RateCardReplacement {
    pub active: RateCard,
    pub closed: Option<RateCard>,
}

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn find_application(&self, id: Uuid) -> DomainResult<Option<Application>>;

    async fn update_application_status(
        &self,
        id: Uuid,
        expected: ApplicationStatus,
        target: ApplicationStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<Application>;
}

/// Writes a borrower selection performs together
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPlan {
    pub application_id: Uuid,
    pub expected_application_status: ApplicationStatus,
    pub offer_id: Uuid,
    pub expected_offer_status: OfferStatus,
    /// Previously accepted offer to move back to CALCULATED
    pub deselect_offer_id: Option<Uuid>,
}

/// Result of a committed selection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionOutcome {
    pub application: Application,
    pub selected: Offer,
    pub deselected: Option<Offer>,
}

#[async_trait]
pub trait OfferRepository: Send + Sync {
    async fn find_offer(&self, id: Uuid) -> DomainResult<Option<Offer>>;

    async fn list_offers_for_application(&self, application_id: Uuid) -> DomainResult<Vec<Offer>>;

    /// Insert a new offer. Fails with `Conflict` when the bank already has a
    /// live offer for the application.
    async fn insert_offer(&self, offer: Offer) -> DomainResult<Offer>;

    async fn update_offer_status(
        &self,
        id: Uuid,
        expected: OfferStatus,
        target: OfferStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<Offer>;

    /// Move `superseded` offers to EXPIRED and insert `replacement`
    async fn supersede_offers(
        &self,
        superseded: Vec<(Uuid, OfferStatus)>,
        replacement: Offer,
        now: DateTime<Utc>,
    ) -> DomainResult<Offer>;

    async fn apply_selection(
        &self,
        plan: SelectionPlan,
        now: DateTime<Utc>,
    ) -> DomainResult<SelectionOutcome>;

    /// Move an offer to `target`. When it was ACCEPTED and its application is
    /// still ACCEPTED, the application reverts to SUBMITTED in the same unit.
    async fn expire_offer(
        &self,
        id: Uuid,
        expected: OfferStatus,
        target: OfferStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<ExpiredOffer>;

    /// Expirable offers with `expires_at < now`
    async fn find_due_offers(&self, now: DateTime<Utc>) -> DomainResult<Vec<Offer>>;

    /// Expirable, not yet notified offers expiring in `[from, to)`
    async fn find_offers_expiring_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<Offer>>;

    async fn mark_notified(&self, id: Uuid) -> DomainResult<()>;
}

#[async_trait]
pub trait BankDirectory: Send + Sync {
    async fn list_active_banks(&self) -> DomainResult<Vec<Bank>>;
}
