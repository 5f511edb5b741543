//! In-process store backed by `tokio::sync::RwLock`
//!
//! Every trait method takes the single write lock for its whole body, which
//! gives each method the same all-or-nothing behaviour as a database
//! transaction. Used by tests and local runs without PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    ApplicationRepository, BankDirectory, OfferRepository, RateCardReplacement, RateCardRepository,
    SelectionOutcome, SelectionPlan,
};
use crate::application::{Application, ApplicationStatus};
use crate::bank::Bank;
use crate::error::{DomainError, DomainResult};
use crate::offer::{ExpiredOffer, Offer, OfferStatus};
use crate::rate_card::{Currency, LoanType, RateCard, RateCardKey};

#[derive(Default)]
struct Tables {
    banks: Vec<Bank>,
    applications: HashMap<Uuid, Application>,
    offers: HashMap<Uuid, Offer>,
    rate_cards: Vec<RateCard>,
}

impl Tables {
    fn application_mut(&mut self, id: Uuid) -> DomainResult<&mut Application> {
        self.applications
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("Application", id))
    }

    fn offer(&self, id: Uuid) -> DomainResult<&Offer> {
        self.offers
            .get(&id)
            .ok_or_else(|| DomainError::not_found("Offer", id))
    }

    fn offer_mut(&mut self, id: Uuid) -> DomainResult<&mut Offer> {
        self.offers
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("Offer", id))
    }

    fn check_offer(&self, id: Uuid, expected: OfferStatus) -> DomainResult<()> {
        let offer = self.offer(id)?;
        if offer.status != expected {
            return Err(stale_offer(id, expected, offer.status));
        }
        Ok(())
    }

    fn has_live_offer(&self, application_id: Uuid, bank_id: Uuid) -> bool {
        self.offers.values().any(|o| {
            o.application_id == application_id && o.bank_id == bank_id && o.status.is_live()
        })
    }

    fn set_offer_status(
        &mut self,
        id: Uuid,
        target: OfferStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<Offer> {
        let offer = self.offer_mut(id)?;
        offer.status = target;
        offer.updated_at = now;
        Ok(offer.clone())
    }
}

fn stale_offer(id: Uuid, expected: OfferStatus, actual: OfferStatus) -> DomainError {
    DomainError::Conflict(format!(
        "offer {} is {} (expected {})",
        id, actual, expected
    ))
}

fn stale_application(id: Uuid, expected: ApplicationStatus, actual: ApplicationStatus) -> DomainError {
    DomainError::Conflict(format!(
        "application {} is {} (expected {})",
        id, actual, expected
    ))
}

/// Thread-safe in-memory implementation of every repository trait
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_bank(&self, bank: Bank) {
        self.tables.write().await.banks.push(bank);
    }

    pub async fn insert_application(&self, application: Application) {
        self.tables
            .write()
            .await
            .applications
            .insert(application.id, application);
    }

    /// Store an offer as-is, bypassing the live-offer check
    pub async fn put_offer(&self, offer: Offer) {
        self.tables.write().await.offers.insert(offer.id, offer);
    }

    pub async fn rate_card_count(&self) -> usize {
        self.tables.read().await.rate_cards.len()
    }
}

#[async_trait]
impl RateCardRepository for MemoryStore {
    async fn find_active(&self, key: RateCardKey) -> DomainResult<Option<RateCard>> {
        let tables = self.tables.read().await;
        Ok(tables
            .rate_cards
            .iter()
            .find(|c| c.key() == key && c.is_active())
            .cloned())
    }

    async fn replace_active(&self, mut card: RateCard) -> DomainResult<RateCardReplacement> {
        let mut tables = self.tables.write().await;
        let key = card.key();

        let active = tables
            .rate_cards
            .iter_mut()
            .find(|c| c.key() == key && c.is_active());

        let now = Utc::now();
        let closed = active.map(|active| {
            let switch_at = now.max(active.valid_from);
            active.valid_to = Some(switch_at);
            card.valid_from = switch_at;
            active.clone()
        });
        if closed.is_none() {
            card.valid_from = now;
        }

        tables.rate_cards.push(card.clone());
        Ok(RateCardReplacement {
            active: card,
            closed,
        })
    }

    async fn list_active(
        &self,
        market: Option<(LoanType, Currency)>,
    ) -> DomainResult<Vec<RateCard>> {
        let tables = self.tables.read().await;
        Ok(tables
            .rate_cards
            .iter()
            .filter(|c| c.is_active())
            .filter(|c| match market {
                Some((loan_type, currency)) => c.loan_type == loan_type && c.currency == currency,
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn list_active_for_bank(&self, bank_id: Uuid) -> DomainResult<Vec<RateCard>> {
        let tables = self.tables.read().await;
        Ok(tables
            .rate_cards
            .iter()
            .filter(|c| c.is_active() && c.bank_id == bank_id)
            .cloned()
            .collect())
    }

    async fn history(&self, key: RateCardKey) -> DomainResult<Vec<RateCard>> {
        let tables = self.tables.read().await;
        let mut versions: Vec<RateCard> = tables
            .rate_cards
            .iter()
            .filter(|c| c.key() == key)
            .cloned()
            .collect();
        versions.sort_by_key(|c| c.valid_from);
        Ok(versions)
    }
}

#[async_trait]
impl ApplicationRepository for MemoryStore {
    async fn find_application(&self, id: Uuid) -> DomainResult<Option<Application>> {
        Ok(self.tables.read().await.applications.get(&id).cloned())
    }

    async fn update_application_status(
        &self,
        id: Uuid,
        expected: ApplicationStatus,
        target: ApplicationStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<Application> {
        let mut tables = self.tables.write().await;
        let application = tables.application_mut(id)?;
        if application.status != expected {
            return Err(stale_application(id, expected, application.status));
        }

        application.status = target;
        application.updated_at = now;
        if target == ApplicationStatus::Submitted && application.submitted_at.is_none() {
            application.submitted_at = Some(now);
        }
        Ok(application.clone())
    }
}

#[async_trait]
impl OfferRepository for MemoryStore {
    async fn find_offer(&self, id: Uuid) -> DomainResult<Option<Offer>> {
        Ok(self.tables.read().await.offers.get(&id).cloned())
    }

    async fn list_offers_for_application(&self, application_id: Uuid) -> DomainResult<Vec<Offer>> {
        let tables = self.tables.read().await;
        let mut offers: Vec<Offer> = tables
            .offers
            .values()
            .filter(|o| o.application_id == application_id)
            .cloned()
            .collect();
        offers.sort_by_key(|o| o.created_at);
        Ok(offers)
    }

    async fn insert_offer(&self, offer: Offer) -> DomainResult<Offer> {
        let mut tables = self.tables.write().await;
        if tables.has_live_offer(offer.application_id, offer.bank_id) {
            return Err(DomainError::Conflict(format!(
                "bank {} already has a live offer for application {}",
                offer.bank_id, offer.application_id
            )));
        }
        tables.offers.insert(offer.id, offer.clone());
        Ok(offer)
    }

    async fn update_offer_status(
        &self,
        id: Uuid,
        expected: OfferStatus,
        target: OfferStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<Offer> {
        let mut tables = self.tables.write().await;
        tables.check_offer(id, expected)?;
        tables.set_offer_status(id, target, now)
    }

    async fn supersede_offers(
        &self,
        superseded: Vec<(Uuid, OfferStatus)>,
        replacement: Offer,
        now: DateTime<Utc>,
    ) -> DomainResult<Offer> {
        let mut tables = self.tables.write().await;

        for (id, expected) in &superseded {
            tables.check_offer(*id, *expected)?;
        }

        let still_live = tables.offers.values().any(|o| {
            o.application_id == replacement.application_id
                && o.bank_id == replacement.bank_id
                && o.status.is_live()
                && !superseded.iter().any(|(id, _)| *id == o.id)
        });
        if still_live {
            return Err(DomainError::Conflict(format!(
                "bank {} already has a live offer for application {}",
                replacement.bank_id, replacement.application_id
            )));
        }

        for (id, _) in &superseded {
            tables.set_offer_status(*id, OfferStatus::Expired, now)?;
        }
        tables.offers.insert(replacement.id, replacement.clone());
        Ok(replacement)
    }

    async fn apply_selection(
        &self,
        plan: SelectionPlan,
        now: DateTime<Utc>,
    ) -> DomainResult<SelectionOutcome> {
        let mut tables = self.tables.write().await;

        let current = tables.application_mut(plan.application_id)?.status;
        if current != plan.expected_application_status {
            return Err(stale_application(
                plan.application_id,
                plan.expected_application_status,
                current,
            ));
        }
        tables.check_offer(plan.offer_id, plan.expected_offer_status)?;
        if let Some(previous) = plan.deselect_offer_id {
            tables.check_offer(previous, OfferStatus::Accepted)?;
        }

        let deselected = match plan.deselect_offer_id {
            Some(previous) => {
                let offer = tables.offer_mut(previous)?;
                offer.status = OfferStatus::Calculated;
                offer.borrower_selected_at = None;
                offer.updated_at = now;
                Some(offer.clone())
            }
            None => None,
        };

        let selected = {
            let offer = tables.offer_mut(plan.offer_id)?;
            offer.status = OfferStatus::Accepted;
            offer.borrower_selected_at = Some(now);
            offer.updated_at = now;
            offer.clone()
        };

        let application = tables.application_mut(plan.application_id)?;
        application.status = ApplicationStatus::Accepted;
        application.updated_at = now;

        Ok(SelectionOutcome {
            application: application.clone(),
            selected,
            deselected,
        })
    }

    async fn expire_offer(
        &self,
        id: Uuid,
        expected: OfferStatus,
        target: OfferStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<ExpiredOffer> {
        let mut tables = self.tables.write().await;
        tables.check_offer(id, expected)?;
        let offer = tables.set_offer_status(id, target, now)?;

        let mut application_reverted = false;
        if expected == OfferStatus::Accepted {
            if let Some(application) = tables.applications.get_mut(&offer.application_id) {
                if application.status == ApplicationStatus::Accepted {
                    application.status = ApplicationStatus::Submitted;
                    application.updated_at = now;
                    application_reverted = true;
                }
            }
        }

        Ok(ExpiredOffer {
            offer,
            previous_status: expected,
            application_reverted,
        })
    }

    async fn find_due_offers(&self, now: DateTime<Utc>) -> DomainResult<Vec<Offer>> {
        let tables = self.tables.read().await;
        let mut due: Vec<Offer> = tables
            .offers
            .values()
            .filter(|o| o.expires_at < now && o.status.is_expirable())
            .cloned()
            .collect();
        due.sort_by_key(|o| o.expires_at);
        Ok(due)
    }

    async fn find_offers_expiring_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<Offer>> {
        let tables = self.tables.read().await;
        let mut expiring: Vec<Offer> = tables
            .offers
            .values()
            .filter(|o| {
                o.status.is_expirable() && !o.notified && o.expires_at >= from && o.expires_at < to
            })
            .cloned()
            .collect();
        expiring.sort_by_key(|o| o.expires_at);
        Ok(expiring)
    }

    async fn mark_notified(&self, id: Uuid) -> DomainResult<()> {
        let mut tables = self.tables.write().await;
        tables.offer_mut(id)?.notified = true;
        Ok(())
    }
}

#[async_trait]
impl BankDirectory for MemoryStore {
    async fn list_active_banks(&self) -> DomainResult<Vec<Bank>> {
        let tables = self.tables.read().await;
        Ok(tables.banks.iter().filter(|b| b.active).cloned().collect())
    }
}
