//! Offer calculation fan-out
//!
//! Prices one application against every active bank's rate card. Each bank
//! runs as its own task on a bounded pool; one bank failing never stops the
//! others.

use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use super::{
    price_application, BankCalculationOutcome, CalculateOffersResponse, NewOffer, OfferStatus,
};
use crate::application::Application;
use crate::audit::{self, AuditAction, AuditEntry, AuditSink};
use crate::bank::Bank;
use crate::error::{DomainError, DomainResult};
use crate::rate_card::RateCardKey;
use crate::store::{ApplicationRepository, BankDirectory, OfferRepository, RateCardRepository};

/// Tuning for offer creation
#[derive(Debug, Clone, Copy)]
pub struct OfferSettings {
    /// How long a calculated offer stays valid
    pub validity_hours: i64,
    /// Maximum banks priced concurrently
    pub calculation_workers: usize,
}

impl Default for OfferSettings {
    fn default() -> Self {
        Self {
            validity_hours: 24,
            calculation_workers: 8,
        }
    }
}

/// Service for calculating offers from bank rate cards
#[derive(Clone)]
pub struct OfferCalculationService {
    applications: Arc<dyn ApplicationRepository>,
    offers: Arc<dyn OfferRepository>,
    rate_cards: Arc<dyn RateCardRepository>,
    banks: Arc<dyn BankDirectory>,
    audit: Arc<dyn AuditSink>,
    settings: OfferSettings,
}

impl OfferCalculationService {
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        offers: Arc<dyn OfferRepository>,
        rate_cards: Arc<dyn RateCardRepository>,
        banks: Arc<dyn BankDirectory>,
        audit: Arc<dyn AuditSink>,
        settings: OfferSettings,
    ) -> Self {
        Self {
            applications,
            offers,
            rate_cards,
            banks,
            audit,
            settings,
        }
    }

    /// Calculate an offer from every active bank with a matching rate card.
    /// Returns the ids of the offers created along with each bank's outcome.
    pub async fn calculate_offers(
        &self,
        application_id: Uuid,
    ) -> DomainResult<CalculateOffersResponse> {
        let application = self
            .applications
            .find_application(application_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Application", application_id))?;

        if application.status.is_terminal() {
            return Err(DomainError::validation(
                "status",
                format!("cannot calculate offers for a {} application", application.status),
            ));
        }

        let banks = self.banks.list_active_banks().await?;
        tracing::info!(
            application_id = %application_id,
            bank_count = banks.len(),
            "Starting offer calculation"
        );

        let application = Arc::new(application);
        let permits = Arc::new(Semaphore::new(self.settings.calculation_workers.max(1)));
        let mut tasks = JoinSet::new();

        for bank in banks {
            let service = self.clone();
            let application = application.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let bank_id = bank.id;
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return BankCalculationOutcome::Failed {
                            bank_id,
                            error: e.to_string(),
                        }
                    }
                };
                service.calculate_for_bank(&application, bank).await
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => tracing::error!(
                    application_id = %application_id,
                    error = %e,
                    "Offer calculation task panicked"
                ),
            }
        }
        outcomes.sort_by_key(|o| o.bank_id());

        let offer_ids: Vec<Uuid> = outcomes
            .iter()
            .filter_map(|o| match o {
                BankCalculationOutcome::Created { offer_id, .. } => Some(*offer_id),
                _ => None,
            })
            .collect();

        tracing::info!(
            application_id = %application_id,
            created = offer_ids.len(),
            "Completed offer calculation"
        );

        Ok(CalculateOffersResponse {
            application_id,
            offer_ids,
            outcomes,
        })
    }

    async fn calculate_for_bank(&self, application: &Application, bank: Bank) -> BankCalculationOutcome {
        let bank_id = bank.id;
        match self.try_calculate_for_bank(application, &bank).await {
            Ok(Some(offer_id)) => {
                tracing::info!(
                    application_id = %application.id,
                    bank_id = %bank_id,
                    offer_id = %offer_id,
                    "Created offer"
                );
                BankCalculationOutcome::Created { bank_id, offer_id }
            }
            Ok(None) => {
                tracing::warn!(
                    application_id = %application.id,
                    bank_id = %bank_id,
                    bank_name = %bank.name,
                    loan_type = %application.loan_type,
                    currency = %application.currency,
                    "No active rate card for bank, skipping"
                );
                BankCalculationOutcome::Skipped {
                    bank_id,
                    reason: "no active rate card".to_string(),
                }
            }
            Err(DomainError::Conflict(reason)) => BankCalculationOutcome::Skipped { bank_id, reason },
            Err(e) => {
                tracing::error!(
                    application_id = %application.id,
                    bank_id = %bank_id,
                    error = %e,
                    "Failed to calculate offer for bank"
                );
                BankCalculationOutcome::Failed {
                    bank_id,
                    error: e.to_string(),
                }
            }
        }
    }

    async fn try_calculate_for_bank(
        &self,
        application: &Application,
        bank: &Bank,
    ) -> DomainResult<Option<Uuid>> {
        let key = RateCardKey {
            bank_id: bank.id,
            loan_type: application.loan_type,
            currency: application.currency,
        };
        let Some(card) = self.rate_cards.find_active(key).await? else {
            return Ok(None);
        };

        let pricing = price_application(
            application,
            card.base_apr,
            card.apr_adjustment_range,
            card.origination_fee_percent,
            card.insurance_percent,
        )?;

        let now = Utc::now();
        let offer = NewOffer {
            application_id: application.id,
            bank_id: bank.id,
            status: OfferStatus::Calculated,
            pricing,
            processing_time_days: card.processing_time_days,
            validity_period_days: (self.settings.validity_hours / 24) as i32,
            expires_at: now + Duration::hours(self.settings.validity_hours),
        }
        .into_offer(now);

        let offer = self.offers.insert_offer(offer).await?;

        audit::record(
            self.audit.as_ref(),
            AuditEntry::new("Offer", offer.id, AuditAction::OfferCalculated).with_new(json!({
                "application_id": application.id,
                "bank_id": bank.id,
                "rate_card_id": card.id,
                "apr": offer.apr,
                "monthly_payment": offer.monthly_payment,
            })),
        )
        .await;

        Ok(Some(offer.id))
    }
}
