//! Offer service layer - borrower selection and bank-side offer management

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::{
    price_application, NewOffer, Offer, OfferStatus, ResubmitOfferRequest,
    SubmitOfferRequest, MAX_SUBMITTED_APR, MIN_SUBMITTED_APR,
};
use crate::application::{Application, ApplicationStatus};
use crate::audit::{self, AuditAction, AuditEntry, AuditSink};
use crate::error::{DomainError, DomainResult};
use crate::lifecycle;
use crate::notification::{self, NotificationSink, NotificationType};
use crate::rate_card::RateCardKey;
use crate::store::{
    ApplicationRepository, OfferRepository, RateCardRepository, SelectionOutcome, SelectionPlan,
};

/// Fee applied to hand-priced offers when the bank has no active card
const DEFAULT_ORIGINATION_FEE_PERCENT: Decimal = dec!(1.5);
/// Insurance applied to hand-priced offers when the bank has no active card
const DEFAULT_INSURANCE_PERCENT: Decimal = dec!(0.5);
const DEFAULT_PROCESSING_TIME_DAYS: i32 = 5;
const DEFAULT_SUBMITTED_VALIDITY_DAYS: i32 = 1;

fn check_apr_range(apr: Decimal) -> DomainResult<()> {
    if apr < MIN_SUBMITTED_APR || apr > MAX_SUBMITTED_APR {
        return Err(DomainError::OutOfRange {
            field: "apr",
            value: apr,
            min: MIN_SUBMITTED_APR,
            max: MAX_SUBMITTED_APR,
        });
    }
    Ok(())
}

fn validate_request<T: Validate>(request: &T) -> DomainResult<()> {
    request.validate().map_err(|e| {
        let field = e
            .field_errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "request".to_string());
        DomainError::validation(field, e.to_string())
    })
}

/// Service for offer selection, withdrawal and bank submissions
#[derive(Clone)]
pub struct OfferService {
    applications: Arc<dyn ApplicationRepository>,
    offers: Arc<dyn OfferRepository>,
    rate_cards: Arc<dyn RateCardRepository>,
    audit: Arc<dyn AuditSink>,
    notifications: Arc<dyn NotificationSink>,
}

impl OfferService {
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        offers: Arc<dyn OfferRepository>,
        rate_cards: Arc<dyn RateCardRepository>,
        audit: Arc<dyn AuditSink>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            applications,
            offers,
            rate_cards,
            audit,
            notifications,
        }
    }

    async fn application(&self, id: Uuid) -> DomainResult<Application> {
        self.applications
            .find_application(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Application", id))
    }

    pub async fn get_offer(&self, id: Uuid) -> DomainResult<Offer> {
        self.offers
            .find_offer(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Offer", id))
    }

    /// All offers for an application, oldest first
    pub async fn list_for_application(&self, application_id: Uuid) -> DomainResult<Vec<Offer>> {
        self.application(application_id).await?;
        self.offers.list_offers_for_application(application_id).await
    }

    /// Borrower selects an offer. Any previously accepted offer is moved back
    /// to CALCULATED and the application becomes ACCEPTED in the same unit.
    pub async fn select_offer(
        &self,
        borrower_id: Uuid,
        application_id: Uuid,
        offer_id: Uuid,
    ) -> DomainResult<SelectionOutcome> {
        let application = self.application(application_id).await?;
        if application.borrower_id != borrower_id {
            tracing::warn!(
                application_id = %application_id,
                borrower_id = %borrower_id,
                "Unauthorized offer selection attempt"
            );
            return Err(DomainError::Unauthorized(format!(
                "borrower {} does not own application {}",
                borrower_id, application_id
            )));
        }

        let offer = self.get_offer(offer_id).await?;
        if offer.application_id != application_id {
            return Err(DomainError::validation(
                "offer_id",
                format!("offer {} does not belong to application {}", offer_id, application_id),
            ));
        }

        let now = Utc::now();
        if offer.expires_at < now {
            return Err(DomainError::OfferExpired {
                offer_id,
                expires_at: offer.expires_at,
            });
        }

        if !matches!(
            application.status,
            ApplicationStatus::OffersAvailable | ApplicationStatus::Accepted
        ) {
            return Err(DomainError::invalid_transition(
                application.status,
                ApplicationStatus::Accepted,
            ));
        }

        if offer.status == OfferStatus::Accepted {
            return Ok(SelectionOutcome {
                application,
                selected: offer,
                deselected: None,
            });
        }
        lifecycle::require_transition(offer.status, OfferStatus::Accepted)?;

        let previous = self
            .offers
            .list_offers_for_application(application_id)
            .await?
            .into_iter()
            .find(|o| o.status == OfferStatus::Accepted && o.id != offer_id);
        if let Some(previous) = &previous {
            lifecycle::require_transition(previous.status, OfferStatus::Calculated)?;
        }
        if application.status != ApplicationStatus::Accepted {
            lifecycle::require_transition(application.status, ApplicationStatus::Accepted)?;
        }

        let outcome = self
            .offers
            .apply_selection(
                SelectionPlan {
                    application_id,
                    expected_application_status: application.status,
                    offer_id,
                    expected_offer_status: offer.status,
                    deselect_offer_id: previous.map(|p| p.id),
                },
                now,
            )
            .await?;

        tracing::info!(
            application_id = %application_id,
            offer_id = %offer_id,
            bank_id = %outcome.selected.bank_id,
            deselected = ?outcome.deselected.as_ref().map(|o| o.id),
            "Offer selected by borrower"
        );

        audit::record(
            self.audit.as_ref(),
            AuditEntry::new("Offer", offer_id, AuditAction::OfferSelected).with_new(json!({
                "borrower_id": borrower_id,
                "application_id": application_id,
                "bank_id": outcome.selected.bank_id,
                "apr": outcome.selected.apr,
                "deselected_offer_id": outcome.deselected.as_ref().map(|o| o.id),
            })),
        )
        .await;

        notification::send(
            self.notifications.as_ref(),
            borrower_id,
            NotificationType::OfferSelected,
            "You selected a loan offer",
            format!(
                "You selected offer {} at {}% APR with a monthly payment of {}.",
                offer_id, outcome.selected.apr, outcome.selected.monthly_payment
            ),
        )
        .await;
        notification::send(
            self.notifications.as_ref(),
            outcome.selected.bank_id,
            NotificationType::OfferSelected,
            "A borrower selected your offer",
            format!(
                "Offer {} for application {} was selected by the borrower.",
                offer_id, application_id
            ),
        )
        .await;

        Ok(outcome)
    }

    /// Bank withdraws one of its own offers. Accepted offers cannot be withdrawn.
    pub async fn withdraw_offer(&self, bank_id: Uuid, offer_id: Uuid) -> DomainResult<Offer> {
        let offer = self.get_offer(offer_id).await?;
        if offer.bank_id != bank_id {
            return Err(DomainError::Unauthorized(format!(
                "bank {} does not own offer {}",
                bank_id, offer_id
            )));
        }
        lifecycle::require_transition(offer.status, OfferStatus::Withdrawn)?;

        let withdrawn = self
            .offers
            .update_offer_status(offer_id, offer.status, OfferStatus::Withdrawn, Utc::now())
            .await?;

        tracing::info!(offer_id = %offer_id, bank_id = %bank_id, "Offer withdrawn");

        audit::record(
            self.audit.as_ref(),
            AuditEntry::new("Offer", offer_id, AuditAction::OfferWithdrawn)
                .with_old(json!({ "status": offer.status }))
                .with_new(json!({ "status": OfferStatus::Withdrawn })),
        )
        .await;

        Ok(withdrawn)
    }

    /// Bank submits a hand-priced offer. Any CALCULATED offer from the same
    /// bank for the application is superseded.
    pub async fn submit_offer(
        &self,
        bank_id: Uuid,
        request: SubmitOfferRequest,
    ) -> DomainResult<Offer> {
        validate_request(&request)?;
        check_apr_range(request.apr)?;

        let application = self.application(request.application_id).await?;
        if application.status.is_terminal() {
            return Err(DomainError::validation(
                "application_id",
                format!("application is {}", application.status),
            ));
        }

        let card = self
            .rate_cards
            .find_active(RateCardKey {
                bank_id,
                loan_type: application.loan_type,
                currency: application.currency,
            })
            .await?;
        let (fee_percent, insurance_percent) = match &card {
            Some(card) => (card.origination_fee_percent, card.insurance_percent),
            None => (DEFAULT_ORIGINATION_FEE_PERCENT, DEFAULT_INSURANCE_PERCENT),
        };
        let pricing = price_application(
            &application,
            request.apr,
            Decimal::ZERO,
            fee_percent,
            insurance_percent,
        )?;

        let superseded: Vec<(Uuid, OfferStatus)> = self
            .offers
            .list_offers_for_application(application.id)
            .await?
            .into_iter()
            .filter(|o| o.bank_id == bank_id && o.status == OfferStatus::Calculated)
            .map(|o| (o.id, o.status))
            .collect();
        for (_, status) in &superseded {
            lifecycle::require_transition(*status, OfferStatus::Expired)?;
        }

        let now = Utc::now();
        let validity_days = request
            .validity_period_days
            .unwrap_or(DEFAULT_SUBMITTED_VALIDITY_DAYS);
        let processing_time_days = request
            .processing_time_days
            .or(card.as_ref().map(|c| c.processing_time_days))
            .unwrap_or(DEFAULT_PROCESSING_TIME_DAYS);

        let offer = NewOffer {
            application_id: application.id,
            bank_id,
            status: OfferStatus::Submitted,
            pricing,
            processing_time_days,
            validity_period_days: validity_days,
            expires_at: expiry_after_days(now, validity_days),
        }
        .into_offer(now);

        let offer = self
            .offers
            .supersede_offers(superseded.clone(), offer, now)
            .await?;

        tracing::info!(
            offer_id = %offer.id,
            application_id = %application.id,
            bank_id = %bank_id,
            apr = %offer.apr,
            superseded = superseded.len(),
            "Bank submitted offer"
        );

        audit::record(
            self.audit.as_ref(),
            AuditEntry::new("Offer", offer.id, AuditAction::OfferSubmitted).with_new(json!({
                "bank_id": bank_id,
                "application_id": application.id,
                "apr": offer.apr,
                "monthly_payment": offer.monthly_payment,
                "total_cost": offer.total_cost,
                "superseded": superseded.iter().map(|(id, _)| id).collect::<Vec<_>>(),
            })),
        )
        .await;

        notification::send(
            self.notifications.as_ref(),
            application.borrower_id,
            NotificationType::OfferSubmitted,
            "You received a new loan offer",
            format!(
                "A bank submitted an offer at {}% APR for your application {}.",
                offer.apr, application.id
            ),
        )
        .await;

        Ok(offer)
    }

    /// Bank replaces one of its offers with updated terms and a fresh expiry
    pub async fn resubmit_offer(
        &self,
        bank_id: Uuid,
        offer_id: Uuid,
        request: ResubmitOfferRequest,
    ) -> DomainResult<Offer> {
        validate_request(&request)?;
        check_apr_range(request.apr)?;

        let old = self.get_offer(offer_id).await?;
        if old.bank_id != bank_id {
            return Err(DomainError::Unauthorized(format!(
                "bank {} does not own offer {}",
                bank_id, offer_id
            )));
        }
        if !matches!(old.status, OfferStatus::Calculated | OfferStatus::Submitted) {
            return Err(DomainError::invalid_transition(
                old.status,
                OfferStatus::Expired,
            ));
        }
        lifecycle::require_transition(old.status, OfferStatus::Expired)?;

        let application = self.application(old.application_id).await?;
        let mut pricing = price_application(
            &application,
            request.apr,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
        )?;
        pricing.origination_fee = request.origination_fee.unwrap_or(old.origination_fee);
        pricing.insurance_cost = old.insurance_cost;

        let now = Utc::now();
        let validity_days = request
            .validity_period_days
            .unwrap_or(DEFAULT_SUBMITTED_VALIDITY_DAYS);

        let replacement = NewOffer {
            application_id: old.application_id,
            bank_id,
            status: OfferStatus::Submitted,
            pricing,
            processing_time_days: request
                .processing_time_days
                .unwrap_or(old.processing_time_days),
            validity_period_days: validity_days,
            expires_at: expiry_after_days(now, validity_days),
        }
        .into_offer(now);

        let offer = self
            .offers
            .supersede_offers(vec![(old.id, old.status)], replacement, now)
            .await?;

        tracing::info!(
            old_offer_id = %old.id,
            offer_id = %offer.id,
            bank_id = %bank_id,
            "Offer resubmitted"
        );

        audit::record(
            self.audit.as_ref(),
            AuditEntry::new("Offer", offer.id, AuditAction::OfferResubmitted)
                .with_old(json!({
                    "offer_id": old.id,
                    "status": old.status,
                    "apr": old.apr,
                    "monthly_payment": old.monthly_payment,
                }))
                .with_new(json!({
                    "offer_id": offer.id,
                    "status": offer.status,
                    "apr": offer.apr,
                    "monthly_payment": offer.monthly_payment,
                })),
        )
        .await;

        notification::send(
            self.notifications.as_ref(),
            application.borrower_id,
            NotificationType::OfferSubmitted,
            "A bank updated its loan offer",
            format!(
                "Your offer for application {} was updated to {}% APR.",
                application.id, offer.apr
            ),
        )
        .await;

        Ok(offer)
    }
}

fn expiry_after_days(now: DateTime<Utc>, days: i32) -> DateTime<Utc> {
    now + Duration::days(i64::from(days))
}
