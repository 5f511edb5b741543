//! PostgreSQL store
//!
//! Each multi-row method runs inside one transaction and locks the rows it
//! reads with `FOR UPDATE` before writing them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
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

const LIVE_OFFER_STATUSES: &[OfferStatus] = &OfferStatus::EXPIRABLE;

/// sqlx-backed implementation of every repository trait
#[derive(Clone)]
pub struct PgStore {
    db_pool: PgPool,
}

impl PgStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

async fn lock_offer(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    expected: OfferStatus,
) -> DomainResult<Offer> {
    let offer = sqlx::query_as::<_, Offer>("SELECT * FROM offers WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| DomainError::not_found("Offer", id))?;

    if offer.status != expected {
        return Err(DomainError::Conflict(format!(
            "offer {} is {} (expected {})",
            id, offer.status, expected
        )));
    }
    Ok(offer)
}

async fn lock_application(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> DomainResult<Application> {
    sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| DomainError::not_found("Application", id))
}

async fn set_offer_status(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    target: OfferStatus,
    now: DateTime<Utc>,
) -> DomainResult<Offer> {
    let offer = sqlx::query_as::<_, Offer>(
        "UPDATE offers SET status = $1, updated_at = $2 WHERE id = $3 RETURNING *",
    )
    .bind(target)
    .bind(now)
    .bind(id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(offer)
}

async fn set_application_status(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    target: ApplicationStatus,
    now: DateTime<Utc>,
) -> DomainResult<Application> {
    let application = sqlx::query_as::<_, Application>(
        r#"
        UPDATE applications
        SET status = $1,
            updated_at = $2,
            submitted_at = CASE
                WHEN $1 = 'SUBMITTED'::application_status AND submitted_at IS NULL THEN $2
                ELSE submitted_at
            END
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(target)
    .bind(now)
    .bind(id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(application)
}

async fn insert_offer_row(tx: &mut Transaction<'_, Postgres>, offer: &Offer) -> DomainResult<Offer> {
    let live: Option<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT id FROM offers
        WHERE application_id = $1 AND bank_id = $2 AND status = ANY($3)
        FOR UPDATE
        "#,
    )
    .bind(offer.application_id)
    .bind(offer.bank_id)
    .bind(LIVE_OFFER_STATUSES)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some((existing,)) = live {
        return Err(DomainError::Conflict(format!(
            "bank {} already has a live offer {} for application {}",
            offer.bank_id, existing, offer.application_id
        )));
    }

    let inserted = sqlx::query_as::<_, Offer>(
        r#"
        INSERT INTO offers (
            id, application_id, bank_id, status, apr, monthly_payment, total_cost,
            origination_fee, insurance_cost, processing_time_days, validity_period_days,
            expires_at, notified, created_at, updated_at, offer_submitted_at,
            borrower_selected_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        RETURNING *
        "#,
    )
    .bind(offer.id)
    .bind(offer.application_id)
    .bind(offer.bank_id)
    .bind(offer.status)
    .bind(offer.apr)
    .bind(offer.monthly_payment)
    .bind(offer.total_cost)
    .bind(offer.origination_fee)
    .bind(offer.insurance_cost)
    .bind(offer.processing_time_days)
    .bind(offer.validity_period_days)
    .bind(offer.expires_at)
    .bind(offer.notified)
    .bind(offer.created_at)
    .bind(offer.updated_at)
    .bind(offer.offer_submitted_at)
    .bind(offer.borrower_selected_at)
    .fetch_one(&mut **tx)
    .await?;

    Ok(inserted)
}

#[async_trait]
impl RateCardRepository for PgStore {
    async fn find_active(&self, key: RateCardKey) -> DomainResult<Option<RateCard>> {
        let card = sqlx::query_as::<_, RateCard>(
            r#"
            SELECT * FROM rate_cards
            WHERE bank_id = $1 AND loan_type = $2 AND currency = $3 AND valid_to IS NULL
            "#,
        )
        .bind(key.bank_id)
        .bind(key.loan_type)
        .bind(key.currency)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(card)
    }

    async fn replace_active(&self, mut card: RateCard) -> DomainResult<RateCardReplacement> {
        let mut tx = self.db_pool.begin().await?;

        // 1. Lock the current version, if any
        let current = sqlx::query_as::<_, RateCard>(
            r#"
            SELECT * FROM rate_cards
            WHERE bank_id = $1 AND loan_type = $2 AND currency = $3 AND valid_to IS NULL
            FOR UPDATE
            "#,
        )
        .bind(card.bank_id)
        .bind(card.loan_type)
        .bind(card.currency)
        .fetch_optional(&mut *tx)
        .await?;

        // 2. Stamp the switch-over once the lock is held
        let now: DateTime<Utc> = sqlx::query_scalar("SELECT clock_timestamp()")
            .fetch_one(&mut *tx)
            .await?;
        card.valid_from = match &current {
            Some(current) => now.max(current.valid_from),
            None => now,
        };

        // 3. Close the current version
        let closed = match current {
            Some(current) => Some(
                sqlx::query_as::<_, RateCard>(
                    "UPDATE rate_cards SET valid_to = $2 WHERE id = $1 RETURNING *",
                )
                .bind(current.id)
                .bind(card.valid_from)
                .fetch_one(&mut *tx)
                .await?,
            ),
            None => None,
        };

        // 4. Insert the new active version
        let active = sqlx::query_as::<_, RateCard>(
            r#"
            INSERT INTO rate_cards (
                id, bank_id, loan_type, currency, min_amount, max_amount, base_apr,
                apr_adjustment_range, origination_fee_percent, insurance_percent,
                processing_time_days, valid_from, valid_to
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NULL)
            RETURNING *
            "#,
        )
        .bind(card.id)
        .bind(card.bank_id)
        .bind(card.loan_type)
        .bind(card.currency)
        .bind(card.min_amount)
        .bind(card.max_amount)
        .bind(card.base_apr)
        .bind(card.apr_adjustment_range)
        .bind(card.origination_fee_percent)
        .bind(card.insurance_percent)
        .bind(card.processing_time_days)
        .bind(card.valid_from)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(RateCardReplacement { active, closed })
    }

    async fn list_active(
        &self,
        market: Option<(LoanType, Currency)>,
    ) -> DomainResult<Vec<RateCard>> {
        let cards = match market {
            Some((loan_type, currency)) => {
                sqlx::query_as::<_, RateCard>(
                    r#"
                    SELECT * FROM rate_cards
                    WHERE loan_type = $1 AND currency = $2 AND valid_to IS NULL
                    ORDER BY bank_id
                    "#,
                )
                .bind(loan_type)
                .bind(currency)
                .fetch_all(&self.db_pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, RateCard>(
                    "SELECT * FROM rate_cards WHERE valid_to IS NULL ORDER BY bank_id",
                )
                .fetch_all(&self.db_pool)
                .await?
            }
        };

        Ok(cards)
    }

    async fn list_active_for_bank(&self, bank_id: Uuid) -> DomainResult<Vec<RateCard>> {
        let cards = sqlx::query_as::<_, RateCard>(
            r#"
            SELECT * FROM rate_cards
            WHERE bank_id = $1 AND valid_to IS NULL
            ORDER BY loan_type, currency
            "#,
        )
        .bind(bank_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(cards)
    }

    async fn history(&self, key: RateCardKey) -> DomainResult<Vec<RateCard>> {
        let cards = sqlx::query_as::<_, RateCard>(
            r#"
            SELECT * FROM rate_cards
            WHERE bank_id = $1 AND loan_type = $2 AND currency = $3
            ORDER BY valid_from ASC
            "#,
        )
        .bind(key.bank_id)
        .bind(key.loan_type)
        .bind(key.currency)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(cards)
    }
}

#[async_trait]
impl ApplicationRepository for PgStore {
    async fn find_application(&self, id: Uuid) -> DomainResult<Option<Application>> {
        let application =
            sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db_pool)
                .await?;

        Ok(application)
    }

    async fn update_application_status(
        &self,
        id: Uuid,
        expected: ApplicationStatus,
        target: ApplicationStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<Application> {
        let mut tx = self.db_pool.begin().await?;

        let current = lock_application(&mut tx, id).await?;
        if current.status != expected {
            return Err(DomainError::Conflict(format!(
                "application {} is {} (expected {})",
                id, current.status, expected
            )));
        }

        let application = set_application_status(&mut tx, id, target, now).await?;
        tx.commit().await?;

        Ok(application)
    }
}

#[async_trait]
impl OfferRepository for PgStore {
    async fn find_offer(&self, id: Uuid) -> DomainResult<Option<Offer>> {
        let offer = sqlx::query_as::<_, Offer>("SELECT * FROM offers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(offer)
    }

    async fn list_offers_for_application(&self, application_id: Uuid) -> DomainResult<Vec<Offer>> {
        let offers = sqlx::query_as::<_, Offer>(
            "SELECT * FROM offers WHERE application_id = $1 ORDER BY created_at ASC",
        )
        .bind(application_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(offers)
    }

    async fn insert_offer(&self, offer: Offer) -> DomainResult<Offer> {
        let mut tx = self.db_pool.begin().await?;
        let inserted = insert_offer_row(&mut tx, &offer).await?;
        tx.commit().await?;

        Ok(inserted)
    }

    async fn update_offer_status(
        &self,
        id: Uuid,
        expected: OfferStatus,
        target: OfferStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<Offer> {
        let mut tx = self.db_pool.begin().await?;
        lock_offer(&mut tx, id, expected).await?;
        let offer = set_offer_status(&mut tx, id, target, now).await?;
        tx.commit().await?;

        Ok(offer)
    }

    async fn supersede_offers(
        &self,
        superseded: Vec<(Uuid, OfferStatus)>,
        replacement: Offer,
        now: DateTime<Utc>,
    ) -> DomainResult<Offer> {
        let mut tx = self.db_pool.begin().await?;

        for (id, expected) in &superseded {
            lock_offer(&mut tx, *id, *expected).await?;
            set_offer_status(&mut tx, *id, OfferStatus::Expired, now).await?;
        }

        let inserted = insert_offer_row(&mut tx, &replacement).await?;
        tx.commit().await?;

        Ok(inserted)
    }

    async fn apply_selection(
        &self,
        plan: SelectionPlan,
        now: DateTime<Utc>,
    ) -> DomainResult<SelectionOutcome> {
        let mut tx = self.db_pool.begin().await?;

        let application = lock_application(&mut tx, plan.application_id).await?;
        if application.status != plan.expected_application_status {
            return Err(DomainError::Conflict(format!(
                "application {} is {} (expected {})",
                application.id, application.status, plan.expected_application_status
            )));
        }
        lock_offer(&mut tx, plan.offer_id, plan.expected_offer_status).await?;

        let deselected = match plan.deselect_offer_id {
            Some(previous) => {
                lock_offer(&mut tx, previous, OfferStatus::Accepted).await?;
                let offer = sqlx::query_as::<_, Offer>(
                    r#"
                    UPDATE offers
                    SET status = $1, borrower_selected_at = NULL, updated_at = $2
                    WHERE id = $3
                    RETURNING *
                    "#,
                )
                .bind(OfferStatus::Calculated)
                .bind(now)
                .bind(previous)
                .fetch_one(&mut *tx)
                .await?;
                Some(offer)
            }
            None => None,
        };

        let selected = sqlx::query_as::<_, Offer>(
            r#"
            UPDATE offers
            SET status = $1, borrower_selected_at = $2, updated_at = $2
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(OfferStatus::Accepted)
        .bind(now)
        .bind(plan.offer_id)
        .fetch_one(&mut *tx)
        .await?;

        let application =
            set_application_status(&mut tx, plan.application_id, ApplicationStatus::Accepted, now)
                .await?;

        tx.commit().await?;

        Ok(SelectionOutcome {
            application,
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
        let mut tx = self.db_pool.begin().await?;

        let locked = lock_offer(&mut tx, id, expected).await?;
        let offer = set_offer_status(&mut tx, id, target, now).await?;

        let mut application_reverted = false;
        if expected == OfferStatus::Accepted {
            let application = lock_application(&mut tx, locked.application_id).await?;
            if application.status == ApplicationStatus::Accepted {
                set_application_status(
                    &mut tx,
                    application.id,
                    ApplicationStatus::Submitted,
                    now,
                )
                .await?;
                application_reverted = true;
            }
        }

        tx.commit().await?;

        Ok(ExpiredOffer {
            offer,
            previous_status: expected,
            application_reverted,
        })
    }

    async fn find_due_offers(&self, now: DateTime<Utc>) -> DomainResult<Vec<Offer>> {
        let offers = sqlx::query_as::<_, Offer>(
            r#"
            SELECT * FROM offers
            WHERE expires_at < $1 AND status = ANY($2)
            ORDER BY expires_at ASC
            "#,
        )
        .bind(now)
        .bind(LIVE_OFFER_STATUSES)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(offers)
    }

    async fn find_offers_expiring_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<Offer>> {
        let offers = sqlx::query_as::<_, Offer>(
            r#"
            SELECT * FROM offers
            WHERE expires_at >= $1 AND expires_at < $2
              AND status = ANY($3) AND notified = FALSE
            ORDER BY expires_at ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(LIVE_OFFER_STATUSES)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(offers)
    }

    async fn mark_notified(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("UPDATE offers SET notified = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.db_pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("Offer", id));
        }
        Ok(())
    }
}

#[async_trait]
impl BankDirectory for PgStore {
    async fn list_active_banks(&self) -> DomainResult<Vec<Bank>> {
        let banks = sqlx::query_as::<_, Bank>(
            "SELECT id, name, active FROM banks WHERE active = TRUE ORDER BY name",
        )
        .fetch_all(&self.db_pool)
        .await?;

        Ok(banks)
    }
}
