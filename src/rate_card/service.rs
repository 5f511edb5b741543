//! Rate card service layer

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::{Currency, LoanType, RateCard, RateCardKey, RateCardTerms};
use crate::audit::{self, AuditAction, AuditEntry, AuditSink};
use crate::error::DomainResult;
use crate::store::{RateCardReplacement, RateCardRepository};

/// Service for reading and versioning bank rate cards
#[derive(Clone)]
pub struct RateCardService {
    store: Arc<dyn RateCardRepository>,
    audit: Arc<dyn AuditSink>,
}

impl RateCardService {
    pub fn new(store: Arc<dyn RateCardRepository>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// The version currently in effect for a bank, loan type and currency
    pub async fn get_active(
        &self,
        bank_id: Uuid,
        loan_type: LoanType,
        currency: Currency,
    ) -> DomainResult<Option<RateCard>> {
        self.store
            .find_active(RateCardKey {
                bank_id,
                loan_type,
                currency,
            })
            .await
    }

    /// Validate `terms`, then close the active version and insert the new one
    /// as a single unit of work
    pub async fn upsert(
        &self,
        bank_id: Uuid,
        loan_type: LoanType,
        currency: Currency,
        terms: RateCardTerms,
    ) -> DomainResult<RateCard> {
        terms.validate()?;

        let key = RateCardKey {
            bank_id,
            loan_type,
            currency,
        };
        let RateCardReplacement {
            active: card,
            closed,
        } = self
            .store
            .replace_active(RateCard::new_version(key, &terms, Utc::now()))
            .await?;

        tracing::info!(
            bank_id = %bank_id,
            loan_type = %loan_type,
            currency = %currency,
            rate_card_id = %card.id,
            replaced = ?closed.as_ref().map(|c| c.id),
            "Rate card version activated"
        );

        let entry = match &closed {
            Some(previous) => AuditEntry::new("RateCard", card.id, AuditAction::RateCardUpdated)
                .with_old(audit::snapshot(previous)),
            None => AuditEntry::new("RateCard", card.id, AuditAction::RateCardCreated),
        };
        audit::record(self.audit.as_ref(), entry.with_new(audit::snapshot(&card))).await;

        Ok(card)
    }

    /// Every active card in one market
    pub async fn get_all_active_for_market(
        &self,
        loan_type: LoanType,
        currency: Currency,
    ) -> DomainResult<Vec<RateCard>> {
        self.store.list_active(Some((loan_type, currency))).await
    }

    /// Every active card across all markets
    pub async fn get_all_active(&self) -> DomainResult<Vec<RateCard>> {
        self.store.list_active(None).await
    }

    pub async fn get_active_for_bank(&self, bank_id: Uuid) -> DomainResult<Vec<RateCard>> {
        self.store.list_active_for_bank(bank_id).await
    }

    /// All versions for a key, oldest first
    pub async fn history(
        &self,
        bank_id: Uuid,
        loan_type: LoanType,
        currency: Currency,
    ) -> DomainResult<Vec<RateCard>> {
        self.store
            .history(RateCardKey {
                bank_id,
                loan_type,
                currency,
            })
            .await
    }
}
