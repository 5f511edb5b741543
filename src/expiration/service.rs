//! Offer expiration sweep
//!
//! Moves every expirable offer past its `expires_at` into its expired status
//! and reverts applications whose accepted offer expired. Only one sweep runs
//! at a time; per-offer failures are logged and counted without aborting the
//! run.

use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::application::ApplicationStatus;
use crate::audit::{self, AuditAction, AuditEntry, AuditSink};
use crate::error::{DomainError, DomainResult};
use crate::lifecycle;
use crate::notification::{self, NotificationSink, NotificationType};
use crate::offer::{ExpiredOffer, Offer, OfferStatus};
use crate::store::OfferRepository;

/// Counters for one sweep
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ExpirationRunReport {
    pub scanned: usize,
    pub expired: usize,
    pub failed: usize,
    pub applications_reverted: usize,
    pub duration_ms: u64,
    /// Set when another sweep held the run lock and this one did nothing
    pub skipped_overlap: bool,
}

#[derive(Clone)]
pub struct OfferExpirationService {
    offers: Arc<dyn OfferRepository>,
    audit: Arc<dyn AuditSink>,
    notifications: Arc<dyn NotificationSink>,
    concurrency: usize,
    run_lock: Arc<Mutex<()>>,
}

impl OfferExpirationService {
    pub fn new(
        offers: Arc<dyn OfferRepository>,
        audit: Arc<dyn AuditSink>,
        notifications: Arc<dyn NotificationSink>,
        concurrency: usize,
    ) -> Self {
        Self {
            offers,
            audit,
            notifications,
            concurrency: concurrency.max(1),
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Sweep offers that are due as of now
    pub async fn run(&self) -> DomainResult<ExpirationRunReport> {
        self.run_at(Utc::now()).await
    }

    /// Sweep offers with `expires_at < now`
    pub async fn run_at(&self, now: DateTime<Utc>) -> DomainResult<ExpirationRunReport> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            tracing::warn!("Offer expiration run already in progress, skipping");
            return Ok(ExpirationRunReport {
                skipped_overlap: true,
                ..Default::default()
            });
        };

        let started = Instant::now();
        let due = self.offers.find_due_offers(now).await?;
        tracing::info!(due = due.len(), "Starting offer expiration run");

        let results: Vec<(Uuid, DomainResult<ExpiredOffer>)> = stream::iter(due)
            .map(|offer| async move {
                let offer_id = offer.id;
                (offer_id, self.expire(offer, now).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = ExpirationRunReport {
            scanned: results.len(),
            ..Default::default()
        };
        for (offer_id, result) in results {
            match result {
                Ok(expired) => {
                    report.expired += 1;
                    if expired.application_reverted {
                        report.applications_reverted += 1;
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(offer_id = %offer_id, error = %e, "Failed to expire offer");
                }
            }
        }
        report.duration_ms = super::elapsed_ms(started.elapsed());

        tracing::info!(
            expired_count = report.expired,
            failed_count = report.failed,
            applications_reverted = report.applications_reverted,
            duration_ms = report.duration_ms,
            "Completed offer expiration run"
        );

        Ok(report)
    }

    /// Operator-triggered expiration of a single offer, regardless of its expiry time
    pub async fn expire_offer(&self, offer_id: Uuid) -> DomainResult<ExpiredOffer> {
        let offer = self
            .offers
            .find_offer(offer_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Offer", offer_id))?;

        let expired = self.expire(offer, Utc::now()).await?;
        tracing::info!(
            offer_id = %offer_id,
            status = %expired.offer.status,
            application_reverted = expired.application_reverted,
            "Offer expired manually"
        );
        Ok(expired)
    }

    async fn expire(&self, offer: Offer, now: DateTime<Utc>) -> DomainResult<ExpiredOffer> {
        let target = offer
            .status
            .expiry_target()
            .ok_or_else(|| DomainError::invalid_transition(offer.status, OfferStatus::Expired))?;
        lifecycle::require_transition(offer.status, target)?;

        let expired = self
            .offers
            .expire_offer(offer.id, offer.status, target, now)
            .await?;

        audit::record(
            self.audit.as_ref(),
            AuditEntry::new("Offer", offer.id, AuditAction::OfferExpired)
                .with_old(json!({ "status": offer.status, "expires_at": offer.expires_at }))
                .with_new(json!({ "status": target })),
        )
        .await;

        if expired.application_reverted {
            tracing::info!(
                offer_id = %offer.id,
                application_id = %offer.application_id,
                "Accepted offer expired, application reverted to SUBMITTED"
            );
            audit::record(
                self.audit.as_ref(),
                AuditEntry::new(
                    "Application",
                    offer.application_id,
                    AuditAction::ApplicationAutoReverted,
                )
                .with_old(json!({ "status": ApplicationStatus::Accepted }))
                .with_new(json!({
                    "status": ApplicationStatus::Submitted,
                    "expired_offer_id": offer.id,
                })),
            )
            .await;
        }

        notification::send(
            self.notifications.as_ref(),
            offer.bank_id,
            NotificationType::OfferExpired,
            "Your offer expired",
            format!(
                "Offer {} for application {} expired at {}.",
                offer.id, offer.application_id, offer.expires_at
            ),
        )
        .await;

        Ok(expired)
    }
}
