//! Expiry warnings for banks whose offers are about to lapse

use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::error::DomainResult;
use crate::notification::{self, NotificationSink, NotificationType};
use crate::store::OfferRepository;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct WarningRunReport {
    pub notified: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

#[derive(Clone)]
pub struct ExpirationWarningService {
    offers: Arc<dyn OfferRepository>,
    notifications: Arc<dyn NotificationSink>,
    window: Duration,
}

impl ExpirationWarningService {
    pub fn new(
        offers: Arc<dyn OfferRepository>,
        notifications: Arc<dyn NotificationSink>,
        window_hours: i64,
    ) -> Self {
        Self {
            offers,
            notifications,
            window: Duration::hours(window_hours),
        }
    }

    /// Warn the owning bank once about every live offer expiring within the window
    pub async fn run(&self) -> DomainResult<WarningRunReport> {
        let started = Instant::now();
        let now = Utc::now();
        let expiring = self
            .offers
            .find_offers_expiring_between(now, now + self.window)
            .await?;

        let mut report = WarningRunReport::default();
        for offer in expiring {
            let hours_left = (offer.expires_at - now).num_hours();
            let sent = notification::send(
                self.notifications.as_ref(),
                offer.bank_id,
                NotificationType::OfferExpiring,
                "Your offer expires soon",
                format!(
                    "Offer {} for application {} expires in {} hours. Resubmit it to extend its validity.",
                    offer.id, offer.application_id, hours_left
                ),
            )
            .await;

            if !sent {
                report.failed += 1;
                continue;
            }

            match self.offers.mark_notified(offer.id).await {
                Ok(()) => report.notified += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(offer_id = %offer.id, error = %e, "Failed to mark offer notified");
                }
            }
        }
        report.duration_ms = super::elapsed_ms(started.elapsed());

        tracing::info!(
            notified = report.notified,
            failed = report.failed,
            duration_ms = report.duration_ms,
            "Completed expiry warning run"
        );

        Ok(report)
    }
}
