//! Background driver for the expiration jobs

use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use super::{ExpirationWarningService, OfferExpirationService};

/// Cron expressions (with a seconds field) for the background jobs
#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    pub expiration_cron: String,
    pub warning_cron: String,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            expiration_cron: "0 */5 * * * *".to_string(),
            warning_cron: "0 0 * * * *".to_string(),
        }
    }
}

/// Owns the cron scheduler running the expiration sweep and the warning scan
pub struct ExpirationScheduler {
    scheduler: JobScheduler,
}

impl ExpirationScheduler {
    pub async fn start(
        expiration: Arc<OfferExpirationService>,
        warnings: Arc<ExpirationWarningService>,
        settings: &ScheduleSettings,
    ) -> Result<Self, JobSchedulerError> {
        let scheduler = JobScheduler::new().await?;

        let sweep = Job::new_async(settings.expiration_cron.as_str(), move |_id, _scheduler| {
            let expiration = expiration.clone();
            Box::pin(async move {
                if let Err(e) = expiration.run().await {
                    tracing::error!(error = %e, "Offer expiration run failed");
                }
            })
        })?;
        scheduler.add(sweep).await?;

        let warn = Job::new_async(settings.warning_cron.as_str(), move |_id, _scheduler| {
            let warnings = warnings.clone();
            Box::pin(async move {
                if let Err(e) = warnings.run().await {
                    tracing::error!(error = %e, "Expiry warning run failed");
                }
            })
        })?;
        scheduler.add(warn).await?;

        scheduler.start().await?;
        tracing::info!(
            expiration_cron = %settings.expiration_cron,
            warning_cron = %settings.warning_cron,
            "Expiration scheduler started"
        );

        Ok(Self { scheduler })
    }

    pub async fn shutdown(mut self) {
        if let Err(e) = self.scheduler.shutdown().await {
            tracing::error!(error = %e, "Failed to stop expiration scheduler");
        }
    }
}
