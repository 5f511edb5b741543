//! Offer expiration domain module
//!
//! Contains the expiration sweep, the expiry warning scan and the cron driver
//! that runs both in the background.

mod scheduler;
mod service;
mod warning;

pub use scheduler::{ExpirationScheduler, ScheduleSettings};
pub use service::{ExpirationRunReport, OfferExpirationService};
pub use warning::{ExpirationWarningService, WarningRunReport};

/// Whole milliseconds in `elapsed`, saturating at `u64::MAX`
pub(crate) fn elapsed_ms(elapsed: std::time::Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
