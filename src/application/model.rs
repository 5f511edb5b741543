//! Application models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use crate::rate_card::{Currency, LoanType};

/// Application status, in progression order
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "application_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    UnderReview,
    OffersAvailable,
    Accepted,
    Completed,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 7] = [
        ApplicationStatus::Draft,
        ApplicationStatus::Submitted,
        ApplicationStatus::UnderReview,
        ApplicationStatus::OffersAvailable,
        ApplicationStatus::Accepted,
        ApplicationStatus::Completed,
        ApplicationStatus::Rejected,
    ];

    /// The happy-path progression used for the progress indicator
    pub const PROGRESSION: [ApplicationStatus; 6] = [
        ApplicationStatus::Draft,
        ApplicationStatus::Submitted,
        ApplicationStatus::UnderReview,
        ApplicationStatus::OffersAvailable,
        ApplicationStatus::Accepted,
        ApplicationStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "DRAFT",
            ApplicationStatus::Submitted => "SUBMITTED",
            ApplicationStatus::UnderReview => "UNDER_REVIEW",
            ApplicationStatus::OffersAvailable => "OFFERS_AVAILABLE",
            ApplicationStatus::Accepted => "ACCEPTED",
            ApplicationStatus::Completed => "COMPLETED",
            ApplicationStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Completed | ApplicationStatus::Rejected
        )
    }

    /// Completion percentage along the progression. Off-path states sit at 50.
    pub fn progress_percent(&self) -> u8 {
        match Self::PROGRESSION.iter().position(|s| s == self) {
            Some(index) => ((index + 1) * 100 / Self::PROGRESSION.len()) as u8,
            None => 50,
        }
    }

    /// True while the bank may still decline without offers having been issued
    pub fn is_before_offers(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Draft
                | ApplicationStatus::Submitted
                | ApplicationStatus::UnderReview
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A borrower's loan request
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Application {
    pub id: Uuid,
    pub borrower_id: Uuid,
    pub loan_type: LoanType,
    pub currency: Currency,
    pub principal: Decimal,
    pub term_months: i32,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Borrower-facing status summary
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ApplicationStatusView {
    pub application_id: Uuid,
    pub status: ApplicationStatus,
    pub progress_percent: u8,
    pub submitted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Application> for ApplicationStatusView {
    fn from(application: &Application) -> Self {
        Self {
            application_id: application.id,
            status: application.status,
            progress_percent: application.status.progress_percent(),
            submitted_at: application.submitted_at,
            updated_at: application.updated_at,
        }
    }
}

/// Bank-side status update request
#[derive(Debug, Deserialize)]
pub struct UpdateApplicationStatusRequest {
    pub status: ApplicationStatus,
}

/// Bank-side decline request
#[derive(Debug, Deserialize, Validate)]
pub struct DeclineApplicationRequest {
    #[validate(length(max = 500, message = "Decline reason cannot exceed 500 characters"))]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_follows_progression() {
        assert_eq!(ApplicationStatus::Draft.progress_percent(), 16);
        assert_eq!(ApplicationStatus::Submitted.progress_percent(), 33);
        assert_eq!(ApplicationStatus::UnderReview.progress_percent(), 50);
        assert_eq!(ApplicationStatus::OffersAvailable.progress_percent(), 66);
        assert_eq!(ApplicationStatus::Accepted.progress_percent(), 83);
        assert_eq!(ApplicationStatus::Completed.progress_percent(), 100);
        assert_eq!(ApplicationStatus::Rejected.progress_percent(), 50);
    }

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<_> = ApplicationStatus::ALL
            .iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(
            terminal,
            vec![&ApplicationStatus::Completed, &ApplicationStatus::Rejected]
        );
    }

    #[test]
    fn test_decline_reason_length() {
        let ok = DeclineApplicationRequest {
            reason: Some("x".repeat(500)),
        };
        assert!(ok.validate().is_ok());

        let too_long = DeclineApplicationRequest {
            reason: Some("x".repeat(501)),
        };
        assert!(too_long.validate().is_err());

        let none = DeclineApplicationRequest { reason: None };
        assert!(none.validate().is_ok());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_string(&ApplicationStatus::OffersAvailable).unwrap(),
            "\"OFFERS_AVAILABLE\""
        );
        assert_eq!(ApplicationStatus::UnderReview.to_string(), "UNDER_REVIEW");
    }
}
