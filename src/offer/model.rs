//! Offer models

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use crate::amortization::AmortizationResult;

/// Lowest APR a bank may submit by hand
pub const MIN_SUBMITTED_APR: Decimal = dec!(0.5);
/// Highest APR a bank may submit by hand
pub const MAX_SUBMITTED_APR: Decimal = dec!(50);

/// Offer status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "offer_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Calculated,
    Submitted,
    Accepted,
    Rejected,
    Withdrawn,
    Expired,
    ExpiredWithSelection,
}

impl OfferStatus {
    pub const ALL: [OfferStatus; 7] = [
        OfferStatus::Calculated,
        OfferStatus::Submitted,
        OfferStatus::Accepted,
        OfferStatus::Rejected,
        OfferStatus::Withdrawn,
        OfferStatus::Expired,
        OfferStatus::ExpiredWithSelection,
    ];

    /// Statuses the expiration sweep picks up
    pub const EXPIRABLE: [OfferStatus; 3] = [
        OfferStatus::Calculated,
        OfferStatus::Submitted,
        OfferStatus::Accepted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Calculated => "CALCULATED",
            OfferStatus::Submitted => "SUBMITTED",
            OfferStatus::Accepted => "ACCEPTED",
            OfferStatus::Rejected => "REJECTED",
            OfferStatus::Withdrawn => "WITHDRAWN",
            OfferStatus::Expired => "EXPIRED",
            OfferStatus::ExpiredWithSelection => "EXPIRED_WITH_SELECTION",
        }
    }

    pub fn is_expirable(&self) -> bool {
        Self::EXPIRABLE.contains(self)
    }

    /// A live offer is one a borrower can still act on
    pub fn is_live(&self) -> bool {
        self.is_expirable()
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_live()
    }

    /// Terminal status an expirable offer moves to once past its expiry.
    /// Returns `None` for statuses the sweep must not touch.
    pub fn expiry_target(&self) -> Option<OfferStatus> {
        match self {
            OfferStatus::Accepted | OfferStatus::Submitted => {
                Some(OfferStatus::ExpiredWithSelection)
            }
            OfferStatus::Calculated => Some(OfferStatus::Expired),
            _ => None,
        }
    }
}

impl sqlx::postgres::PgHasArrayType for OfferStatus {
    fn array_type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("_offer_status")
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One bank's priced proposal for one application
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Offer {
    pub id: Uuid,
    pub application_id: Uuid,
    pub bank_id: Uuid,
    pub status: OfferStatus,
    pub apr: Decimal,
    pub monthly_payment: Decimal,
    pub total_cost: Decimal,
    pub origination_fee: Decimal,
    pub insurance_cost: Decimal,
    pub processing_time_days: i32,
    pub validity_period_days: i32,
    pub expires_at: DateTime<Utc>,
    pub notified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub offer_submitted_at: Option<DateTime<Utc>>,
    pub borrower_selected_at: Option<DateTime<Utc>>,
}

/// Fields shared by every newly created offer
#[derive(Debug, Clone)]
pub struct NewOffer {
    pub application_id: Uuid,
    pub bank_id: Uuid,
    pub status: OfferStatus,
    pub pricing: AmortizationResult,
    pub processing_time_days: i32,
    pub validity_period_days: i32,
    pub expires_at: DateTime<Utc>,
}

impl NewOffer {
    pub fn into_offer(self, now: DateTime<Utc>) -> Offer {
        let offer_submitted_at = match self.status {
            OfferStatus::Submitted => Some(now),
            _ => None,
        };

        Offer {
            id: Uuid::new_v4(),
            application_id: self.application_id,
            bank_id: self.bank_id,
            status: self.status,
            apr: self.pricing.final_apr,
            monthly_payment: self.pricing.monthly_payment,
            total_cost: self.pricing.total_cost,
            origination_fee: self.pricing.origination_fee,
            insurance_cost: self.pricing.insurance_cost,
            processing_time_days: self.processing_time_days,
            validity_period_days: self.validity_period_days,
            expires_at: self.expires_at,
            notified: false,
            created_at: now,
            updated_at: now,
            offer_submitted_at,
            borrower_selected_at: None,
        }
    }
}

/// Result of an offer status change that may have reconciled the parent application
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpiredOffer {
    pub offer: Offer,
    pub previous_status: OfferStatus,
    pub application_reverted: bool,
}

/// Bank submission of a hand-priced offer
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitOfferRequest {
    pub application_id: Uuid,
    pub apr: Decimal,
    #[validate(range(min = 0, max = 365))]
    pub processing_time_days: Option<i32>,
    #[validate(range(min = 1, max = 90))]
    pub validity_period_days: Option<i32>,
}

/// Bank resubmission of an existing offer with updated terms
#[derive(Debug, Deserialize, Validate)]
pub struct ResubmitOfferRequest {
    pub apr: Decimal,
    pub origination_fee: Option<Decimal>,
    #[validate(range(min = 0, max = 365))]
    pub processing_time_days: Option<i32>,
    #[validate(range(min = 1, max = 90))]
    pub validity_period_days: Option<i32>,
}

/// Borrower offer selection
#[derive(Debug, Deserialize)]
pub struct SelectOfferRequest {
    pub borrower_id: Uuid,
}

/// Response for the calculation fan-out
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CalculateOffersResponse {
    pub application_id: Uuid,
    pub offer_ids: Vec<Uuid>,
    pub outcomes: Vec<BankCalculationOutcome>,
}

/// What happened for one bank during a calculation fan-out
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BankCalculationOutcome {
    Created { bank_id: Uuid, offer_id: Uuid },
    Skipped { bank_id: Uuid, reason: String },
    Failed { bank_id: Uuid, error: String },
}

impl BankCalculationOutcome {
    pub fn bank_id(&self) -> Uuid {
        match self {
            BankCalculationOutcome::Created { bank_id, .. }
            | BankCalculationOutcome::Skipped { bank_id, .. }
            | BankCalculationOutcome::Failed { bank_id, .. } => *bank_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_targets() {
        assert_eq!(
            OfferStatus::Accepted.expiry_target(),
            Some(OfferStatus::ExpiredWithSelection)
        );
        assert_eq!(
            OfferStatus::Submitted.expiry_target(),
            Some(OfferStatus::ExpiredWithSelection)
        );
        assert_eq!(
            OfferStatus::Calculated.expiry_target(),
            Some(OfferStatus::Expired)
        );
        for status in [
            OfferStatus::Rejected,
            OfferStatus::Withdrawn,
            OfferStatus::Expired,
            OfferStatus::ExpiredWithSelection,
        ] {
            assert_eq!(status.expiry_target(), None);
            assert!(!status.is_expirable());
        }
    }

    #[test]
    fn test_submitted_offer_records_submission_time() {
        let now = Utc::now();
        let new_offer = NewOffer {
            application_id: Uuid::new_v4(),
            bank_id: Uuid::new_v4(),
            status: OfferStatus::Submitted,
            pricing: AmortizationResult {
                final_apr: dec!(5.5),
                monthly_payment: dec!(100),
                total_cost: dec!(200),
                origination_fee: dec!(10),
                insurance_cost: Decimal::ZERO,
            },
            processing_time_days: 5,
            validity_period_days: 1,
            expires_at: now,
        };

        let offer = new_offer.into_offer(now);
        assert_eq!(offer.offer_submitted_at, Some(now));
        assert_eq!(offer.apr, dec!(5.5));
        assert!(!offer.notified);
    }

    #[test]
    fn test_outcome_wire_shape() {
        let bank_id = Uuid::nil();
        let json = serde_json::to_value(BankCalculationOutcome::Skipped {
            bank_id,
            reason: "no active rate card".to_string(),
        })
        .unwrap();
        assert_eq!(json["outcome"], "SKIPPED");
    }
}
