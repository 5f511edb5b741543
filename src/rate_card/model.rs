//! Rate card models: versioned per-bank pricing terms

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Loan product type
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[sqlx(type_name = "loan_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanType {
    Personal,
    Mortgage,
    Auto,
    Business,
}

/// Loan currency
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[sqlx(type_name = "currency_code", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Eur,
    Usd,
    Gbp,
}

impl fmt::Display for LoanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoanType::Personal => "PERSONAL",
            LoanType::Mortgage => "MORTGAGE",
            LoanType::Auto => "AUTO",
            LoanType::Business => "BUSINESS",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
        };
        f.write_str(code)
    }
}

/// Identifies one versioned rate card series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RateCardKey {
    pub bank_id: Uuid,
    pub loan_type: LoanType,
    pub currency: Currency,
}

/// An immutable, time-boxed pricing version. `valid_to = None` marks the active row.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct RateCard {
    pub id: Uuid,
    pub bank_id: Uuid,
    pub loan_type: LoanType,
    pub currency: Currency,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub base_apr: Decimal,
    pub apr_adjustment_range: Decimal,
    pub origination_fee_percent: Decimal,
    pub insurance_percent: Decimal,
    pub processing_time_days: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
}

impl RateCard {
    pub fn key(&self) -> RateCardKey {
        RateCardKey {
            bank_id: self.bank_id,
            loan_type: self.loan_type,
            currency: self.currency,
        }
    }

    pub fn is_active(&self) -> bool {
        self.valid_to.is_none()
    }

    /// Build the new active version that replaces whatever is currently active for `key`
    pub fn new_version(key: RateCardKey, terms: &RateCardTerms, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            bank_id: key.bank_id,
            loan_type: key.loan_type,
            currency: key.currency,
            min_amount: terms.min_amount,
            max_amount: terms.max_amount,
            base_apr: terms.base_apr,
            apr_adjustment_range: terms.apr_adjustment_range,
            origination_fee_percent: terms.origination_fee_percent,
            insurance_percent: terms.insurance_percent,
            processing_time_days: terms.processing_time_days,
            valid_from: now,
            valid_to: None,
        }
    }
}

/// Pricing terms submitted by a bank
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RateCardTerms {
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub base_apr: Decimal,
    pub apr_adjustment_range: Decimal,
    pub origination_fee_percent: Decimal,
    #[serde(default)]
    pub insurance_percent: Decimal,
    #[serde(default = "default_processing_time_days")]
    pub processing_time_days: i32,
}

fn default_processing_time_days() -> i32 {
    5
}

impl RateCardTerms {
    /// Reject malformed terms before anything is written
    pub fn validate(&self) -> DomainResult<()> {
        if self.min_amount <= Decimal::ZERO {
            return Err(DomainError::validation(
                "min_amount",
                "must be greater than zero",
            ));
        }
        if self.max_amount <= Decimal::ZERO {
            return Err(DomainError::validation(
                "max_amount",
                "must be greater than zero",
            ));
        }
        if self.min_amount > self.max_amount {
            return Err(DomainError::validation(
                "min_amount",
                "cannot exceed max_amount",
            ));
        }
        if self.base_apr < Decimal::ZERO {
            return Err(DomainError::validation("base_apr", "cannot be negative"));
        }
        if self.apr_adjustment_range < Decimal::ZERO {
            return Err(DomainError::validation(
                "apr_adjustment_range",
                "cannot be negative",
            ));
        }
        if self.origination_fee_percent < Decimal::ZERO {
            return Err(DomainError::validation(
                "origination_fee_percent",
                "cannot be negative",
            ));
        }
        if self.insurance_percent < Decimal::ZERO {
            return Err(DomainError::validation(
                "insurance_percent",
                "cannot be negative",
            ));
        }
        if self.processing_time_days < 0 {
            return Err(DomainError::validation(
                "processing_time_days",
                "cannot be negative",
            ));
        }
        Ok(())
    }
}

/// Request DTO for submitting a rate card
#[derive(Debug, Deserialize)]
pub struct UpsertRateCardRequest {
    pub loan_type: LoanType,
    pub currency: Currency,
    #[serde(flatten)]
    pub terms: RateCardTerms,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn terms() -> RateCardTerms {
        RateCardTerms {
            min_amount: dec!(1000),
            max_amount: dec!(500000),
            base_apr: dec!(6.5),
            apr_adjustment_range: dec!(1.0),
            origination_fee_percent: dec!(1.5),
            insurance_percent: dec!(0.5),
            processing_time_days: 5,
        }
    }

    fn field_of(result: DomainResult<()>) -> String {
        match result {
            Err(DomainError::Validation { field, .. }) => field,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_terms_pass() {
        assert!(terms().validate().is_ok());
    }

    #[test]
    fn test_zero_apr_and_fees_are_allowed() {
        let mut t = terms();
        t.base_apr = Decimal::ZERO;
        t.apr_adjustment_range = Decimal::ZERO;
        t.origination_fee_percent = Decimal::ZERO;
        t.insurance_percent = Decimal::ZERO;
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_validation_names_offending_field() {
        let mut t = terms();
        t.min_amount = Decimal::ZERO;
        assert_eq!(field_of(t.validate()), "min_amount");

        let mut t = terms();
        t.max_amount = dec!(-1);
        assert_eq!(field_of(t.validate()), "max_amount");

        let mut t = terms();
        t.min_amount = dec!(600000);
        assert_eq!(field_of(t.validate()), "min_amount");

        let mut t = terms();
        t.base_apr = dec!(-0.01);
        assert_eq!(field_of(t.validate()), "base_apr");

        let mut t = terms();
        t.apr_adjustment_range = dec!(-1);
        assert_eq!(field_of(t.validate()), "apr_adjustment_range");

        let mut t = terms();
        t.origination_fee_percent = dec!(-1);
        assert_eq!(field_of(t.validate()), "origination_fee_percent");

        let mut t = terms();
        t.insurance_percent = dec!(-1);
        assert_eq!(field_of(t.validate()), "insurance_percent");
    }

    #[test]
    fn test_display_matches_wire_names() {
        assert_eq!(LoanType::Mortgage.to_string(), "MORTGAGE");
        assert_eq!(Currency::Eur.to_string(), "EUR");
        assert_eq!(
            serde_json::to_string(&LoanType::Personal).unwrap(),
            "\"PERSONAL\""
        );
    }
}
