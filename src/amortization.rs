//! Amortization engine
//!
//! Pure, deterministic pricing of a loan from principal, term and rate card
//! terms. Money is rounded half-up to 2 decimal places; rate intermediates are
//! rounded half-up to 6 decimal places.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Terms longer than this absorb half of the APR adjustment range
pub const LONG_TERM_THRESHOLD_MONTHS: u32 = 120;

const MONEY_SCALE: u32 = 2;
const RATE_SCALE: u32 = 6;
const APR_SCALE: u32 = 4;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;
const TWELVE: Decimal = Decimal::from_parts(12, 0, 0, false, 0);
const TWO: Decimal = Decimal::TWO;

/// Inputs for one offer calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationInput {
    pub principal: Decimal,
    pub term_months: u32,
    pub base_apr: Decimal,
    pub apr_adjustment_range: Decimal,
    pub origination_fee_percent: Decimal,
    pub insurance_percent: Decimal,
}

/// Priced result, suitable for display to borrowers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmortizationResult {
    pub final_apr: Decimal,
    pub monthly_payment: Decimal,
    pub total_cost: Decimal,
    pub origination_fee: Decimal,
    pub insurance_cost: Decimal,
}

fn round_half_up(value: Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

/// APR after the long-term risk premium
pub fn final_apr(term_months: u32, base_apr: Decimal, apr_adjustment_range: Decimal) -> Decimal {
    if term_months > LONG_TERM_THRESHOLD_MONTHS {
        base_apr + round_half_up(apr_adjustment_range / TWO, APR_SCALE)
    } else {
        base_apr
    }
}

/// Monthly periodic rate derived from an annual percentage rate
pub fn monthly_rate(apr: Decimal) -> Decimal {
    let annual = round_half_up(apr / HUNDRED, RATE_SCALE);
    round_half_up(annual / TWELVE, RATE_SCALE)
}

fn overflow() -> DomainError {
    DomainError::validation("term_months", "rate compounding overflowed")
}

fn pow(base: Decimal, mut exp: u32) -> DomainResult<Decimal> {
    let mut result = Decimal::ONE;
    let mut factor = base;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result.checked_mul(factor).ok_or_else(overflow)?;
        }
        exp >>= 1;
        if exp > 0 {
            factor = factor.checked_mul(factor).ok_or_else(overflow)?;
        }
    }
    Ok(result)
}

/// Level monthly payment for an amortized loan at the given APR
pub fn monthly_payment(principal: Decimal, term_months: u32, apr: Decimal) -> DomainResult<Decimal> {
    if term_months == 0 {
        return Err(DomainError::validation(
            "term_months",
            "must be greater than zero",
        ));
    }

    let rate = monthly_rate(apr);
    let months = Decimal::from(term_months);

    if rate.is_zero() {
        return Ok(round_half_up(principal / months, MONEY_SCALE));
    }

    // M = P * r * (1 + r)^n / ((1 + r)^n - 1)
    let compounded = pow(Decimal::ONE + rate, term_months)?;
    let numerator = principal
        .checked_mul(rate)
        .and_then(|v| v.checked_mul(compounded))
        .ok_or_else(overflow)?;
    let denominator = compounded - Decimal::ONE;
    let payment = numerator.checked_div(denominator).ok_or_else(overflow)?;

    Ok(round_half_up(payment, MONEY_SCALE))
}

/// Price a loan. Identical inputs always yield identical outputs.
pub fn calculate(input: &AmortizationInput) -> DomainResult<AmortizationResult> {
    if input.principal <= Decimal::ZERO {
        return Err(DomainError::validation(
            "principal",
            "must be greater than zero",
        ));
    }

    let final_apr = final_apr(
        input.term_months,
        input.base_apr,
        input.apr_adjustment_range,
    );
    let monthly_payment = monthly_payment(input.principal, input.term_months, final_apr)?;

    let total_paid = monthly_payment
        .checked_mul(Decimal::from(input.term_months))
        .ok_or_else(overflow)?;
    let total_cost = round_half_up(total_paid - input.principal, MONEY_SCALE);

    let origination_fee = round_half_up(
        input.principal * input.origination_fee_percent / HUNDRED,
        MONEY_SCALE,
    );

    let insurance_cost = if input.insurance_percent > Decimal::ZERO {
        round_half_up(
            input.principal * input.insurance_percent / HUNDRED,
            MONEY_SCALE,
        )
    } else {
        Decimal::ZERO
    };

    Ok(AmortizationResult {
        final_apr,
        monthly_payment,
        total_cost,
        origination_fee,
        insurance_cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn input(principal: Decimal, term_months: u32) -> AmortizationInput {
        AmortizationInput {
            principal,
            term_months,
            base_apr: dec!(7.9),
            apr_adjustment_range: dec!(2.0),
            origination_fee_percent: dec!(2.0),
            insurance_percent: dec!(0.25),
        }
    }

    #[test]
    fn test_adjustment_only_above_threshold() {
        assert_eq!(final_apr(120, dec!(7.9), dec!(2.0)), dec!(7.9));
        assert_eq!(final_apr(121, dec!(7.9), dec!(2.0)), dec!(8.9));
        assert_eq!(final_apr(360, dec!(5.25), dec!(0.75)), dec!(5.625));
    }

    #[test]
    fn test_monthly_rate_rounds_to_six_places() {
        assert_eq!(monthly_rate(dec!(6.5)), dec!(0.005417));
        assert_eq!(monthly_rate(dec!(12)), dec!(0.01));
    }

    #[test]
    fn test_short_term_pricing() {
        let result = calculate(&input(dec!(10000), 36)).unwrap();
        assert_eq!(result.final_apr, dec!(7.9));
        assert_eq!(result.monthly_payment, dec!(312.90));
        assert_eq!(result.total_cost, dec!(1264.40));
        assert_eq!(result.origination_fee, dec!(200.00));
        assert_eq!(result.insurance_cost, dec!(25.00));
    }

    #[test]
    fn test_threshold_boundary_pricing() {
        let at = calculate(&input(dec!(10000), 120)).unwrap();
        assert_eq!(at.monthly_payment, dec!(120.80));

        let above = calculate(&input(dec!(10000), 121)).unwrap();
        assert_eq!(above.final_apr, dec!(8.9));
        assert_eq!(above.monthly_payment, dec!(125.49));
        assert_eq!(above.total_cost, dec!(5184.29));
    }

    #[test]
    fn test_zero_insurance_yields_zero_cost() {
        let mut i = input(dec!(15000), 60);
        i.base_apr = dec!(12);
        i.apr_adjustment_range = Decimal::ZERO;
        i.origination_fee_percent = Decimal::ZERO;
        i.insurance_percent = Decimal::ZERO;

        let result = calculate(&i).unwrap();
        assert_eq!(result.monthly_payment, dec!(333.67));
        assert_eq!(result.insurance_cost, Decimal::ZERO);
        assert_eq!(result.origination_fee, Decimal::ZERO);
    }

    #[test]
    fn test_zero_apr_is_straight_line() {
        let mut i = input(dec!(1200), 12);
        i.base_apr = Decimal::ZERO;
        let result = calculate(&i).unwrap();
        assert_eq!(result.monthly_payment, dec!(100.00));
        assert_eq!(result.total_cost, Decimal::ZERO);
    }

    #[test]
    fn test_thirty_year_mortgage_matches_annuity_formula() {
        let mortgage = AmortizationInput {
            principal: dec!(200000),
            term_months: 360,
            base_apr: dec!(6.5),
            apr_adjustment_range: dec!(1.0),
            origination_fee_percent: dec!(1.5),
            insurance_percent: dec!(0.5),
        };
        let result = calculate(&mortgage).unwrap();

        assert_eq!(result.final_apr, dec!(7.0));
        assert_eq!(monthly_rate(result.final_apr), dec!(0.005833));

        // Closed form: P * r / (1 - (1 + r)^-n)
        let r = 0.005833_f64;
        let annuity = 200000.0 * r / (1.0 - (1.0 + r).powi(-360));
        let annuity = (annuity * 100.0).round() / 100.0;
        assert_eq!(result.monthly_payment.to_string(), format!("{:.2}", annuity));

        assert_eq!(result.monthly_payment, dec!(1330.55));
        assert_eq!(result.total_cost, dec!(278998.00));
        assert_eq!(result.origination_fee, dec!(3000.00));
        assert_eq!(result.insurance_cost, dec!(1000.00));
    }

    #[test]
    fn test_identical_inputs_price_identically() {
        for (principal, term) in [(dec!(10000), 36), (dec!(250000), 300), (dec!(4321.09), 121)] {
            let i = input(principal, term);
            assert_eq!(calculate(&i).unwrap(), calculate(&i.clone()).unwrap());
        }
    }

    #[test]
    fn test_overflowing_term_is_a_validation_error() {
        let mut i = input(dec!(10000), 1500);
        i.base_apr = dec!(50);
        i.apr_adjustment_range = Decimal::ZERO;

        match calculate(&i) {
            Err(DomainError::Validation { field, .. }) => assert_eq!(field, "term_months"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_degenerate_inputs() {
        assert!(calculate(&input(Decimal::ZERO, 36)).is_err());
        assert!(calculate(&input(dec!(1000), 0)).is_err());
    }
}
