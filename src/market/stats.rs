//! Pure market statistics

use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashSet;

use super::{CompetitivePosition, MarketAverage};
use crate::rate_card::{Currency, LoanType, RateCard};

const STAT_SCALE: u32 = 2;

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(STAT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

fn mean(values: impl Iterator<Item = Decimal>, count: usize) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    round2(values.sum::<Decimal>() / Decimal::from(count))
}

/// Median of an ascending slice. Zero for an empty slice.
pub fn median(sorted: &[Decimal]) -> Decimal {
    let len = sorted.len();
    match len {
        0 => Decimal::ZERO,
        n if n % 2 == 1 => round2(sorted[n / 2]),
        n => round2((sorted[n / 2 - 1] + sorted[n / 2]) / Decimal::TWO),
    }
}

/// Half-up integer rounding of `numerator / denominator`
fn round_ratio(numerator: usize, denominator: usize) -> usize {
    (2 * numerator + denominator) / (2 * denominator)
}

/// Percentile of `my_apr` among `all_aprs`; lower APR ranks higher.
/// Cards tied with `my_apr` share its position.
pub fn calculate_percentile_ranking(my_apr: Decimal, all_aprs: &[Decimal]) -> u8 {
    let total = all_aprs.len();
    if total == 0 {
        return 0;
    }
    let position = 1 + all_aprs.iter().filter(|apr| **apr < my_apr).count();
    round_ratio((total - position + 1) * 100, total) as u8
}

pub fn determine_competitive_position(percentile: u8) -> CompetitivePosition {
    if percentile >= 75 {
        CompetitivePosition::MoreCompetitive
    } else if percentile >= 25 {
        CompetitivePosition::Average
    } else {
        CompetitivePosition::LessCompetitive
    }
}

/// Rounded mean of several percentiles
pub(crate) fn average_percentile(percentiles: &[u8]) -> u8 {
    if percentiles.is_empty() {
        return 50;
    }
    let sum: usize = percentiles.iter().map(|p| *p as usize).sum();
    round_ratio(sum, percentiles.len()) as u8
}

/// Aggregate every card in `cards` that matches the loan type and currency
pub fn calculate_market_average(
    loan_type: LoanType,
    currency: Currency,
    cards: &[RateCard],
) -> MarketAverage {
    let market: Vec<&RateCard> = cards
        .iter()
        .filter(|c| c.loan_type == loan_type && c.currency == currency)
        .collect();

    let mut aprs: Vec<Decimal> = market.iter().map(|c| c.base_apr).collect();
    aprs.sort();

    let count = market.len();
    let avg_processing_time = if count == 0 {
        0
    } else {
        let total: i64 = market.iter().map(|c| i64::from(c.processing_time_days)).sum();
        (total / count as i64) as i32
    };
    let bank_count = market
        .iter()
        .map(|c| c.bank_id)
        .collect::<HashSet<_>>()
        .len();

    MarketAverage {
        loan_type,
        currency,
        avg_apr: mean(aprs.iter().copied(), count),
        median_apr: median(&aprs),
        min_apr: aprs.first().copied().map(round2).unwrap_or_default(),
        max_apr: aprs.last().copied().map(round2).unwrap_or_default(),
        avg_origination_fee: mean(market.iter().map(|c| c.origination_fee_percent), count),
        avg_insurance: mean(market.iter().map(|c| c.insurance_percent), count),
        avg_processing_time,
        bank_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn card(bank_id: Uuid, apr: Decimal, fee: Decimal, days: i32) -> RateCard {
        RateCard {
            id: Uuid::new_v4(),
            bank_id,
            loan_type: LoanType::Personal,
            currency: Currency::Eur,
            min_amount: dec!(1000),
            max_amount: dec!(50000),
            base_apr: apr,
            apr_adjustment_range: dec!(1),
            origination_fee_percent: fee,
            insurance_percent: Decimal::ZERO,
            processing_time_days: days,
            valid_from: Utc::now(),
            valid_to: None,
        }
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[dec!(5), dec!(6), dec!(9)]), dec!(6));
        assert_eq!(median(&[dec!(5), dec!(6), dec!(7), dec!(9)]), dec!(6.5));
        assert_eq!(median(&[dec!(5.125), dec!(5.13)]), dec!(5.13));
        assert_eq!(median(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_percentile_ranking() {
        let market = [dec!(5.0), dec!(6.0), dec!(7.0), dec!(8.0)];
        assert_eq!(calculate_percentile_ranking(dec!(5.0), &market), 100);
        assert_eq!(calculate_percentile_ranking(dec!(6.0), &market), 75);
        assert_eq!(calculate_percentile_ranking(dec!(7.0), &market), 50);
        assert_eq!(calculate_percentile_ranking(dec!(8.0), &market), 25);
        assert_eq!(calculate_percentile_ranking(dec!(5.0), &[]), 0);
    }

    #[test]
    fn test_percentile_rounds_half_up() {
        // 2/3 -> 66.67 -> 67, 1/3 -> 33.33 -> 33
        let market = [dec!(4), dec!(5), dec!(6)];
        assert_eq!(calculate_percentile_ranking(dec!(5), &market), 67);
        assert_eq!(calculate_percentile_ranking(dec!(6), &market), 33);
        // 7/8 -> 87.5 -> 88
        let market: Vec<Decimal> = (1..=8).map(Decimal::from).collect();
        assert_eq!(calculate_percentile_ranking(dec!(2), &market), 88);
    }

    #[test]
    fn test_ties_share_top_percentile() {
        let market = [dec!(5.0), dec!(5.0), dec!(5.0), dec!(9.0)];
        assert_eq!(calculate_percentile_ranking(dec!(5.0), &market), 100);
    }

    #[test]
    fn test_percentile_is_monotonic_in_apr() {
        let market = [dec!(3.1), dec!(4.5), dec!(4.5), dec!(6.0), dec!(7.25), dec!(9.9)];
        let mut previous = 0;
        let mut apr = dec!(12.0);
        while apr >= dec!(2.0) {
            let percentile = calculate_percentile_ranking(apr, &market);
            assert!(percentile >= previous, "{} dropped to {}", apr, percentile);
            previous = percentile;
            apr -= dec!(0.05);
        }
    }

    #[test]
    fn test_competitive_position_thresholds() {
        assert_eq!(
            determine_competitive_position(75),
            CompetitivePosition::MoreCompetitive
        );
        assert_eq!(determine_competitive_position(74), CompetitivePosition::Average);
        assert_eq!(determine_competitive_position(25), CompetitivePosition::Average);
        assert_eq!(
            determine_competitive_position(24),
            CompetitivePosition::LessCompetitive
        );
    }

    #[test]
    fn test_average_percentile_rounding() {
        assert_eq!(average_percentile(&[100, 75]), 88);
        assert_eq!(average_percentile(&[50, 33]), 42);
        assert_eq!(average_percentile(&[]), 50);
    }

    #[test]
    fn test_market_average() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let cards = vec![
            card(a, dec!(5.0), dec!(1.0), 3),
            card(b, dec!(6.0), dec!(2.0), 4),
            card(c, dec!(7.5), dec!(1.5), 6),
        ];

        let avg = calculate_market_average(LoanType::Personal, Currency::Eur, &cards);
        assert_eq!(avg.avg_apr, dec!(6.17));
        assert_eq!(avg.median_apr, dec!(6.0));
        assert_eq!(avg.min_apr, dec!(5.0));
        assert_eq!(avg.max_apr, dec!(7.5));
        assert_eq!(avg.avg_origination_fee, dec!(1.5));
        assert_eq!(avg.avg_processing_time, 4);
        assert_eq!(avg.bank_count, 3);

        let empty = calculate_market_average(LoanType::Mortgage, Currency::Eur, &cards);
        assert_eq!(empty.bank_count, 0);
        assert_eq!(empty.avg_apr, Decimal::ZERO);
    }
}
