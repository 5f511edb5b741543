//! Market analysis service

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::stats::{
    average_percentile, calculate_market_average, calculate_percentile_ranking,
    determine_competitive_position,
};
use super::{
    AprComparison, FeeComparison, MarketAnalysisReport, MarketAverage, MarketVisualization,
    MyBankRate, ProcessingTimeComparison,
};
use crate::error::{DomainError, DomainResult};
use crate::rate_card::{Currency, LoanType, RateCard};
use crate::store::RateCardRepository;

/// Minimum distinct banks a market must hold before statistics are disclosed
pub const MINIMUM_BANKS_FOR_ANALYSIS: usize = 3;

#[derive(Clone)]
pub struct MarketAnalysisService {
    rate_cards: Arc<dyn RateCardRepository>,
}

fn require_market_floor(bank_count: usize) -> DomainResult<()> {
    if bank_count < MINIMUM_BANKS_FOR_ANALYSIS {
        return Err(DomainError::InsufficientMarketData {
            required: MINIMUM_BANKS_FOR_ANALYSIS,
            found: bank_count,
        });
    }
    Ok(())
}

impl MarketAnalysisService {
    pub fn new(rate_cards: Arc<dyn RateCardRepository>) -> Self {
        Self { rate_cards }
    }

    /// Aggregates for one market, without the disclosure floor
    pub async fn calculate_market_average(
        &self,
        loan_type: LoanType,
        currency: Currency,
    ) -> DomainResult<MarketAverage> {
        let cards = self
            .rate_cards
            .list_active(Some((loan_type, currency)))
            .await?;
        Ok(calculate_market_average(loan_type, currency, &cards))
    }

    /// Aggregates for one market, refused when fewer than the minimum number of
    /// banks participate
    pub async fn published_market_average(
        &self,
        loan_type: LoanType,
        currency: Currency,
    ) -> DomainResult<MarketAverage> {
        let average = self.calculate_market_average(loan_type, currency).await?;
        require_market_floor(average.bank_count)?;
        Ok(average)
    }

    /// Rank every active card of `bank_id` against its market
    pub async fn analyze_market(&self, bank_id: Uuid) -> DomainResult<MarketAnalysisReport> {
        let my_cards = self.rate_cards.list_active_for_bank(bank_id).await?;
        if my_cards.is_empty() {
            return Err(DomainError::not_found("Active rate card for bank", bank_id));
        }

        let all_active = self.rate_cards.list_active(None).await?;

        let mut my_rates = Vec::with_capacity(my_cards.len());
        let mut market_averages = Vec::with_capacity(my_cards.len());
        let mut all_banks = HashSet::new();

        for my_card in &my_cards {
            let market: Vec<RateCard> = all_active
                .iter()
                .filter(|c| c.loan_type == my_card.loan_type && c.currency == my_card.currency)
                .cloned()
                .collect();

            let market_banks: HashSet<Uuid> = market.iter().map(|c| c.bank_id).collect();
            if let Err(e) = require_market_floor(market_banks.len()) {
                tracing::info!(
                    bank_id = %bank_id,
                    loan_type = %my_card.loan_type,
                    currency = %my_card.currency,
                    found = market_banks.len(),
                    "Market too small for analysis"
                );
                return Err(e);
            }
            all_banks.extend(market_banks);

            let aprs: Vec<_> = market.iter().map(|c| c.base_apr).collect();
            let percentile = calculate_percentile_ranking(my_card.base_apr, &aprs);

            my_rates.push(MyBankRate {
                loan_type: my_card.loan_type,
                currency: my_card.currency,
                base_apr: my_card.base_apr,
                market_percentile: percentile,
                competitive_position: determine_competitive_position(percentile),
                origination_fee_percent: my_card.origination_fee_percent,
                insurance_percent: my_card.insurance_percent,
                processing_time_days: my_card.processing_time_days,
            });
            market_averages.push(calculate_market_average(
                my_card.loan_type,
                my_card.currency,
                &market,
            ));
        }

        let percentiles: Vec<u8> = my_rates.iter().map(|r| r.market_percentile).collect();
        let overall_percentile = average_percentile(&percentiles);
        let visualization = build_visualization(&my_rates, &market_averages);

        tracing::debug!(
            bank_id = %bank_id,
            cards = my_rates.len(),
            overall_percentile,
            "Market analysis computed"
        );

        Ok(MarketAnalysisReport {
            my_rates,
            market_averages,
            overall_percentile,
            overall_position: determine_competitive_position(overall_percentile),
            analyzed_at: Utc::now(),
            total_banks_in_market: all_banks.len(),
            visualization,
        })
    }
}

fn build_visualization(my_rates: &[MyBankRate], averages: &[MarketAverage]) -> MarketVisualization {
    let mut visualization = MarketVisualization::default();

    for my in my_rates {
        let Some(avg) = averages
            .iter()
            .find(|a| a.loan_type == my.loan_type && a.currency == my.currency)
        else {
            continue;
        };

        visualization.apr_comparison.push(AprComparison {
            loan_type: my.loan_type,
            currency: my.currency,
            my_apr: my.base_apr,
            market_median: avg.median_apr,
            market_min: avg.min_apr,
            market_max: avg.max_apr,
        });
        visualization.fee_comparison.push(FeeComparison {
            loan_type: my.loan_type,
            currency: my.currency,
            my_origination_fee: my.origination_fee_percent,
            market_avg_origination_fee: avg.avg_origination_fee,
            my_insurance: my.insurance_percent,
            market_avg_insurance: avg.avg_insurance,
        });
        visualization
            .processing_time_comparison
            .push(ProcessingTimeComparison {
                loan_type: my.loan_type,
                currency: my.currency,
                my_processing_days: my.processing_time_days,
                market_avg_processing_days: avg.avg_processing_time,
            });
    }

    visualization
}
