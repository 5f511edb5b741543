//! Market analysis report models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::rate_card::{Currency, LoanType};

/// Where a bank's pricing sits relative to the market
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompetitivePosition {
    MoreCompetitive,
    Average,
    LessCompetitive,
}

/// Aggregates over every active card in one loan type and currency
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MarketAverage {
    pub loan_type: LoanType,
    pub currency: Currency,
    pub avg_apr: Decimal,
    pub median_apr: Decimal,
    pub min_apr: Decimal,
    pub max_apr: Decimal,
    pub avg_origination_fee: Decimal,
    pub avg_insurance: Decimal,
    pub avg_processing_time: i32,
    pub bank_count: usize,
}

/// One of the analysed bank's own cards with its ranking
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MyBankRate {
    pub loan_type: LoanType,
    pub currency: Currency,
    pub base_apr: Decimal,
    pub market_percentile: u8,
    pub competitive_position: CompetitivePosition,
    pub origination_fee_percent: Decimal,
    pub insurance_percent: Decimal,
    pub processing_time_days: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AprComparison {
    pub loan_type: LoanType,
    pub currency: Currency,
    pub my_apr: Decimal,
    pub market_median: Decimal,
    pub market_min: Decimal,
    pub market_max: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FeeComparison {
    pub loan_type: LoanType,
    pub currency: Currency,
    pub my_origination_fee: Decimal,
    pub market_avg_origination_fee: Decimal,
    pub my_insurance: Decimal,
    pub market_avg_insurance: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProcessingTimeComparison {
    pub loan_type: LoanType,
    pub currency: Currency,
    pub my_processing_days: i32,
    pub market_avg_processing_days: i32,
}

/// Chart-ready comparison rows
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct MarketVisualization {
    pub apr_comparison: Vec<AprComparison>,
    pub fee_comparison: Vec<FeeComparison>,
    pub processing_time_comparison: Vec<ProcessingTimeComparison>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MarketAnalysisReport {
    pub my_rates: Vec<MyBankRate>,
    pub market_averages: Vec<MarketAverage>,
    pub overall_percentile: u8,
    pub overall_position: CompetitivePosition,
    pub analyzed_at: DateTime<Utc>,
    pub total_banks_in_market: usize,
    pub visualization: MarketVisualization,
}

/// Query for the public market average endpoint
#[derive(Debug, Deserialize)]
pub struct MarketAverageQuery {
    pub loan_type: LoanType,
    pub currency: Currency,
}
