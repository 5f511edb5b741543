//! Market analysis domain module
//!
//! Cross-bank statistics over the currently active rate cards. Nothing is
//! disclosed for a market with fewer than `MINIMUM_BANKS_FOR_ANALYSIS` banks.

mod model;
mod service;
mod stats;

pub use model::*;
pub use service::{MarketAnalysisService, MINIMUM_BANKS_FOR_ANALYSIS};
pub use stats::{
    calculate_market_average, calculate_percentile_ranking, determine_competitive_position,
    median,
};
