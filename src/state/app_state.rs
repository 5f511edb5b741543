//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::application::ApplicationService;
use crate::expiration::OfferExpirationService;
use crate::market::MarketAnalysisService;
use crate::offer::{OfferCalculationService, OfferService};
use crate::rate_card::RateCardService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub rate_card_service: Arc<RateCardService>,
    pub offer_calculation_service: Arc<OfferCalculationService>,
    pub offer_service: Arc<OfferService>,
    pub application_service: Arc<ApplicationService>,
    pub expiration_service: Arc<OfferExpirationService>,
    pub market_service: Arc<MarketAnalysisService>,
}

impl AppState {
    pub fn new(
        rate_card_service: Arc<RateCardService>,
        offer_calculation_service: Arc<OfferCalculationService>,
        offer_service: Arc<OfferService>,
        application_service: Arc<ApplicationService>,
        expiration_service: Arc<OfferExpirationService>,
        market_service: Arc<MarketAnalysisService>,
    ) -> Self {
        Self {
            rate_card_service,
            offer_calculation_service,
            offer_service,
            application_service,
            expiration_service,
            market_service,
        }
    }
}

impl FromRef<AppState> for Arc<RateCardService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.rate_card_service.clone()
    }
}

impl FromRef<AppState> for Arc<OfferCalculationService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.offer_calculation_service.clone()
    }
}

impl FromRef<AppState> for Arc<OfferService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.offer_service.clone()
    }
}

impl FromRef<AppState> for Arc<ApplicationService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.application_service.clone()
    }
}

impl FromRef<AppState> for Arc<OfferExpirationService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.expiration_service.clone()
    }
}

impl FromRef<AppState> for Arc<MarketAnalysisService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.market_service.clone()
    }
}
