//! Route definitions for the loan broker API

mod admin;
mod application;
mod market;
mod offer;
mod rate_card;

pub use admin::admin_routes;
pub use application::application_routes;
pub use market::market_routes;
pub use offer::offer_routes;
pub use rate_card::rate_card_routes;

use axum::Router;

use crate::state::AppState;

/// Every API route bound to the shared state
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .merge(rate_card_routes())
        .merge(market_routes())
        .merge(offer_routes())
        .merge(application_routes())
        .merge(admin_routes())
        .with_state(state)
}
