//! Market analysis route definitions

use axum::{routing::get, Router};

use crate::handlers::*;
use crate::state::AppState;

pub fn market_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/banks/:bank_id/market-analysis",
            get(get_market_analysis),
        )
        .route("/api/market/average", get(get_market_average))
}
