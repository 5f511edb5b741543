//! Rate card route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn rate_card_routes() -> Router<AppState> {
    Router::new()
        .route("/api/banks/:bank_id/rate-cards", post(upsert_rate_card))
        .route("/api/banks/:bank_id/rate-cards", get(list_rate_cards))
}
