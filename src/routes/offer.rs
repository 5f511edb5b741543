//! Offer route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn offer_routes() -> Router<AppState> {
    Router::new()
        .route("/api/banks/:bank_id/offers", post(submit_offer))
        .route(
            "/api/banks/:bank_id/offers/:offer_id/withdraw",
            post(withdraw_offer),
        )
        .route(
            "/api/banks/:bank_id/offers/:offer_id/resubmit",
            post(resubmit_offer),
        )
        .route(
            "/api/applications/:id/offers/calculate",
            post(calculate_offers),
        )
        .route("/api/applications/:id/offers", get(list_application_offers))
        .route(
            "/api/applications/:id/offers/:offer_id/select",
            post(select_offer),
        )
}
