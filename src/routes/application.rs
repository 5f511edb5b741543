//! Application status route definitions

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn application_routes() -> Router<AppState> {
    Router::new()
        .route("/api/applications/:id/status", get(get_application_status))
        .route(
            "/api/banks/:bank_id/applications/:id/status",
            put(update_application_status),
        )
        .route(
            "/api/banks/:bank_id/applications/:id/decline",
            post(decline_application),
        )
}
