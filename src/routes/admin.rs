//! Admin route definitions

use axum::{routing::post, Router};

use crate::handlers::*;
use crate::state::AppState;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/offers/:offer_id/expire", post(expire_offer))
        .route("/api/admin/expiration/run", post(run_expiration))
}
