//! Operator endpoints for the expiration job

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::expiration::{ExpirationRunReport, OfferExpirationService};
use crate::models::ApiResponse;
use crate::offer::ExpiredOffer;

/// Expire one offer immediately, regardless of its expiry time
pub async fn expire_offer(
    State(service): State<Arc<OfferExpirationService>>,
    Path(offer_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ExpiredOffer>>, ApiError> {
    let expired = service.expire_offer(offer_id).await?;
    Ok(Json(ApiResponse::ok(expired)))
}

/// Run an expiration sweep now instead of waiting for the schedule
pub async fn run_expiration(
    State(service): State<Arc<OfferExpirationService>>,
) -> Result<Json<ApiResponse<ExpirationRunReport>>, ApiError> {
    let report = service.run().await?;
    Ok(Json(ApiResponse::ok(report)))
}
