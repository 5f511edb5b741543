use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::offer::{
    CalculateOffersResponse, Offer, OfferCalculationService, OfferService, ResubmitOfferRequest,
    SelectOfferRequest, SubmitOfferRequest,
};
use crate::store::SelectionOutcome;

pub async fn calculate_offers(
    State(service): State<Arc<OfferCalculationService>>,
    Path(application_id): Path<Uuid>,
) -> Result<Json<ApiResponse<CalculateOffersResponse>>, ApiError> {
    let response = service.calculate_offers(application_id).await?;
    Ok(Json(ApiResponse::ok(response)))
}

pub async fn list_application_offers(
    State(service): State<Arc<OfferService>>,
    Path(application_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Offer>>>, ApiError> {
    let offers = service.list_for_application(application_id).await?;
    Ok(Json(ApiResponse::ok(offers)))
}

pub async fn select_offer(
    State(service): State<Arc<OfferService>>,
    Path((application_id, offer_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<SelectOfferRequest>,
) -> Result<Json<ApiResponse<SelectionOutcome>>, ApiError> {
    let outcome = service
        .select_offer(request.borrower_id, application_id, offer_id)
        .await?;
    Ok(Json(ApiResponse::ok(outcome)))
}

pub async fn submit_offer(
    State(service): State<Arc<OfferService>>,
    Path(bank_id): Path<Uuid>,
    Json(request): Json<SubmitOfferRequest>,
) -> Result<Json<ApiResponse<Offer>>, ApiError> {
    let offer = service.submit_offer(bank_id, request).await?;
    Ok(Json(ApiResponse::ok(offer)))
}

pub async fn withdraw_offer(
    State(service): State<Arc<OfferService>>,
    Path((bank_id, offer_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<Offer>>, ApiError> {
    let offer = service.withdraw_offer(bank_id, offer_id).await?;
    Ok(Json(ApiResponse::ok(offer)))
}

pub async fn resubmit_offer(
    State(service): State<Arc<OfferService>>,
    Path((bank_id, offer_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ResubmitOfferRequest>,
) -> Result<Json<ApiResponse<Offer>>, ApiError> {
    let offer = service.resubmit_offer(bank_id, offer_id, request).await?;
    Ok(Json(ApiResponse::ok(offer)))
}
