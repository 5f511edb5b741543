use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::rate_card::{Currency, LoanType, RateCard, RateCardService, UpsertRateCardRequest};

/// Optional filter selecting the full version history of one product
#[derive(Debug, Deserialize)]
pub struct RateCardQuery {
    pub loan_type: Option<LoanType>,
    pub currency: Option<Currency>,
}

pub async fn upsert_rate_card(
    State(service): State<Arc<RateCardService>>,
    Path(bank_id): Path<Uuid>,
    Json(request): Json<UpsertRateCardRequest>,
) -> Result<Json<ApiResponse<RateCard>>, ApiError> {
    let card = service
        .upsert(bank_id, request.loan_type, request.currency, request.terms)
        .await?;

    Ok(Json(ApiResponse::ok(card)))
}

/// Active cards for a bank, or the history of one product when both
/// `loan_type` and `currency` are given
pub async fn list_rate_cards(
    State(service): State<Arc<RateCardService>>,
    Path(bank_id): Path<Uuid>,
    Query(query): Query<RateCardQuery>,
) -> Result<Json<ApiResponse<Vec<RateCard>>>, ApiError> {
    let cards = match (query.loan_type, query.currency) {
        (Some(loan_type), Some(currency)) => service.history(bank_id, loan_type, currency).await?,
        (None, None) => service.get_active_for_bank(bank_id).await?,
        _ => {
            return Err(ApiError::BadRequest(
                "loan_type and currency must be given together".to_string(),
            ))
        }
    };

    Ok(Json(ApiResponse::ok(cards)))
}
