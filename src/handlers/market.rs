use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::market::{MarketAnalysisReport, MarketAnalysisService, MarketAverage, MarketAverageQuery};
use crate::models::ApiResponse;

pub async fn get_market_analysis(
    State(service): State<Arc<MarketAnalysisService>>,
    Path(bank_id): Path<Uuid>,
) -> Result<Json<ApiResponse<MarketAnalysisReport>>, ApiError> {
    let report = service.analyze_market(bank_id).await?;
    Ok(Json(ApiResponse::ok(report)))
}

pub async fn get_market_average(
    State(service): State<Arc<MarketAnalysisService>>,
    Query(query): Query<MarketAverageQuery>,
) -> Result<Json<ApiResponse<MarketAverage>>, ApiError> {
    let average = service
        .published_market_average(query.loan_type, query.currency)
        .await?;
    Ok(Json(ApiResponse::ok(average)))
}
