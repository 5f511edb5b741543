use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::application::{
    Application, ApplicationService, ApplicationStatusView, DeclineApplicationRequest,
    UpdateApplicationStatusRequest,
};
use crate::error::ApiError;
use crate::models::ApiResponse;

pub async fn get_application_status(
    State(service): State<Arc<ApplicationService>>,
    Path(application_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ApplicationStatusView>>, ApiError> {
    let view = service.status_view(application_id).await?;
    Ok(Json(ApiResponse::ok(view)))
}

pub async fn update_application_status(
    State(service): State<Arc<ApplicationService>>,
    Path((bank_id, application_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateApplicationStatusRequest>,
) -> Result<Json<ApiResponse<Application>>, ApiError> {
    let application = service
        .update_status(bank_id, application_id, request.status)
        .await?;
    Ok(Json(ApiResponse::ok(application)))
}

pub async fn decline_application(
    State(service): State<Arc<ApplicationService>>,
    Path((bank_id, application_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<DeclineApplicationRequest>,
) -> Result<Json<ApiResponse<Application>>, ApiError> {
    let application = service.decline(bank_id, application_id, request).await?;
    Ok(Json(ApiResponse::ok(application)))
}
