//! Workflow template endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::rest::dto::{CreateTemplateRequest, TemplateResponse};
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;

/// List all templates
#[utoipa::path(
    get,
    path = "/api/v1/templates",
    tag = "Templates",
    responses(
        (status = 200, description = "All templates, oldest first", body = Vec<TemplateResponse>)
    )
)]
pub async fn list(State(state): State<ApiState>) -> Result<Json<Vec<TemplateResponse>>, ApiError> {
    let templates = state.coordinator.templates().await?;
    Ok(Json(templates.iter().map(TemplateResponse::from).collect()))
}

/// Get a single template
#[utoipa::path(
    get,
    path = "/api/v1/templates/{id}",
    tag = "Templates",
    params(
        ("id" = Uuid, Path, description = "Template id")
    ),
    responses(
        (status = 200, description = "Template details", body = TemplateResponse),
        (status = 404, description = "Template not found", body = ErrorResponse)
    )
)]
pub async fn get_one(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TemplateResponse>, ApiError> {
    let template = state.coordinator.template(id).await?;
    Ok(Json(TemplateResponse::from(&template)))
}

/// Create a template
#[utoipa::path(
    post,
    path = "/api/v1/templates",
    tag = "Templates",
    request_body = CreateTemplateRequest,
    responses(
        (status = 200, description = "Template created", body = TemplateResponse),
        (status = 400, description = "Step orders missing, duplicated, or not contiguous", body = ErrorResponse)
    )
)]
pub async fn create(
    State(state): State<ApiState>,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<Json<TemplateResponse>, ApiError> {
    let template = state.coordinator.create_template(request.into()).await?;
    Ok(Json(TemplateResponse::from(&template)))
}
