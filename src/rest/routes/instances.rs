//! Workflow instance endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::rest::dto::{
    CreateInstanceRequest, CreateInstanceResponse, InstanceDetailResponse, InstanceListQuery,
    InstanceResponse, InstanceSummaryResponse, StepResponse,
};
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;
use crate::types::InstanceStatus;

/// List instances, newest first
#[utoipa::path(
    get,
    path = "/api/v1/instances",
    tag = "Instances",
    params(InstanceListQuery),
    responses(
        (status = 200, description = "Instances, newest first", body = Vec<InstanceResponse>),
        (status = 400, description = "Unknown status filter", body = ErrorResponse)
    )
)]
pub async fn list(
    State(state): State<ApiState>,
    Query(query): Query<InstanceListQuery>,
) -> Result<Json<Vec<InstanceResponse>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<InstanceStatus>)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let instances = state.coordinator.list_instances(status).await?;
    Ok(Json(instances.iter().map(InstanceResponse::from).collect()))
}

/// Start an instance of a template
#[utoipa::path(
    post,
    path = "/api/v1/instances",
    tag = "Instances",
    request_body = CreateInstanceRequest,
    responses(
        (status = 200, description = "Instance created with step 1 pending", body = CreateInstanceResponse),
        (status = 404, description = "Template not found", body = ErrorResponse)
    )
)]
pub async fn create(
    State(state): State<ApiState>,
    Json(request): Json<CreateInstanceRequest>,
) -> Result<Json<CreateInstanceResponse>, ApiError> {
    let id = state
        .coordinator
        .create_instance_with_input(request.template_id, request.input)
        .await?;
    Ok(Json(CreateInstanceResponse { id }))
}

/// Get an instance with all of its steps
#[utoipa::path(
    get,
    path = "/api/v1/instances/{id}",
    tag = "Instances",
    params(
        ("id" = Uuid, Path, description = "Instance id")
    ),
    responses(
        (status = 200, description = "Instance details", body = InstanceDetailResponse),
        (status = 404, description = "Instance not found", body = ErrorResponse)
    )
)]
pub async fn get_one(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InstanceDetailResponse>, ApiError> {
    let detail = state.coordinator.instance_detail(id).await?;
    Ok(Json(InstanceDetailResponse::from(&detail)))
}

/// Delete an instance and its steps
#[utoipa::path(
    delete,
    path = "/api/v1/instances/{id}",
    tag = "Instances",
    params(
        ("id" = Uuid, Path, description = "Instance id")
    ),
    responses(
        (status = 204, description = "Instance deleted"),
        (status = 404, description = "Instance not found", body = ErrorResponse)
    )
)]
pub async fn delete(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.coordinator.delete_instance(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Steps of an instance ordered by position and attempt
#[utoipa::path(
    get,
    path = "/api/v1/instances/{id}/steps",
    tag = "Instances",
    params(
        ("id" = Uuid, Path, description = "Instance id")
    ),
    responses(
        (status = 200, description = "Steps of the instance", body = Vec<StepResponse>),
        (status = 404, description = "Instance not found", body = ErrorResponse)
    )
)]
pub async fn steps(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StepResponse>>, ApiError> {
    let detail = state.coordinator.instance_detail(id).await?;
    Ok(Json(detail.steps.iter().map(StepResponse::from).collect()))
}

/// Move past the approved current step
#[utoipa::path(
    post,
    path = "/api/v1/instances/{id}/advance",
    tag = "Instances",
    params(
        ("id" = Uuid, Path, description = "Instance id")
    ),
    responses(
        (status = 200, description = "Instance advanced or completed", body = InstanceSummaryResponse),
        (status = 404, description = "Instance not found", body = ErrorResponse),
        (status = 409, description = "Current step not approved, instance paused or finished, or lost a race", body = ErrorResponse)
    )
)]
pub async fn advance(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InstanceSummaryResponse>, ApiError> {
    let summary = state.coordinator.advance(id).await?;
    Ok(Json(summary.into()))
}

/// Pause automatic progression
#[utoipa::path(
    post,
    path = "/api/v1/instances/{id}/pause",
    tag = "Instances",
    params(
        ("id" = Uuid, Path, description = "Instance id")
    ),
    responses(
        (status = 200, description = "Instance paused for review", body = InstanceSummaryResponse),
        (status = 404, description = "Instance not found", body = ErrorResponse),
        (status = 409, description = "Instance cannot be paused", body = ErrorResponse)
    )
)]
pub async fn pause(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InstanceSummaryResponse>, ApiError> {
    let summary = state.coordinator.pause_for_review(id).await?;
    Ok(Json(summary.into()))
}

/// Resume a paused instance
#[utoipa::path(
    post,
    path = "/api/v1/instances/{id}/resume",
    tag = "Instances",
    params(
        ("id" = Uuid, Path, description = "Instance id")
    ),
    responses(
        (status = 200, description = "Instance active again", body = InstanceSummaryResponse),
        (status = 404, description = "Instance not found", body = ErrorResponse),
        (status = 409, description = "Instance is not paused", body = ErrorResponse)
    )
)]
pub async fn resume(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InstanceSummaryResponse>, ApiError> {
    let summary = state.coordinator.resume(id).await?;
    Ok(Json(summary.into()))
}

/// Cancel an instance, skipping its live step
#[utoipa::path(
    post,
    path = "/api/v1/instances/{id}/cancel",
    tag = "Instances",
    params(
        ("id" = Uuid, Path, description = "Instance id")
    ),
    responses(
        (status = 200, description = "Instance cancelled", body = InstanceSummaryResponse),
        (status = 404, description = "Instance not found", body = ErrorResponse),
        (status = 409, description = "Instance already finished", body = ErrorResponse)
    )
)]
pub async fn cancel(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InstanceSummaryResponse>, ApiError> {
    let summary = state.coordinator.cancel(id).await?;
    Ok(Json(summary.into()))
}
