//! Workflow step endpoints: agent claims, submissions, and reviews.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::rest::dto::{
    ApproveStepRequest, ApproveStepResponse, ClaimStepRequest, RejectStepRequest,
    RejectStepResponse, StepResponse, SubmitStepRequest,
};
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;

/// Steps an agent may claim now
#[utoipa::path(
    get,
    path = "/api/v1/steps/pending",
    tag = "Steps",
    responses(
        (status = 200, description = "Pending steps of instances that are not paused", body = Vec<StepResponse>)
    )
)]
pub async fn pending(State(state): State<ApiState>) -> Result<Json<Vec<StepResponse>>, ApiError> {
    let steps = state.coordinator.pending_steps().await?;
    Ok(Json(steps.iter().map(StepResponse::from).collect()))
}

/// Steps waiting on a reviewer
#[utoipa::path(
    get,
    path = "/api/v1/steps/awaiting-review",
    tag = "Steps",
    responses(
        (status = 200, description = "Steps in awaiting_review", body = Vec<StepResponse>)
    )
)]
pub async fn awaiting_review(
    State(state): State<ApiState>,
) -> Result<Json<Vec<StepResponse>>, ApiError> {
    let steps = state.coordinator.awaiting_review().await?;
    Ok(Json(steps.iter().map(StepResponse::from).collect()))
}

/// Get a single step
#[utoipa::path(
    get,
    path = "/api/v1/steps/{id}",
    tag = "Steps",
    params(
        ("id" = Uuid, Path, description = "Step id")
    ),
    responses(
        (status = 200, description = "Step details", body = StepResponse),
        (status = 404, description = "Step not found", body = ErrorResponse)
    )
)]
pub async fn get_one(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StepResponse>, ApiError> {
    let step = state.coordinator.step(id).await?;
    Ok(Json(StepResponse::from(&step)))
}

/// Claim the active step for an agent role
#[utoipa::path(
    post,
    path = "/api/v1/steps/{id}/claim",
    tag = "Steps",
    params(
        ("id" = Uuid, Path, description = "Step id")
    ),
    request_body = ClaimStepRequest,
    responses(
        (status = 200, description = "Step is agent_working", body = StepResponse),
        (status = 404, description = "Step not found", body = ErrorResponse),
        (status = 409, description = "Step is not pending, not active, routed elsewhere, or instance paused", body = ErrorResponse)
    )
)]
pub async fn claim(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ClaimStepRequest>,
) -> Result<Json<StepResponse>, ApiError> {
    let step = state.coordinator.claim_step(id, &request.agent_role).await?;
    Ok(Json(StepResponse::from(&step)))
}

/// Submit a step's output for review
#[utoipa::path(
    post,
    path = "/api/v1/steps/{id}/submit",
    tag = "Steps",
    params(
        ("id" = Uuid, Path, description = "Step id")
    ),
    request_body = SubmitStepRequest,
    responses(
        (status = 200, description = "Step is awaiting_review", body = StepResponse),
        (status = 404, description = "Step not found", body = ErrorResponse),
        (status = 409, description = "Step is not agent_working", body = ErrorResponse)
    )
)]
pub async fn submit(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitStepRequest>,
) -> Result<Json<StepResponse>, ApiError> {
    let step = state.coordinator.submit_step(id, request.output).await?;
    Ok(Json(StepResponse::from(&step)))
}

/// Approve a step and advance its instance in one commit, unless asked not
/// to or the instance is paused
#[utoipa::path(
    post,
    path = "/api/v1/steps/{id}/approve",
    tag = "Steps",
    params(
        ("id" = Uuid, Path, description = "Step id")
    ),
    request_body = ApproveStepRequest,
    responses(
        (status = 200, description = "Step approved", body = ApproveStepResponse),
        (status = 404, description = "Step not found", body = ErrorResponse),
        (status = 409, description = "Step is not awaiting_review, or the instance changed concurrently; nothing was applied", body = ErrorResponse)
    )
)]
pub async fn approve(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ApproveStepRequest>,
) -> Result<Json<ApproveStepResponse>, ApiError> {
    let approval = state
        .coordinator
        .approve_and_advance(id, request.notes, request.advance)
        .await?;

    Ok(Json(ApproveStepResponse {
        step: StepResponse::from(&approval.step),
        instance: approval.instance.into(),
        advanced: approval.advanced,
    }))
}

/// Reject a step; a fresh pending retry takes its place
#[utoipa::path(
    post,
    path = "/api/v1/steps/{id}/reject",
    tag = "Steps",
    params(
        ("id" = Uuid, Path, description = "Step id")
    ),
    request_body = RejectStepRequest,
    responses(
        (status = 200, description = "Step rejected and retry queued", body = RejectStepResponse),
        (status = 400, description = "Missing reason", body = ErrorResponse),
        (status = 404, description = "Step not found", body = ErrorResponse),
        (status = 409, description = "Step is not awaiting_review", body = ErrorResponse)
    )
)]
pub async fn reject(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectStepRequest>,
) -> Result<Json<RejectStepResponse>, ApiError> {
    let retry_step_id = state.coordinator.reject_step(id, &request.reason).await?;
    Ok(Json(RejectStepResponse {
        rejected_step_id: id,
        retry_step_id,
    }))
}
