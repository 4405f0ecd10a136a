//! System status endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::rest::dto::{StatusReadingResponse, UpsertStatusRequest, UpsertStatusResponse};
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;

/// List the effective status of every reported key
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "Status",
    responses(
        (status = 200, description = "Effective status per key", body = Vec<StatusReadingResponse>)
    )
)]
pub async fn list(State(state): State<ApiState>) -> Json<Vec<StatusReadingResponse>> {
    let readings = state.registry.list().await;
    Json(readings.into_iter().map(StatusReadingResponse::from).collect())
}

/// Report a status for a key
#[utoipa::path(
    post,
    path = "/api/v1/status",
    tag = "Status",
    request_body = UpsertStatusRequest,
    responses(
        (status = 200, description = "Status recorded", body = UpsertStatusResponse),
        (status = 400, description = "Missing key or status", body = ErrorResponse)
    )
)]
pub async fn upsert(
    State(state): State<ApiState>,
    Json(request): Json<UpsertStatusRequest>,
) -> Result<Json<UpsertStatusResponse>, ApiError> {
    let id = state
        .registry
        .report(
            &request.key,
            &request.status,
            request.details,
            request.reported_at,
        )
        .await?;
    Ok(Json(UpsertStatusResponse { id }))
}

/// Effective status of the workflow daemon
#[utoipa::path(
    get,
    path = "/api/v1/status/daemon",
    tag = "Status",
    responses(
        (status = 200, description = "Daemon health", body = StatusReadingResponse)
    )
)]
pub async fn daemon(State(state): State<ApiState>) -> Json<StatusReadingResponse> {
    Json(state.registry.daemon_status().await.into())
}

/// Effective status of a single key
#[utoipa::path(
    get,
    path = "/api/v1/status/{key}",
    tag = "Status",
    params(
        ("key" = String, Path, description = "Status key (e.g., daemon_health)")
    ),
    responses(
        (status = 200, description = "Status for the key; \"unknown\" if never reported", body = StatusReadingResponse)
    )
)]
pub async fn get_one(
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> Json<StatusReadingResponse> {
    Json(state.registry.read(&key).await.into())
}
