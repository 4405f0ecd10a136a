//! Agent roster and activity endpoints.

use axum::{extract::State, Json};

use crate::rest::dto::{AgentActivityResponse, AgentResponse, UpsertAgentRequest};
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;

/// List all agents
#[utoipa::path(
    get,
    path = "/api/v1/agents",
    tag = "Agents",
    responses(
        (status = 200, description = "All agents sorted by name", body = Vec<AgentResponse>)
    )
)]
pub async fn list(State(state): State<ApiState>) -> Result<Json<Vec<AgentResponse>>, ApiError> {
    let agents = state.agents.list().await?;
    Ok(Json(agents.iter().map(AgentResponse::from).collect()))
}

/// Create an agent, or update the one with the same name
#[utoipa::path(
    post,
    path = "/api/v1/agents",
    tag = "Agents",
    request_body = UpsertAgentRequest,
    responses(
        (status = 200, description = "Agent stored", body = AgentResponse),
        (status = 400, description = "Validation error", body = ErrorResponse)
    )
)]
pub async fn upsert(
    State(state): State<ApiState>,
    Json(request): Json<UpsertAgentRequest>,
) -> Result<Json<AgentResponse>, ApiError> {
    let profile = request.into_profile().map_err(ApiError::ValidationError)?;
    let agent = state.agents.upsert(profile).await?;
    Ok(Json(AgentResponse::from(&agent)))
}

/// Every agent with its derived activity
#[utoipa::path(
    get,
    path = "/api/v1/agents/activity",
    tag = "Agents",
    responses(
        (status = 200, description = "Agents with working/waiting/idle activity", body = Vec<AgentActivityResponse>)
    )
)]
pub async fn activity(State(state): State<ApiState>) -> Json<Vec<AgentActivityResponse>> {
    let activity = state.agents.activity().await;
    Json(activity.iter().map(AgentActivityResponse::from).collect())
}
