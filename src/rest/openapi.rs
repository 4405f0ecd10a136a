//! OpenAPI specification builder using utoipa.

use utoipa::OpenApi;

use crate::rest::dto::{
    AgentActivityResponse, AgentResponse, ApproveStepRequest, ApproveStepResponse,
    ClaimStepRequest, CreateInstanceRequest, CreateInstanceResponse, CreateTemplateRequest,
    HealthResponse, InstanceDetailResponse, InstanceResponse, InstanceSummaryResponse,
    RejectStepRequest, RejectStepResponse, StatusReadingResponse, StepResponse, StepSpecDto,
    SubmitStepRequest, TemplateResponse, UpsertAgentRequest, UpsertStatusRequest,
    UpsertStatusResponse,
};
use crate::rest::error::ErrorResponse;

/// OpenAPI documentation for the Mission Control REST API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mission Control API",
        version = "0.1.0",
        description = "REST API for workflow orchestration, agent activity, and system health.",
        license(name = "MIT")
    ),
    paths(
        // Health endpoint
        crate::rest::routes::health::health,
        // Status endpoints
        crate::rest::routes::status::list,
        crate::rest::routes::status::upsert,
        crate::rest::routes::status::daemon,
        crate::rest::routes::status::get_one,
        // Agent endpoints
        crate::rest::routes::agents::list,
        crate::rest::routes::agents::upsert,
        crate::rest::routes::agents::activity,
        // Template endpoints
        crate::rest::routes::templates::list,
        crate::rest::routes::templates::get_one,
        crate::rest::routes::templates::create,
        // Instance endpoints
        crate::rest::routes::instances::list,
        crate::rest::routes::instances::create,
        crate::rest::routes::instances::get_one,
        crate::rest::routes::instances::delete,
        crate::rest::routes::instances::steps,
        crate::rest::routes::instances::advance,
        crate::rest::routes::instances::pause,
        crate::rest::routes::instances::resume,
        crate::rest::routes::instances::cancel,
        // Step endpoints
        crate::rest::routes::steps::pending,
        crate::rest::routes::steps::awaiting_review,
        crate::rest::routes::steps::get_one,
        crate::rest::routes::steps::claim,
        crate::rest::routes::steps::submit,
        crate::rest::routes::steps::approve,
        crate::rest::routes::steps::reject,
    ),
    components(
        schemas(
            // Response types
            HealthResponse,
            StatusReadingResponse,
            UpsertStatusResponse,
            AgentResponse,
            AgentActivityResponse,
            TemplateResponse,
            StepSpecDto,
            CreateInstanceResponse,
            InstanceResponse,
            InstanceSummaryResponse,
            InstanceDetailResponse,
            StepResponse,
            ApproveStepResponse,
            RejectStepResponse,
            ErrorResponse,
            // Request types
            UpsertStatusRequest,
            UpsertAgentRequest,
            CreateTemplateRequest,
            CreateInstanceRequest,
            ClaimStepRequest,
            SubmitStepRequest,
            ApproveStepRequest,
            RejectStepRequest,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Status", description = "System status registry with staleness"),
        (name = "Agents", description = "Agent roster and derived activity"),
        (name = "Templates", description = "Workflow template management"),
        (name = "Instances", description = "Workflow instance lifecycle"),
        (name = "Steps", description = "Step claims, submissions, and reviews"),
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate the OpenAPI specification as a JSON string
    pub fn json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }

    /// Generate the OpenAPI specification as a YAML string
    pub fn yaml() -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&Self::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generates() {
        let spec = ApiDoc::json().expect("Failed to generate OpenAPI spec");
        assert!(spec.contains("Mission Control API"));
        assert!(spec.contains("/api/v1/health"));
        assert!(spec.contains("/api/v1/instances/{id}/advance"));
        assert!(spec.contains("/api/v1/steps/{id}/reject"));
    }

    #[test]
    fn test_openapi_has_all_tags() {
        let spec = ApiDoc::json().expect("Failed to generate OpenAPI spec");
        for tag in ["Health", "Status", "Agents", "Templates", "Instances", "Steps"] {
            assert!(spec.contains(&format!("\"{tag}\"")), "missing tag {tag}");
        }
    }

    #[test]
    fn test_openapi_yaml() {
        let yaml = ApiDoc::yaml().expect("Failed to generate OpenAPI YAML");
        assert!(yaml.contains("Mission Control API"));
    }
}
