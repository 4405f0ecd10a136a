//! Integration tests for the REST API router
//!
//! Requests go straight through the axum router with `tower::ServiceExt::oneshot`,
//! so no port is bound. Each test gets a fresh in-memory store and a manual
//! clock.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use mission_control::clock::ManualClock;
use mission_control::config::Config;
use mission_control::rest::{build_router, ApiState};
use mission_control::store::MemoryStore;

// ─── Test Context ─────────────────────────────────────────────────────────────

struct TestApi {
    router: Router,
    clock: Arc<ManualClock>,
}

impl TestApi {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        ));
        let state = ApiState::new(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            Config::default(),
        );
        Self {
            router: build_router(state),
            clock,
        }
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    async fn create_template(&self) -> String {
        let (status, body) = self
            .post(
                "/api/v1/templates",
                json!({
                    "name": "Content Pipeline",
                    "steps": [
                        { "order": 1, "name": "Research", "agent_role": "researcher" },
                        { "order": 2, "name": "Draft", "agent_role": "writer" }
                    ]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn create_instance(&self, template_id: &str) -> String {
        let (status, body) = self
            .post(
                "/api/v1/instances",
                json!({ "template_id": template_id, "input": "topic: rust" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn active_step(&self, instance_id: &str) -> String {
        let (_, body) = self.get(&format!("/api/v1/instances/{instance_id}")).await;
        body["instance"]["active_step_id"]
            .as_str()
            .unwrap()
            .to_string()
    }
}

// ─── Health and status ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_endpoint() {
    let api = TestApi::new();
    let (status, body) = api.get("/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_daemon_status_unknown_then_online_then_offline() {
    let api = TestApi::new();

    let (_, body) = api.get("/api/v1/status/daemon").await;
    assert_eq!(body["status"], "unknown");
    assert!(body["updated_at"].is_null());

    let (status, body) = api
        .post(
            "/api/v1/status",
            json!({ "key": "daemon_health", "status": "online", "details": "Running" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["id"].is_string());

    let (_, body) = api.get("/api/v1/status/daemon").await;
    assert_eq!(body["status"], "online");
    assert_eq!(body["details"], "Running");

    api.clock.advance(Duration::seconds(181));
    let (_, body) = api.get("/api/v1/status/daemon_health").await;
    assert_eq!(body["status"], "offline");
}

#[tokio::test]
async fn test_status_upsert_requires_key() {
    let api = TestApi::new();
    let (status, body) = api
        .post("/api/v1/status", json!({ "key": "", "status": "online" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

// ─── Workflow ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_full_workflow_over_http() {
    let api = TestApi::new();
    let template_id = api.create_template().await;
    let instance_id = api.create_instance(&template_id).await;

    let (_, pending) = api.get("/api/v1/steps/pending").await;
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let step_id = api.active_step(&instance_id).await;

    let (status, body) = api
        .post(
            &format!("/api/v1/steps/{step_id}/claim"),
            json!({ "agent_role": "researcher" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "agent_working");

    let (status, body) = api
        .post(
            &format!("/api/v1/steps/{step_id}/submit"),
            json!({ "output": "notes" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "awaiting_review");

    let (_, review) = api.get("/api/v1/steps/awaiting-review").await;
    assert_eq!(review.as_array().unwrap().len(), 1);

    let (status, body) = api
        .post(&format!("/api/v1/steps/{step_id}/approve"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["advanced"], true);
    assert_eq!(body["instance"]["current_step"], 2);
    assert_eq!(body["instance"]["status"], "active");

    let next_id = api.active_step(&instance_id).await;
    api.post(
        &format!("/api/v1/steps/{next_id}/claim"),
        json!({ "agent_role": "writer" }),
    )
    .await;
    api.post(
        &format!("/api/v1/steps/{next_id}/submit"),
        json!({ "output": "draft" }),
    )
    .await;
    let (_, body) = api
        .post(&format!("/api/v1/steps/{next_id}/approve"), json!({}))
        .await;
    assert_eq!(body["instance"]["status"], "completed");

    let (_, steps) = api
        .get(&format!("/api/v1/instances/{instance_id}/steps"))
        .await;
    assert_eq!(steps.as_array().unwrap().len(), 2);

    let (_, completed) = api.get("/api/v1/instances?status=completed").await;
    assert_eq!(completed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_reject_requires_reason_and_queues_retry() {
    let api = TestApi::new();
    let template_id = api.create_template().await;
    let instance_id = api.create_instance(&template_id).await;
    let step_id = api.active_step(&instance_id).await;

    api.post(
        &format!("/api/v1/steps/{step_id}/claim"),
        json!({ "agent_role": "researcher" }),
    )
    .await;
    api.post(
        &format!("/api/v1/steps/{step_id}/submit"),
        json!({ "output": "thin" }),
    )
    .await;

    let (status, _) = api
        .post(
            &format!("/api/v1/steps/{step_id}/reject"),
            json!({ "reason": "   " }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = api
        .post(
            &format!("/api/v1/steps/{step_id}/reject"),
            json!({ "reason": "needs sources" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let retry_id = body["retry_step_id"].as_str().unwrap().to_string();
    assert_eq!(api.active_step(&instance_id).await, retry_id);

    let (_, retry) = api.get(&format!("/api/v1/steps/{retry_id}")).await;
    assert_eq!(retry["attempt"], 2);
    assert_eq!(retry["feedback"], "needs sources");

    let (_, instance) = api.get(&format!("/api/v1/instances/{instance_id}")).await;
    assert_eq!(instance["instance"]["current_step"], 1);
    assert_eq!(instance["instance"]["total_steps"], 2);
}

#[tokio::test]
async fn test_advance_before_approval_conflicts() {
    let api = TestApi::new();
    let template_id = api.create_template().await;
    let instance_id = api.create_instance(&template_id).await;

    let (status, body) = api
        .post(&format!("/api/v1/instances/{instance_id}/advance"), json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_state");
}

#[tokio::test]
async fn test_paused_instance_approves_without_advancing() {
    let api = TestApi::new();
    let template_id = api.create_template().await;
    let instance_id = api.create_instance(&template_id).await;
    let step_id = api.active_step(&instance_id).await;

    api.post(
        &format!("/api/v1/steps/{step_id}/claim"),
        json!({ "agent_role": "researcher" }),
    )
    .await;
    api.post(&format!("/api/v1/steps/{step_id}/submit"), json!({}))
        .await;

    let (status, body) = api
        .post(&format!("/api/v1/instances/{instance_id}/pause"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paused_for_review");

    let (_, body) = api
        .post(&format!("/api/v1/steps/{step_id}/approve"), json!({}))
        .await;
    assert_eq!(body["advanced"], false);
    assert_eq!(body["instance"]["current_step"], 1);

    api.post(&format!("/api/v1/instances/{instance_id}/resume"), json!({}))
        .await;
    let (status, body) = api
        .post(&format!("/api/v1/instances/{instance_id}/advance"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["current_step"], 2);
}

#[tokio::test]
async fn test_approve_without_advance_keeps_cursor() {
    let api = TestApi::new();
    let template_id = api.create_template().await;
    let instance_id = api.create_instance(&template_id).await;
    let step_id = api.active_step(&instance_id).await;

    api.post(
        &format!("/api/v1/steps/{step_id}/claim"),
        json!({ "agent_role": "researcher" }),
    )
    .await;
    api.post(&format!("/api/v1/steps/{step_id}/submit"), json!({}))
        .await;

    let (status, body) = api
        .post(
            &format!("/api/v1/steps/{step_id}/approve"),
            json!({ "advance": false }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["advanced"], false);
    assert_eq!(body["step"]["status"], "approved");
    assert_eq!(body["instance"]["current_step"], 1);
    assert_eq!(body["instance"]["status"], "active");

    let (status, body) = api
        .post(&format!("/api/v1/instances/{instance_id}/advance"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["current_step"], 2);
}

#[tokio::test]
async fn test_unknown_ids_return_not_found() {
    let api = TestApi::new();
    let missing = uuid::Uuid::new_v4();

    let (status, body) = api.get(&format!("/api/v1/instances/{missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = api
        .post("/api/v1/instances", json!({ "template_id": missing }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = api.get(&format!("/api/v1/steps/{missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_instance() {
    let api = TestApi::new();
    let template_id = api.create_template().await;
    let instance_id = api.create_instance(&template_id).await;

    let (status, _) = api
        .send(
            Method::DELETE,
            &format!("/api/v1/instances/{instance_id}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = api.get(&format!("/api/v1/instances/{instance_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_status_filter_is_bad_request() {
    let api = TestApi::new();
    let (status, _) = api.get("/api/v1/instances?status=paused").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ─── Agents ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_agent_activity_endpoint() {
    let api = TestApi::new();

    let (status, body) = api
        .post(
            "/api/v1/agents",
            json!({ "name": "Ada", "role": "Researcher", "agent_role": "researcher" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["agent_type"], "agent");

    let template_id = api.create_template().await;
    let instance_id = api.create_instance(&template_id).await;
    let step_id = api.active_step(&instance_id).await;

    let (_, body) = api.get("/api/v1/agents/activity").await;
    assert_eq!(body[0]["activity"], "idle");

    api.post(
        &format!("/api/v1/steps/{step_id}/claim"),
        json!({ "agent_role": "researcher" }),
    )
    .await;

    let (_, body) = api.get("/api/v1/agents/activity").await;
    assert_eq!(body[0]["name"], "Ada");
    assert_eq!(body[0]["activity"], "working");
}

#[tokio::test]
async fn test_openapi_document_served() {
    let api = TestApi::new();
    let (status, body) = api.get("/api-docs/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"]["title"], "Mission Control API");
}
