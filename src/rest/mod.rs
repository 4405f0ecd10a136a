//! REST API for mission control.
//!
//! Exposes the status registry, agent roster, and workflow coordinator over
//! HTTP for the dashboard and for external reporters.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::ApiState;

/// Default port for the REST API server
pub const DEFAULT_PORT: u16 = 7008;

/// Build the API router with all routes
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health endpoint
        .route("/api/v1/health", get(routes::health::health))
        // Status registry endpoints
        .route(
            "/api/v1/status",
            get(routes::status::list).post(routes::status::upsert),
        )
        .route("/api/v1/status/daemon", get(routes::status::daemon))
        .route("/api/v1/status/:key", get(routes::status::get_one))
        // Agent endpoints
        .route(
            "/api/v1/agents",
            get(routes::agents::list).post(routes::agents::upsert),
        )
        .route("/api/v1/agents/activity", get(routes::agents::activity))
        // Template endpoints
        .route(
            "/api/v1/templates",
            get(routes::templates::list).post(routes::templates::create),
        )
        .route("/api/v1/templates/:id", get(routes::templates::get_one))
        // Instance endpoints
        .route(
            "/api/v1/instances",
            get(routes::instances::list).post(routes::instances::create),
        )
        .route(
            "/api/v1/instances/:id",
            get(routes::instances::get_one).delete(routes::instances::delete),
        )
        .route("/api/v1/instances/:id/steps", get(routes::instances::steps))
        .route(
            "/api/v1/instances/:id/advance",
            post(routes::instances::advance),
        )
        .route("/api/v1/instances/:id/pause", post(routes::instances::pause))
        .route(
            "/api/v1/instances/:id/resume",
            post(routes::instances::resume),
        )
        .route(
            "/api/v1/instances/:id/cancel",
            post(routes::instances::cancel),
        )
        // Step endpoints
        .route("/api/v1/steps/pending", get(routes::steps::pending))
        .route(
            "/api/v1/steps/awaiting-review",
            get(routes::steps::awaiting_review),
        )
        .route("/api/v1/steps/:id", get(routes::steps::get_one))
        .route("/api/v1/steps/:id/claim", post(routes::steps::claim))
        .route("/api/v1/steps/:id/submit", post(routes::steps::submit))
        .route("/api/v1/steps/:id/approve", post(routes::steps::approve))
        .route("/api/v1/steps/:id/reject", post(routes::steps::reject))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind a listener for the API server
pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid API address {host}:{port}"))?;
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind REST API to {addr}"))
}

/// Serve the API on an already-bound listener until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    state: ApiState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = build_router(state);

    tracing::info!("REST API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
