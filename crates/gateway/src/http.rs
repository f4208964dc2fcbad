//! Axum surface for the concierge.
//!
//! Two routes: `POST /v1/concierge` and `GET /health`. Transport-level
//! failures map to HTTP status codes (401/403/429); everything past the
//! access checks comes back as `200` with a coherent concierge answer,
//! never a bare error code.

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use wayfarer_config::ConciergeConfig;
use wayfarer_core::error::Error;
use wayfarer_core::query::{ConciergeRequest, ConciergeResponse};

use crate::handler::ConciergeGateway;

const BLOCKED_ANSWER: &str =
    "I can't help with that request. If you think this is a mistake, try rephrasing it.";
const UNAVAILABLE_ANSWER: &str =
    "I'm having trouble answering right now. Please try again in a moment.";

/// Build the Axum router with all concierge routes.
pub fn build_router(gateway: Arc<ConciergeGateway>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/concierge", post(concierge_handler))
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB body limit
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(gateway)
}

/// Start the concierge HTTP server.
pub async fn serve(config: &ConciergeConfig, gateway: Arc<ConciergeGateway>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let app = build_router(gateway);

    info!(addr = %addr, "Concierge gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reset_at: Option<chrono::DateTime<chrono::Utc>>,
}

async fn concierge_handler(
    State(gateway): State<Arc<ConciergeGateway>>,
    Json(request): Json<ConciergeRequest>,
) -> Response {
    match gateway.invoke(request).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(e: Error) -> Response {
    match e {
        Error::Unauthenticated => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse { error: e.to_string(), reset_at: None }),
        )
            .into_response(),
        Error::NotAMember { .. } => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse { error: "You are not a member of this trip.".into(), reset_at: None }),
        )
            .into_response(),
        Error::RateLimited { reset_at } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorResponse { error: e.to_string(), reset_at: Some(reset_at) }),
        )
            .into_response(),
        // A blocked request still gets a coherent concierge answer
        Error::GuardrailBlocked { .. } => Json(ConciergeResponse {
            answer: BLOCKED_ANSWER.into(),
            sources_used: Vec::new(),
            requires_confirmation: false,
            action_descriptor: None,
            degraded: false,
        })
        .into_response(),
        other => {
            error!(error = %other, "Concierge pipeline failed");
            Json(ConciergeResponse {
                answer: UNAVAILABLE_ANSWER.into(),
                sources_used: Vec::new(),
                requires_confirmation: false,
                action_descriptor: None,
                degraded: true,
            })
            .into_response()
        }
    }
}
