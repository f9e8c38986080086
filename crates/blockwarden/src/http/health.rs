use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};

use super::AppState;

/// Version of the HTTP API the frontend is written against.
const API_VERSION: &str = "1.0.0";

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `GET /api/health`: 200 while the database answers, 500 otherwise.
pub async fn api_health(State(state): State<AppState>) -> Response {
    match state.store.health_check().await {
        Ok(()) => Json(json!({ "status": "ok", "timestamp": timestamp() })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": "Database unreachable" })),
            )
                .into_response()
        }
    }
}

/// `GET /health`: process liveness only.
pub async fn liveness() -> Json<Value> {
    Json(json!({ "status": "healthy", "timestamp": timestamp() }))
}

/// `GET /`
pub async fn banner() -> Json<Value> {
    Json(json!({
        "message": "Minecraft Fabric Server Manager API is running",
        "version": API_VERSION,
        "status": "healthy",
    }))
}
