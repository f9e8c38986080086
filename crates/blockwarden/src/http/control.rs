//! `/api/server/*`: game server process control and player commands.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use blockwarden_auth::Principal;
use blockwarden_protocol::{AgentCommand, PlayerId};
use serde_json::{Value, json};

use super::{ApiError, AppState};

/// `GET /api/server/status`
pub async fn status(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let status = state
        .control
        .status()
        .await
        .map_err(|e| ApiError::control("Failed to get server status", e))?;
    Ok(Json(json!({ "status": status })))
}

/// `POST /api/server/start`
pub async fn start(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Value>, ApiError> {
    state
        .control
        .start()
        .await
        .map_err(|e| ApiError::control("Failed to start server", e))?;
    tracing::info!(by = %principal.username, "minecraft server started");
    Ok(Json(json!({ "success": true, "message": "Minecraft server started" })))
}

/// `POST /api/server/stop`
pub async fn stop(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Value>, ApiError> {
    state
        .control
        .stop()
        .await
        .map_err(|e| ApiError::control("Failed to stop server", e))?;
    tracing::info!(by = %principal.username, "minecraft server stopped");
    Ok(Json(json!({ "success": true, "message": "Minecraft server stopped" })))
}

/// `POST /api/server/restart`
pub async fn restart(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Value>, ApiError> {
    state
        .control
        .restart()
        .await
        .map_err(|e| ApiError::control("Failed to restart server", e))?;
    tracing::info!(by = %principal.username, "minecraft server restarted");
    Ok(Json(json!({ "success": true, "message": "Minecraft server restarted" })))
}

/// `POST /api/server/players/{uuid}/teleport`
///
/// Body `{"x": <number>, "y": <number>, "z": <number>}`. The command is
/// routed to the agent connection that last reported the player.
pub async fn teleport(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(uuid): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let invalid = || ApiError::BadRequest("Invalid coordinates".into());
    let Json(body) = body.map_err(|_| invalid())?;
    let coord = |axis: &str| body.get(axis).and_then(Value::as_f64).ok_or_else(invalid);
    let (x, y, z) = (coord("x")?, coord("y")?, coord("z")?);

    let player = PlayerId(uuid);
    let not_found = || ApiError::NotFound("Player not connected".into());
    let target = state.registry.get(&player).ok_or_else(not_found)?.name;

    state
        .links
        .send(&player, AgentCommand::Teleport { target, x, y, z })
        .map_err(|e| {
            tracing::warn!(%player, error = %e, "teleport not delivered");
            not_found()
        })?;

    let command = format!("tp {player} {x} {y} {z}");
    tracing::info!(by = %principal.username, %command, "teleport sent");
    Ok(Json(json!({ "success": true, "command": command })))
}
