//! `/api/auth/*`: login, logout, password change, user management.

use std::net::SocketAddr;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Extension, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use blockwarden_auth::{Principal, Role, hash_password, verify_password};
use blockwarden_store::{NewAuditEntry, NewUser, UserRecord};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::gate::{SESSION_COOKIE, credential_from};
use super::{ApiError, AppState};
use crate::config::AuthMode;

const MAX_USERNAME_LEN: usize = 50;
const MAX_PASSWORD_LEN: usize = 200;
const MIN_NEW_PASSWORD_LEN: usize = 6;

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    id: i64,
    username: String,
    is_admin: bool,
    must_change_password: bool,
    created_at: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    token: String,
    user: UserView,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    current_password: Option<String>,
    #[serde(default)]
    new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    is_admin: bool,
}

/// A user as listed or created: no hash, no timestamps.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    id: i64,
    username: String,
    is_admin: bool,
}

/// Treats an absent or empty string as missing.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

/// `POST /api/auth/login`
///
/// Throttled per source address before anything else is checked. The
/// attempt holds a limiter slot from the start; only a successful login or
/// a server-side failure gives it back.
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let ip = peer.ip();
    state.limiter.try_acquire(ip)?;

    let outcome = attempt_login(&state, body).await;
    match &outcome {
        Ok(principal) => {
            tracing::info!(username = %principal.username, %ip, "login succeeded");
            state.limiter.release(ip);
        }
        Err(ApiError::BadRequest(_) | ApiError::Unauthorized(_)) => {
            tracing::warn!(%ip, "login failed");
        }
        Err(_) => state.limiter.release(ip),
    }
    let principal = outcome?;

    let user = state
        .store
        .find_user_by_id(principal.id)
        .await?
        .ok_or_else(|| ApiError::internal("user vanished during login"))?;
    let credential = state.auth.establish(&principal)?;

    let ip_text = ip.to_string();
    if let Err(e) = state
        .store
        .record_audit(NewAuditEntry {
            user_id: Some(user.id),
            action: "login",
            ip_address: Some(&ip_text),
            ..Default::default()
        })
        .await
    {
        tracing::warn!(error = %e, "failed to write audit entry");
    }

    let mut response = Json(LoginResponse {
        token: credential.clone(),
        user: user_view(&user),
    })
    .into_response();

    if state.settings.auth_mode == AuthMode::Session {
        let cookie = format!(
            "{SESSION_COOKIE}={credential}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
            state.settings.session_ttl.as_secs(),
            if state.settings.production { "; Secure" } else { "" }
        );
        let value =
            HeaderValue::from_str(&cookie).map_err(|e| ApiError::internal(format!("cookie: {e}")))?;
        response.headers_mut().insert(header::SET_COOKIE, value);
    }

    Ok(response)
}

/// Validates the body and the credentials. Returns the principal on
/// success.
async fn attempt_login(
    state: &AppState,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Principal, ApiError> {
    let Json(body) = body?;
    let (Some(username), Some(password)) = (present(body.username), present(body.password)) else {
        return Err(ApiError::BadRequest("Username and password are required".into()));
    };
    if username.len() > MAX_USERNAME_LEN || password.len() > MAX_PASSWORD_LEN {
        return Err(ApiError::BadRequest("Invalid input length".into()));
    }

    let invalid = || ApiError::Unauthorized("Invalid username or password".into());

    let user = state.store.find_user_by_username(&username).await?.ok_or_else(invalid)?;

    let hash = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await??;
    if !matches {
        state.store.record_login_failure(user.id).await?;
        return Err(invalid());
    }

    state.store.record_login_success(user.id).await?;
    Ok(principal_of(&user))
}

fn principal_of(user: &UserRecord) -> Principal {
    Principal {
        id: user.id,
        username: user.username.clone(),
        role: Role::from_admin_flag(user.is_admin),
        must_change_password: user.must_change_password,
    }
}

fn user_view(user: &UserRecord) -> UserView {
    UserView {
        id: user.id,
        username: user.username.clone(),
        is_admin: user.is_admin,
        must_change_password: user.must_change_password,
        created_at: user.created_at.clone(),
    }
}

// ---------------------------------------------------------------------------
// Logout
// ---------------------------------------------------------------------------

/// `POST /api/auth/logout`
///
/// Revokes the presented credential. Tokens can't be revoked and simply
/// expire; sessions are deleted and the cookie is cleared.
pub async fn logout(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
) -> Response {
    if let Some(credential) = credential_from(&headers) {
        state.auth.revoke(&credential);
    }
    tracing::info!(username = %principal.username, "logged out");

    let mut response = Json(json!({ "message": "Logged out successfully" })).into_response();
    if state.settings.auth_mode == AuthMode::Session {
        let clear = HeaderValue::from_static("blockwarden.sid=; Path=/; HttpOnly; Max-Age=0");
        response.headers_mut().insert(header::SET_COOKIE, clear);
    }
    response
}

// ---------------------------------------------------------------------------
// Password change
// ---------------------------------------------------------------------------

/// `POST /api/auth/change-password`
pub async fn change_password(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(body) = body?;
    let (Some(current), Some(new)) = (present(body.current_password), present(body.new_password))
    else {
        return Err(ApiError::BadRequest(
            "Current password and new password are required".into(),
        ));
    };
    if new.len() < MIN_NEW_PASSWORD_LEN {
        return Err(ApiError::BadRequest(
            "New password must be at least 6 characters long".into(),
        ));
    }

    let user = state
        .store
        .find_user_by_id(principal.id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    let hash = user.password_hash;
    let cost = state.settings.password_cost;
    let new_hash = tokio::task::spawn_blocking(move || {
        if verify_password(&current, &hash)? {
            hash_password(&new, cost).map(Some)
        } else {
            Ok(None)
        }
    })
    .await??
    .ok_or_else(|| ApiError::Unauthorized("Current password is incorrect".into()))?;

    state.store.update_password(principal.id, &new_hash).await?;
    tracing::info!(username = %principal.username, "password changed");

    Ok(Json(json!({ "message": "Password updated successfully" })))
}

// ---------------------------------------------------------------------------
// User management
// ---------------------------------------------------------------------------

/// `GET /api/auth/users`
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let users: Vec<UserSummary> = state
        .store
        .list_users()
        .await?
        .into_iter()
        .map(|u| UserSummary {
            id: u.id,
            username: u.username,
            is_admin: u.is_admin,
        })
        .collect();
    Ok(Json(json!({ "users": users })))
}

/// `POST /api/auth/register` (administrators only)
pub async fn register(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<UserSummary>, ApiError> {
    if !principal.is_admin() {
        return Err(ApiError::Unauthorized("Administrator privileges required".into()));
    }

    let Json(body) = body?;
    let (Some(username), Some(password)) = (present(body.username), present(body.password)) else {
        return Err(ApiError::BadRequest("Username and password are required".into()));
    };
    if username.len() > MAX_USERNAME_LEN || password.len() > MAX_PASSWORD_LEN {
        return Err(ApiError::BadRequest("Invalid input length".into()));
    }

    let cost = state.settings.password_cost;
    let hash = tokio::task::spawn_blocking(move || hash_password(&password, cost)).await??;

    let id = state
        .store
        .insert_user(NewUser {
            username: &username,
            password_hash: &hash,
            is_admin: body.is_admin,
            must_change_password: false,
        })
        .await?;

    tracing::info!(by = %principal.username, %username, is_admin = body.is_admin, "user created");
    Ok(Json(UserSummary {
        id,
        username,
        is_admin: body.is_admin,
    }))
}
