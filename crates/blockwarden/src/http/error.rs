//! HTTP error responses.

use std::time::Duration;

use axum::Json;
use axum::extract::Request;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use blockwarden_auth::AuthError;
use blockwarden_store::StoreError;
use serde_json::json;

use crate::control::ControlError;
use crate::mods::ModError;

/// Every way a handler can fail, mapped to one status code each.
///
/// Bodies are always `{"error": "<message>"}`; process-control failures
/// add `"details"`.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed body, oversized field, bad id. 400.
    BadRequest(String),
    /// No credential, wrong password, insufficient role. 401.
    Unauthorized(String),
    /// Credential present but invalid or expired. 403.
    Forbidden(String),
    /// 404.
    NotFound(String),
    /// Too many failed logins. 429 with `Retry-After`.
    RateLimited { retry_after: Duration },
    /// A process-control command failed. 500 with its output as details.
    Control { error: String, details: String },
    /// Anything unexpected. 500. `detail` is logged, and only echoed to
    /// the client outside production.
    Internal { message: String, detail: String },
}

impl ApiError {
    pub fn internal(detail: impl ToString) -> Self {
        Self::Internal {
            message: "Internal server error".to_string(),
            detail: detail.to_string(),
        }
    }

    /// A failed process-control action: `error` says what was
    /// attempted, the command's own error becomes the details.
    pub fn control(error: &str, e: ControlError) -> Self {
        Self::Control {
            error: error.to_string(),
            details: e.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Control { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Internal error detail, carried on the response for
/// [`expose_internal_details`] to pick up.
#[derive(Debug, Clone)]
struct InternalDetail {
    message: String,
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::BadRequest(error)
            | Self::Unauthorized(error)
            | Self::Forbidden(error)
            | Self::NotFound(error) => (status, Json(json!({ "error": error }))).into_response(),
            Self::RateLimited { retry_after } => {
                let secs = retry_after.as_secs().max(1);
                let mut response = (
                    status,
                    Json(json!({ "error": "Too many login attempts, please try again later" })),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs));
                response
            }
            Self::Control { error, details } => {
                tracing::error!(%error, %details, "server control failed");
                (status, Json(json!({ "error": error, "details": details }))).into_response()
            }
            Self::Internal { message, detail } => {
                tracing::error!(%message, %detail, "internal error");
                let mut response = (status, Json(json!({ "error": message }))).into_response();
                response
                    .extensions_mut()
                    .insert(InternalDetail { message, detail });
                response
            }
        }
    }
}

/// Rewrites internal error bodies to include their detail. Installed
/// only when not running in production.
pub(crate) async fn expose_internal_details(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    match response.extensions_mut().remove::<InternalDetail>() {
        Some(InternalDetail { message, detail }) => (
            response.status(),
            Json(json!({ "error": message, "details": detail })),
        )
            .into_response(),
        None => response,
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingCredential => Self::Unauthorized("Access token required".into()),
            AuthError::InvalidCredential(_) => Self::Forbidden("Invalid or expired token".into()),
            AuthError::Unauthorized(_) => Self::Unauthorized("Unauthorized".into()),
            AuthError::RateLimited { retry_after } => Self::RateLimited { retry_after },
            AuthError::Config(_) | AuthError::Hash(_) => Self::internal(e),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateUsername(_) => Self::BadRequest("Username already exists".into()),
            other => Self::internal(other),
        }
    }
}

impl From<ModError> for ApiError {
    fn from(e: ModError) -> Self {
        match e {
            ModError::MissingFile | ModError::NotAJar | ModError::TooLarge { .. } => {
                Self::BadRequest(e.to_string())
            }
            ModError::NotFound => Self::NotFound(e.to_string()),
            ModError::Io(_) | ModError::Store(_) => Self::internal(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::internal(e)
    }
}
