//! The HTTP surface.
//!
//! Public routes (login, mock players, health) sit beside a protected
//! group that runs behind the [auth gate](gate::require_auth). Handlers
//! return `Result<_, ApiError>`; [`ApiError`] owns the status-code
//! mapping.

mod auth;
mod control;
mod error;
pub mod gate;
mod headers;
mod health;
mod mods;
mod players;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{delete, get, post};
use axum::{Router, middleware};
use blockwarden_auth::{AuthenticationStrategy, LoginRateLimiter};
use blockwarden_registry::LiveRegistry;
use blockwarden_store::Store;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

use crate::agents::AgentLinks;
use crate::config::AuthMode;
use crate::control::ServerControl;
use crate::mods::ModLibrary;

/// Extra room on top of the mod size cap for multipart framing.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Settings the handlers consult per request.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub auth_mode: AuthMode,
    /// Suppress internal error detail in responses.
    pub production: bool,
    pub password_cost: u32,
    pub frontend_origin: HeaderValue,
    /// Lifetime of the session cookie in session mode.
    pub session_ttl: Duration,
}

/// State shared by every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub registry: LiveRegistry,
    pub links: Arc<AgentLinks>,
    pub store: Store,
    pub auth: Arc<dyn AuthenticationStrategy>,
    pub limiter: Arc<LoginRateLimiter>,
    pub mods: ModLibrary,
    pub control: Arc<dyn ServerControl>,
    pub settings: Arc<HttpSettings>,
}

/// Builds the full router over `state`.
pub fn router(state: AppState) -> Router {
    let upload_limit = usize::try_from(state.mods.max_size())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let protected = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/change-password", post(auth::change_password))
        .route("/api/auth/users", get(auth::list_users))
        .route("/api/auth/register", post(auth::register))
        .route("/api/players", get(players::list))
        .route("/api/server/status", get(control::status))
        .route("/api/server/start", post(control::start))
        .route("/api/server/stop", post(control::stop))
        .route("/api/server/restart", post(control::restart))
        .route("/api/server/players/{uuid}/teleport", post(control::teleport))
        .route(
            "/api/mods",
            get(mods::list).post(mods::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/mods/{id}", delete(mods::remove))
        .route("/api/mods/{id}/toggle", post(mods::toggle))
        .route_layer(middleware::from_fn_with_state(state.clone(), gate::require_auth));

    let public = Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/players/mock", get(players::mock))
        .route("/api/health", get(health::api_health))
        .route("/health", get(health::liveness))
        .route("/", get(health::banner));

    let cors = CorsLayer::new()
        .allow_origin(state.settings.frontend_origin.clone())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let production = state.settings.production;
    let router = public.merge(protected).with_state(state);
    let router = if production {
        router
    } else {
        router.layer(middleware::from_fn(error::expose_internal_details))
    };

    headers::harden(router, production)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
