//! `PanelServer` builder and run loop.
//!
//! This is the entry point for running Blockwarden. It ties the layers
//! together: agent transport → ingress → registry ← HTTP surface, with
//! the store, auth strategy and process control hanging off the HTTP
//! state.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::HeaderValue;
use blockwarden_auth::{
    AuthenticationStrategy, LoginRateLimiter, PASSWORD_COST, RateLimitConfig, SessionConfig,
    SessionStrategy, TokenIssuer, TokenStrategy, hash_password,
};
use blockwarden_protocol::JsonCodec;
use blockwarden_registry::{EvictionPolicy, LiveRegistry, RegistryConfig};
use blockwarden_store::Store;
use blockwarden_transport::{Transport, TransportError, WebSocketTransport};
use tokio::net::TcpListener;

use crate::BlockwardenError;
use crate::agents::AgentLinks;
use crate::config::AuthMode;
use crate::control::{ServerControl, SystemctlControl};
use crate::http::{self, AppState, HttpSettings};
use crate::ingress::{AgentState, handle_agent};
use crate::mods::{DEFAULT_MAX_MOD_SIZE, ModLibrary};

/// Password the seeded `admin` account starts with.
const DEFAULT_ADMIN_PASSWORD: &str = "admin";

/// How often the housekeeping task runs when no TTL asks for more.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Everything the server needs to start.
///
/// Produced by [`PanelConfig::validate`](crate::config::PanelConfig::validate)
/// for the binary; tests fill it in directly.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind: String,
    pub agent_bind: String,
    pub jwt_secret: String,
    pub agent_key: Option<String>,
    pub auth_mode: AuthMode,
    /// Database file. `None` keeps the database in memory.
    pub db_path: Option<PathBuf>,
    pub mods_path: PathBuf,
    pub max_mod_size: u64,
    pub frontend_url: String,
    pub production: bool,
    pub eviction: EvictionPolicy,
    pub systemd_unit: String,
    /// bcrypt cost for passwords hashed by this server.
    pub password_cost: u32,
    pub rate_limit: RateLimitConfig,
    pub session: SessionConfig,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3001".to_string(),
            agent_bind: "127.0.0.1:3020".to_string(),
            jwt_secret: String::new(),
            agent_key: None,
            auth_mode: AuthMode::Token,
            db_path: None,
            mods_path: PathBuf::from("mods"),
            max_mod_size: DEFAULT_MAX_MOD_SIZE,
            frontend_url: "http://localhost:5173".to_string(),
            production: false,
            eviction: EvictionPolicy::Retain,
            systemd_unit: "minecraft-server".to_string(),
            password_cost: PASSWORD_COST,
            rate_limit: RateLimitConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Builder for configuring and starting a Blockwarden server.
///
/// # Example
///
/// ```rust,ignore
/// let server = PanelServer::builder()
///     .bind("0.0.0.0:3001")
///     .agent_bind("0.0.0.0:3020")
///     .jwt_secret("change-me")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct PanelServerBuilder {
    settings: ServerSettings,
    control: Option<Arc<dyn ServerControl>>,
}

impl PanelServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            settings: ServerSettings::default(),
            control: None,
        }
    }

    /// Replaces every setting at once.
    pub fn settings(mut self, settings: ServerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the HTTP listen address.
    pub fn bind(mut self, addr: &str) -> Self {
        self.settings.bind = addr.to_string();
        self
    }

    /// Sets the agent WebSocket listen address.
    pub fn agent_bind(mut self, addr: &str) -> Self {
        self.settings.agent_bind = addr.to_string();
        self
    }

    pub fn jwt_secret(mut self, secret: &str) -> Self {
        self.settings.jwt_secret = secret.to_string();
        self
    }

    pub fn agent_key(mut self, key: Option<&str>) -> Self {
        self.settings.agent_key = key.map(str::to_string);
        self
    }

    pub fn auth_mode(mut self, mode: AuthMode) -> Self {
        self.settings.auth_mode = mode;
        self
    }

    /// Opens the database at `path` instead of keeping it in memory.
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.db_path = Some(path.into());
        self
    }

    pub fn mods_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.mods_path = path.into();
        self
    }

    pub fn max_mod_size(mut self, bytes: u64) -> Self {
        self.settings.max_mod_size = bytes;
        self
    }

    pub fn production(mut self, production: bool) -> Self {
        self.settings.production = production;
        self
    }

    pub fn eviction(mut self, policy: EvictionPolicy) -> Self {
        self.settings.eviction = policy;
        self
    }

    pub fn password_cost(mut self, cost: u32) -> Self {
        self.settings.password_cost = cost;
        self
    }

    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.settings.rate_limit = config;
        self
    }

    /// Uses `control` instead of `systemctl` on the configured unit.
    pub fn control(mut self, control: impl ServerControl) -> Self {
        self.control = Some(Arc::new(control));
        self
    }

    /// Opens the store, binds both listeners and assembles the state.
    ///
    /// # Errors
    /// Fails if the signing secret is missing, the store can't be opened
    /// or migrated, the mods directory can't be created, or a listener
    /// can't bind.
    pub async fn build(self) -> Result<PanelServer, BlockwardenError> {
        let settings = self.settings;

        // Fatal before anything else touches the network or disk.
        let issuer = TokenIssuer::new(&settings.jwt_secret)?;

        let frontend_origin = HeaderValue::from_str(&settings.frontend_url).map_err(|e| {
            let url = &settings.frontend_url;
            BlockwardenError::Config(format!("invalid frontend url {url:?}: {e}"))
        })?;

        let sessions = match settings.auth_mode {
            AuthMode::Token => None,
            AuthMode::Session => Some(Arc::new(SessionStrategy::new(settings.session.clone()))),
        };
        let auth: Arc<dyn AuthenticationStrategy> = match &sessions {
            Some(sessions) => sessions.clone(),
            None => Arc::new(TokenStrategy::new(issuer)),
        };
        tracing::info!(strategy = auth.name(), "operator authentication configured");

        let store = match &settings.db_path {
            Some(path) => Store::connect(path).await?,
            None => Store::connect_in_memory().await?,
        };
        store.migrate().await?;
        let cost = settings.password_cost;
        let admin_hash =
            tokio::task::spawn_blocking(move || hash_password(DEFAULT_ADMIN_PASSWORD, cost))
                .await
                .map_err(|e| BlockwardenError::Config(format!("hashing task failed: {e}")))??;
        store.seed_default_admin(&admin_hash).await?;

        let mods = ModLibrary::new(&settings.mods_path, settings.max_mod_size, store.clone());
        mods.ensure_dir().await.map_err(|e| {
            BlockwardenError::Config(format!(
                "cannot prepare mods directory {}: {e}",
                settings.mods_path.display()
            ))
        })?;

        let registry = LiveRegistry::new(RegistryConfig {
            eviction: settings.eviction,
        });
        let links = Arc::new(AgentLinks::new());

        let transport = WebSocketTransport::bind(&settings.agent_bind)
            .await?
            .with_agent_key(settings.agent_key.clone());
        if !transport.requires_key() {
            tracing::warn!("AGENT_KEY not set: the agent socket accepts any connection");
        }

        let listener = TcpListener::bind(&settings.bind).await?;

        let control = self
            .control
            .unwrap_or_else(|| Arc::new(SystemctlControl::new(settings.systemd_unit.clone())));

        let app = AppState {
            registry: registry.clone(),
            links: Arc::clone(&links),
            store,
            auth,
            limiter: Arc::new(LoginRateLimiter::new(settings.rate_limit.clone())),
            mods,
            control,
            settings: Arc::new(HttpSettings {
                auth_mode: settings.auth_mode,
                production: settings.production,
                password_cost: settings.password_cost,
                frontend_origin,
                session_ttl: Duration::from_secs(settings.session.ttl_secs),
            }),
        };

        let agents = Arc::new(AgentState {
            registry,
            links,
            codec: JsonCodec,
        });

        Ok(PanelServer {
            listener,
            transport,
            app,
            agents,
            sessions,
        })
    }
}

impl Default for PanelServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A Blockwarden server with both listeners bound.
///
/// Call [`run()`](Self::run) to start serving.
pub struct PanelServer {
    listener: TcpListener,
    transport: WebSocketTransport,
    app: AppState,
    agents: Arc<AgentState<JsonCodec>>,
    sessions: Option<Arc<SessionStrategy>>,
}

impl PanelServer {
    /// Creates a new builder.
    pub fn builder() -> PanelServerBuilder {
        PanelServerBuilder::new()
    }

    /// Returns the address the HTTP surface is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Returns the address the agent socket is bound to.
    pub fn agent_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The shared HTTP state.
    pub fn state(&self) -> &AppState {
        &self.app
    }

    /// The HTTP router over this server's state.
    pub fn router(&self) -> Router {
        http::router(self.app.clone())
    }

    /// Runs until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), BlockwardenError> {
        self.run_until(shutdown_signal()).await
    }

    /// Runs until `shutdown` completes, then stops accepting, lets
    /// in-flight HTTP requests finish and closes the store.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), BlockwardenError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let http_addr = self.local_addr()?;
        let agent_addr = self.agent_addr()?;

        let accept_task = tokio::spawn(accept_agents(self.transport, Arc::clone(&self.agents)));
        let sweep_task = tokio::spawn(sweep(
            self.app.registry.clone(),
            Arc::clone(&self.app.limiter),
            self.sessions,
        ));

        tracing::info!(%http_addr, %agent_addr, "Blockwarden running");

        let app = http::router(self.app.clone());
        let served = axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await;

        accept_task.abort();
        sweep_task.abort();
        self.app.store.close().await;
        tracing::info!("Blockwarden stopped");

        served.map_err(BlockwardenError::Io)
    }
}

/// Accepts agent sockets and upgrades each one on its own task, so a peer
/// that stalls the handshake never holds up the next agent.
async fn accept_agents(transport: WebSocketTransport, state: Arc<AgentState<JsonCodec>>) {
    loop {
        let pending = match transport.accept_pending().await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(error = %e, "agent accept failed");
                continue;
            }
        };

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let peer = pending.peer_addr();
            let conn = match pending.upgrade().await {
                Ok(conn) => conn,
                Err(TransportError::Rejected(addr)) => {
                    tracing::warn!(%addr, "agent rejected: missing or wrong key");
                    return;
                }
                Err(e) => {
                    tracing::debug!(%peer, error = %e, "agent handshake failed");
                    return;
                }
            };
            if let Err(e) = handle_agent(conn, state).await {
                tracing::debug!(error = %e, "agent connection ended with error");
            }
        });
    }
}

/// Periodic housekeeping: expire idle players under TTL eviction, forget
/// aged-out login failures and expired legacy sessions.
async fn sweep(
    registry: LiveRegistry,
    limiter: Arc<LoginRateLimiter>,
    sessions: Option<Arc<SessionStrategy>>,
) {
    let period = registry
        .eviction()
        .ttl()
        .map(|ttl| (ttl / 2).clamp(Duration::from_secs(1), SWEEP_INTERVAL))
        .unwrap_or(SWEEP_INTERVAL);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let expired = registry.expire_stale();
        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "expired idle players");
        }
        limiter.purge();
        if let Some(sessions) = &sessions {
            let removed = sessions.cleanup_expired();
            if removed > 0 {
                tracing::debug!(removed, "expired sessions removed");
            }
        }
    }
}

/// Resolves on SIGINT or SIGTERM (Ctrl+C elsewhere).
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => tracing::info!("received SIGINT"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                }
            }
            _ => {
                tracing::error!("failed to install signal handlers, falling back to Ctrl+C");
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received Ctrl+C");
        } else {
            std::future::pending::<()>().await;
        }
    }
}
