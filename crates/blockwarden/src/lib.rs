//! # Blockwarden
//!
//! Administration panel backend for a Minecraft server.
//!
//! An agent mod running inside the game server streams player snapshots
//! over a WebSocket; Blockwarden keeps the latest snapshot per player in
//! memory and serves it, together with mod management, process control
//! and operator accounts, over an authenticated HTTP API.
//!
//! ```text
//! agent mod ──ws──→ transport → ingress → registry ←── HTTP API ←── operators
//!                                  ↑                      │
//!                                  └──── agent links ←────┘ (teleport)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use blockwarden::prelude::*;
//!
//! # async fn start() -> Result<(), BlockwardenError> {
//! let server = PanelServer::builder()
//!     .bind("0.0.0.0:3001")
//!     .agent_bind("0.0.0.0:3020")
//!     .jwt_secret("change-me")
//!     .db_path("data/blockwarden.db")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod agents;
pub mod config;
pub mod control;
mod error;
pub mod http;
mod ingress;
pub mod logging;
pub mod mods;
pub mod server;

pub use config::{AuthMode, EvictionMode, PanelConfig};
pub use error::BlockwardenError;
pub use server::{PanelServer, PanelServerBuilder, ServerSettings, shutdown_signal};

/// Everything needed to configure and run a panel.
pub mod prelude {
    pub use crate::config::{AuthMode, PanelConfig};
    pub use crate::control::{ControlError, ServerControl, ServerStatus, SystemctlControl};
    pub use crate::error::BlockwardenError;
    pub use crate::server::{PanelServer, PanelServerBuilder, ServerSettings};

    pub use blockwarden_auth::{Principal, RateLimitConfig, Role};
    pub use blockwarden_protocol::{AgentCommand, InventorySlot, PlayerId, PlayerState};
    pub use blockwarden_registry::EvictionPolicy;
}
