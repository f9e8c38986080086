//! Command-line and environment configuration.
//!
//! Every option can come from a flag or from an environment variable, so
//! the same binary runs under systemd (environment file) and by hand
//! (flags). Flags win.

use std::path::PathBuf;
use std::time::Duration;

use blockwarden_registry::EvictionPolicy;
use clap::{Parser, ValueEnum};

use crate::BlockwardenError;
use crate::mods::DEFAULT_MAX_MOD_SIZE;
use crate::server::ServerSettings;

/// How operators authenticate against the HTTP surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AuthMode {
    /// Stateless signed bearer tokens.
    #[default]
    Token,
    /// Server-side sessions referenced by a cookie (administrators only).
    Session,
}

/// `--player-eviction` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum EvictionMode {
    #[default]
    Retain,
    OnDisconnect,
    Ttl,
}

/// Blockwarden command line.
#[derive(Debug, Clone, Parser)]
#[command(name = "blockwarden", version, about = "Minecraft server administration panel")]
pub struct PanelConfig {
    /// HTTP listen address.
    #[arg(long, env = "PANEL_BIND", default_value = "0.0.0.0:3001")]
    pub bind: String,

    /// Agent WebSocket listen address.
    #[arg(long, env = "AGENT_BIND", default_value = "0.0.0.0:3020")]
    pub agent_bind: String,

    /// Secret used to sign operator tokens. Required.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Pre-shared key agents must present. Unset leaves the agent
    /// channel open to anyone who can reach it.
    #[arg(long, env = "AGENT_KEY", hide_env_values = true)]
    pub agent_key: Option<String>,

    #[arg(long, env = "AUTH_MODE", value_enum, default_value_t = AuthMode::Token)]
    pub auth_mode: AuthMode,

    /// SQLite database file.
    #[arg(long, env = "DB_PATH", default_value = "data/database.db")]
    pub db_path: PathBuf,

    /// Directory the game server loads mods from.
    #[arg(long, env = "MODS_PATH", default_value = "mods")]
    pub mods_path: PathBuf,

    /// Largest accepted mod upload, in bytes.
    #[arg(long, env = "MAX_MOD_SIZE", default_value_t = DEFAULT_MAX_MOD_SIZE)]
    pub max_mod_size: u64,

    /// Origin of the browser UI, allowed by CORS.
    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:5173")]
    pub frontend_url: String,

    /// Hide internal error details from HTTP responses.
    #[arg(long, env = "PANEL_PRODUCTION")]
    pub production: bool,

    #[arg(long, env = "PLAYER_EVICTION", value_enum, default_value_t = EvictionMode::Retain)]
    pub player_eviction: EvictionMode,

    /// Idle time before a player is dropped under `--player-eviction ttl`.
    #[arg(long, env = "PLAYER_TTL_SECS", default_value_t = 300)]
    pub player_ttl_secs: u64,

    /// systemd unit that runs the game server.
    #[arg(long, env = "SYSTEMD_UNIT", default_value = "minecraft-server")]
    pub systemd_unit: String,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, env = "JSON_LOGS")]
    pub json_logs: bool,
}

impl PanelConfig {
    /// Checks the configuration and turns it into runtime settings.
    ///
    /// # Errors
    /// [`BlockwardenError::Config`] if the signing secret is missing, the
    /// TTL is zero under TTL eviction, or the upload cap is zero.
    pub fn validate(self) -> Result<ServerSettings, BlockwardenError> {
        let jwt_secret = self
            .jwt_secret
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| BlockwardenError::Config("JWT_SECRET is not set".into()))?;

        let eviction = match self.player_eviction {
            EvictionMode::Retain => EvictionPolicy::Retain,
            EvictionMode::OnDisconnect => EvictionPolicy::OnDisconnect,
            EvictionMode::Ttl if self.player_ttl_secs == 0 => {
                return Err(BlockwardenError::Config(
                    "PLAYER_TTL_SECS must be positive for ttl eviction".into(),
                ));
            }
            EvictionMode::Ttl => EvictionPolicy::Ttl(Duration::from_secs(self.player_ttl_secs)),
        };

        if self.max_mod_size == 0 {
            return Err(BlockwardenError::Config("MAX_MOD_SIZE must be positive".into()));
        }

        Ok(ServerSettings {
            bind: self.bind,
            agent_bind: self.agent_bind,
            jwt_secret,
            agent_key: self.agent_key.filter(|k| !k.is_empty()),
            auth_mode: self.auth_mode,
            db_path: Some(self.db_path),
            mods_path: self.mods_path,
            max_mod_size: self.max_mod_size,
            frontend_url: self.frontend_url,
            production: self.production,
            eviction,
            systemd_unit: self.systemd_unit,
            ..ServerSettings::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> PanelConfig {
        let mut argv = vec!["blockwarden"];
        argv.extend_from_slice(args);
        PanelConfig::try_parse_from(argv).expect("valid args")
    }

    #[test]
    fn test_validate_missing_secret_returns_config_error() {
        let config = PanelConfig {
            jwt_secret: None,
            ..parse(&["--jwt-secret", "x"])
        };

        assert!(matches!(config.validate(), Err(BlockwardenError::Config(_))));
    }

    #[test]
    fn test_validate_blank_secret_returns_config_error() {
        assert!(parse(&["--jwt-secret", "  "]).validate().is_err());
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = parse(&["--jwt-secret", "s"]);

        assert_eq!(config.bind, "0.0.0.0:3001");
        assert_eq!(config.agent_bind, "0.0.0.0:3020");
        assert_eq!(config.auth_mode, AuthMode::Token);
        assert_eq!(config.max_mod_size, 104_857_600);
        assert_eq!(config.systemd_unit, "minecraft-server");

        let settings = config.validate().expect("valid");
        assert_eq!(settings.eviction, EvictionPolicy::Retain);
        assert_eq!(settings.agent_key, None);
    }

    #[test]
    fn test_validate_ttl_eviction_uses_ttl_secs() {
        let settings = parse(&[
            "--jwt-secret",
            "s",
            "--player-eviction",
            "ttl",
            "--player-ttl-secs",
            "30",
        ])
        .validate()
        .expect("valid");

        assert_eq!(settings.eviction, EvictionPolicy::Ttl(Duration::from_secs(30)));
    }

    #[test]
    fn test_validate_zero_ttl_returns_config_error() {
        let config = parse(&[
            "--jwt-secret",
            "s",
            "--player-eviction",
            "ttl",
            "--player-ttl-secs",
            "0",
        ]);

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_session_mode_and_on_disconnect() {
        let config = parse(&[
            "--jwt-secret",
            "s",
            "--auth-mode",
            "session",
            "--player-eviction",
            "on-disconnect",
        ]);

        assert_eq!(config.auth_mode, AuthMode::Session);
        assert_eq!(
            config.validate().expect("valid").eviction,
            EvictionPolicy::OnDisconnect
        );
    }
}
