//! Control of the Minecraft server process.
//!
//! The panel never supervises the game server itself. It asks the host's
//! service manager to do it, so the only state here is the unit name.

use std::fmt;
use std::process::Output;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;

/// Whether the game server is up, as reported by the service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Running,
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// The control program could not be started at all.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The control program ran and reported failure.
    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Starts, stops and inspects the game server.
#[async_trait]
pub trait ServerControl: Send + Sync + 'static {
    async fn status(&self) -> Result<ServerStatus, ControlError>;
    async fn start(&self) -> Result<(), ControlError>;
    async fn stop(&self) -> Result<(), ControlError>;
    async fn restart(&self) -> Result<(), ControlError>;
}

/// [`ServerControl`] backed by `systemctl <verb> <unit>`.
#[derive(Debug, Clone)]
pub struct SystemctlControl {
    program: String,
    unit: String,
}

impl SystemctlControl {
    pub fn new(unit: impl Into<String>) -> Self {
        Self::with_program("systemctl", unit)
    }

    /// Uses `program` in place of `systemctl`. It is invoked with the
    /// same arguments.
    pub fn with_program(program: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            unit: unit.into(),
        }
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    async fn run(&self, verb: Verb) -> Result<Output, ControlError> {
        let command = format!("{} {verb} {}", self.program, self.unit);
        tracing::debug!(%command, "running service command");
        Command::new(&self.program)
            .arg(verb.as_str())
            .arg(&self.unit)
            .output()
            .await
            .map_err(|source| ControlError::Spawn { command, source })
    }

    async fn run_checked(&self, verb: Verb) -> Result<(), ControlError> {
        let output = self.run(verb).await?;
        if output.status.success() {
            tracing::info!(unit = %self.unit, %verb, "service command succeeded");
            return Ok(());
        }
        Err(ControlError::Failed {
            command: format!("{} {verb} {}", self.program, self.unit),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[async_trait]
impl ServerControl for SystemctlControl {
    /// `is-active` exits non-zero for any state but active, so only the
    /// printed state is inspected.
    async fn status(&self) -> Result<ServerStatus, ControlError> {
        let output = self.run(Verb::IsActive).await?;
        let state = String::from_utf8_lossy(&output.stdout);
        Ok(if state.trim() == "active" {
            ServerStatus::Running
        } else {
            ServerStatus::Stopped
        })
    }

    async fn start(&self) -> Result<(), ControlError> {
        self.run_checked(Verb::Start).await
    }

    async fn stop(&self) -> Result<(), ControlError> {
        self.run_checked(Verb::Stop).await
    }

    async fn restart(&self) -> Result<(), ControlError> {
        self.run_checked(Verb::Restart).await
    }
}

#[derive(Debug, Clone, Copy)]
enum Verb {
    IsActive,
    Start,
    Stop,
    Restart,
}

impl Verb {
    fn as_str(self) -> &'static str {
        match self {
            Self::IsActive => "is-active",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_non_active_output_is_stopped() {
        // `echo is-active unit` prints something other than "active".
        let control = SystemctlControl::with_program("echo", "minecraft-server");

        assert_eq!(control.status().await.unwrap(), ServerStatus::Stopped);
    }

    #[tokio::test]
    async fn test_start_successful_command_returns_ok() {
        let control = SystemctlControl::with_program("true", "minecraft-server");

        assert!(control.start().await.is_ok());
    }

    #[tokio::test]
    async fn test_stop_failing_command_returns_failed() {
        let control = SystemctlControl::with_program("false", "minecraft-server");

        assert!(matches!(
            control.stop().await,
            Err(ControlError::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn test_restart_missing_program_returns_spawn_error() {
        let control =
            SystemctlControl::with_program("/nonexistent/blockwarden-ctl", "minecraft-server");

        let err = control.restart().await.unwrap_err();

        assert!(matches!(err, ControlError::Spawn { .. }));
        assert!(err.to_string().contains("restart minecraft-server"));
    }
}
