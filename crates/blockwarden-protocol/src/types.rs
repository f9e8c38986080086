//! Core types for the agent wire format.
//!
//! Every type here is serialized to JSON and crosses the socket between
//! the panel and the game-side agent, or is returned verbatim by the
//! player listing endpoint. Field names therefore match what the agent
//! mod sends: `uuid`, `name`, `x`, `y`, `z`, `inventory`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The opaque identifier the agent uses for a player (a Minecraft UUID
/// string in practice, but the panel never parses it).
///
/// Newtype over `String` so a player id can't be confused with a
/// username or a mod filename. `#[serde(transparent)]` keeps the wire
/// form a bare string.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ---------------------------------------------------------------------------
// PlayerState: agent → panel
// ---------------------------------------------------------------------------

/// One inventory stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySlot {
    /// Slot index inside the player inventory.
    pub slot: u32,
    /// Namespaced item identifier, e.g. `minecraft:cobblestone`.
    pub id: String,
    /// Stack size.
    pub count: u32,
}

/// The last-known state of one player, exactly as the agent reported it.
///
/// A new `PlayerState` always replaces the previous one for the same
/// `uuid`: fields are never merged.
///
/// The agent mod currently omits `inventory`, so it defaults to empty.
/// Coordinates default to the origin when absent; `uuid` and `name` are
/// required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub uuid: PlayerId,
    pub name: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub inventory: Vec<InventorySlot>,
}

impl PlayerState {
    /// Checks the rules serde can't express: the identifier and the
    /// display name must be non-empty.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] naming the empty field.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.uuid.0.trim().is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "player uuid must not be empty".into(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "player name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AgentCommand: panel → agent
// ---------------------------------------------------------------------------

/// Commands the panel pushes down to the agent.
///
/// Internally tagged (`#[serde(tag = "type")]`) because the agent mod
/// dispatches on a `"type"` field:
/// `{"type":"teleport","target":"Steve","x":0.0,"y":64.0,"z":0.0}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AgentCommand {
    /// Move the player whose display name is `target`.
    Teleport { target: String, x: f64, y: f64, z: f64 },
}
