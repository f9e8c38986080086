//! Live player registry for Blockwarden.
//!
//! The registry holds the most recent [`PlayerState`] the game-side agent
//! reported for each player. It is written by the agent ingress and read
//! by the HTTP player listing.
//!
//! # How it fits in the stack
//!
//! ```text
//! HTTP surface  ← list_all() snapshots
//!     ↕
//! Registry (this crate)  ← last-known state per player, eviction policy
//!     ↕
//! Agent ingress  ← update() on every parsed frame
//! ```
//!
//! [`PlayerRegistry`] is the plain data structure. [`LiveRegistry`] is
//! the cloneable handle that is constructed once at startup and handed to
//! both sides.
//!
//! [`PlayerState`]: blockwarden_protocol::PlayerState

mod config;
mod live;
mod registry;

pub use config::{EvictionPolicy, RegistryConfig};
pub use live::LiveRegistry;
pub use registry::PlayerRegistry;
