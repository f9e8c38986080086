//! Wire protocol for the Blockwarden agent channel.
//!
//! The game-side agent (a server mod) keeps a WebSocket open to the panel
//! and pushes one JSON document per player update. The panel can push
//! commands back over the same socket. This crate defines both directions:
//!
//! - **Types** ([`PlayerState`], [`InventorySlot`], [`AgentCommand`]):
//!   the records that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those records are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding and validation.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (PlayerState) → Registry (live players)
//! ```
//!
//! The protocol layer knows nothing about connections, HTTP, or storage.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{AgentCommand, InventorySlot, PlayerId, PlayerState};
