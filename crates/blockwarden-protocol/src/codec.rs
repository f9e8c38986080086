//! Wire format for the agent channel.
//!
//! The ingress is generic over [`Codec`] so it never names a concrete
//! format. The agent mod only speaks JSON, hence [`JsonCodec`].

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Bytes in, typed frames out, and back again for commands.
///
/// Shared by every agent task through server state, hence the bounds.
pub trait Codec: Send + Sync + 'static {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Fails with [`ProtocolError::Decode`] when `data` is not a valid
    /// `T`; extra fields are ignored.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// `serde_json` on both directions.
///
/// ```rust
/// use blockwarden_protocol::{Codec, JsonCodec, PlayerState};
///
/// let frame = br#"{"uuid":"u1","name":"Steve","x":0,"y":64,"z":0}"#;
/// let state: PlayerState = JsonCodec.decode(frame).unwrap();
///
/// assert_eq!(state.name, "Steve");
/// assert!(state.inventory.is_empty());
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
