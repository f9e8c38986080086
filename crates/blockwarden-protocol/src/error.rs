/// Why an agent frame or an outgoing command could not be handled.
///
/// The ingress logs these and drops the frame; none of them close the
/// agent link.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[cfg(feature = "json")]
    #[error("could not serialize agent command: {0}")]
    Encode(serde_json::Error),

    /// Not JSON, or JSON missing `uuid`/`name` or carrying a non-numeric
    /// coordinate.
    #[cfg(feature = "json")]
    #[error("malformed agent frame: {0}")]
    Decode(serde_json::Error),

    /// Well-formed JSON whose contents are unusable, e.g. an empty uuid.
    #[error("rejected agent frame: {0}")]
    InvalidMessage(String),
}
