//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding or validating messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, unknown tags.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A room code that is empty, the wrong length, or uses characters
    /// outside the room code alphabet.
    #[error("invalid room code: {0}")]
    InvalidRoomCode(String),

    /// The message parsed but breaks protocol rules (e.g. a request before
    /// the handshake).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
