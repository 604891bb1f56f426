//! Codec trait and the JSON implementation.
//!
//! The gateway encodes and decodes envelopes through [`Codec`] so the wire
//! format can change without touching connection handling.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts values to and from frame bytes.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that speaks JSON, which is what browser clients send.
///
/// ```rust
/// use quizforge_protocol::{Codec, Envelope, JsonCodec, Payload, SystemMessage};
///
/// let codec = JsonCodec;
/// let envelope = Envelope {
///     seq: 1,
///     timestamp: 5000,
///     payload: Payload::System(SystemMessage::Heartbeat { client_time: 5000 }),
/// };
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
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

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ClientRequest, Envelope, Payload};

    #[test]
    fn test_json_codec_decodes_browser_request() {
        let frame = br#"{
            "seq": 3,
            "timestamp": 120,
            "payload": {
                "type": "Request",
                "data": { "action": "startGame", "roomCode": "AB3K9" }
            }
        }"#;
        let env: Envelope = JsonCodec.decode(frame).unwrap();
        assert_eq!(env.seq, 3);
        assert_eq!(
            env.payload,
            Payload::Request(ClientRequest::StartGame {
                room_code: "AB3K9".into()
            })
        );
    }

    #[test]
    fn test_json_codec_garbage_is_decode_error() {
        let result: Result<Envelope, _> = JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_unknown_action_is_decode_error() {
        let frame = br#"{"payload":{"type":"Request","data":{"action":"launchRocket"}}}"#;
        let result: Result<Envelope, _> = JsonCodec.decode(frame);
        assert!(result.is_err());
    }

    #[test]
    fn test_json_codec_output_is_utf8() {
        let env = Envelope {
            seq: 0,
            timestamp: 0,
            payload: Payload::Request(ClientRequest::CreateRoom {
                nickname: "Zoë".into(),
            }),
        };
        let bytes = JsonCodec.encode(&env).unwrap();
        assert!(std::str::from_utf8(&bytes).is_ok());
    }
}
