//! Identity types and the envelope every frame travels in.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ClientRequest, ProtocolError, Reply, ServerEvent};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identity of a player inside a room.
///
/// Allocated by the room registry when a connection creates or joins a room.
/// Distinct from the transport's connection id so that the room layer never
/// depends on how clients are connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Characters allowed in a room code. `I`, `O`, `0` and `1` are left out
/// because they are easy to misread when a code is shared aloud.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of characters in a room code.
pub const ROOM_CODE_LEN: usize = 5;

/// A short, human-typable room identifier such as `AB3K9`.
///
/// Always stored normalized (uppercase, alphabet-checked). Input is
/// case-insensitive: `RoomCode::parse(" ab3k9 ")` yields `AB3K9`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Normalizes and validates a code typed by a user.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let normalized = raw.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(ProtocolError::InvalidRoomCode("room code is empty".into()));
        }
        if normalized.len() != ROOM_CODE_LEN {
            return Err(ProtocolError::InvalidRoomCode(format!(
                "room code must be {ROOM_CODE_LEN} characters, got {normalized:?}"
            )));
        }
        if let Some(bad) = normalized.bytes().find(|b| !ROOM_CODE_ALPHABET.contains(b)) {
            return Err(ProtocolError::InvalidRoomCode(format!(
                "room code contains invalid character {:?}",
                bad as char
            )));
        }
        Ok(Self(normalized))
    }

    /// Builds a code by asking `pick` for one alphabet index per character.
    ///
    /// `pick` receives the alphabet length and should return an index below
    /// it; out-of-range values wrap.
    pub fn generate_with(mut pick: impl FnMut(usize) -> usize) -> Self {
        let code = (0..ROOM_CODE_LEN)
            .map(|_| ROOM_CODE_ALPHABET[pick(ROOM_CODE_ALPHABET.len()) % ROOM_CODE_ALPHABET.len()] as char)
            .collect();
        Self(code)
    }

    /// Returns the normalized code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

// ---------------------------------------------------------------------------
// SystemMessage
// ---------------------------------------------------------------------------

/// Connection plumbing that is not part of the game itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Client → Server: first frame on every connection.
    Handshake { version: u32 },

    /// Server → Client: handshake accepted.
    HandshakeAck { connection_id: u64, server_time: u64 },

    /// Client → Server: keep-alive, resets the idle timer.
    Heartbeat { client_time: u64 },

    /// Server → Client: echo of a heartbeat with the server clock.
    HeartbeatAck { client_time: u64, server_time: u64 },

    /// Either direction: the connection is about to close.
    Disconnect { reason: String },
}

// ---------------------------------------------------------------------------
// Payload / Envelope
// ---------------------------------------------------------------------------

/// The content of a frame.
///
/// Adjacently tagged, so a request looks like
/// `{"type":"Request","data":{"action":"joinRoom",...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    /// Connection plumbing (handshake, heartbeat, disconnect).
    System(SystemMessage),
    /// Client → Server: a game action.
    Request(ClientRequest),
    /// Server → requester: outcome of `createRoom` / `joinRoom`, or an error.
    Reply(Reply),
    /// Server → room: a broadcast game event.
    Event(ServerEvent),
}

/// The top-level wire format. Every frame is one envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-direction sequence number, starting at 0 for the handshake.
    #[serde(default)]
    pub seq: u64,

    /// Milliseconds since the sender's connection started.
    #[serde(default)]
    pub timestamp: u64,

    pub payload: Payload,
}
