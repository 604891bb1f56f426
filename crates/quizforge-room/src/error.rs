//! Error types for the room layer.
//!
//! [`RoomError`] is returned to the requester of `createRoom` / `joinRoom`.
//! [`Ignored`] covers actions that are dropped without telling the client:
//! they almost always come from stale UI state, and answering them would
//! advertise host-only controls.

use quizforge_protocol::{PlayerId, RoomCode};
use quizforge_transport::ConnectionId;

use crate::Phase;

/// Errors surfaced to the client that made the request.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room with this code exists.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The room has left the lobby.
    #[error("game in room {0} has already started")]
    GameAlreadyStarted(RoomCode),

    /// The code is empty, the wrong length, or uses characters outside the
    /// room code alphabet.
    #[error("invalid room code: {0}")]
    InvalidRoomCode(String),

    /// The player is already in this room.
    #[error("player {0} already in room {1}")]
    AlreadyInRoom(PlayerId, RoomCode),

    /// The player is not in this room.
    #[error("player {0} not in room {1}")]
    NotInRoom(PlayerId, RoomCode),

    /// The connection is not a member of any room.
    #[error("{0} is not in any room")]
    NotAMember(ConnectionId),

    /// A question in the bank is unusable.
    #[error("invalid question bank: {0}")]
    InvalidQuestion(String),

    /// Every generated code collided with a live room.
    #[error("no free room code after {0} attempts")]
    CodeSpaceExhausted(usize),

    /// The room's actor has stopped or its command channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

impl RoomError {
    /// HTTP-style status code sent in error replies.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::GameAlreadyStarted(_) | Self::AlreadyInRoom(..) => 409,
            Self::InvalidRoomCode(_) | Self::NotInRoom(..) | Self::NotAMember(_) => 400,
            Self::InvalidQuestion(_) => 500,
            Self::CodeSpaceExhausted(_) | Self::Unavailable(_) => 503,
        }
    }

    /// Stable machine-readable tag sent in error replies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "roomNotFound",
            Self::GameAlreadyStarted(_) => "gameAlreadyStarted",
            Self::InvalidRoomCode(_) => "invalidRoomCode",
            Self::AlreadyInRoom(..) => "alreadyInRoom",
            Self::NotInRoom(..) => "notInRoom",
            Self::NotAMember(_) => "notAMember",
            Self::InvalidQuestion(_) => "invalidQuestion",
            Self::CodeSpaceExhausted(_) => "codeSpaceExhausted",
            Self::Unavailable(_) => "roomUnavailable",
        }
    }
}

/// Why an action was dropped. Logged at debug level, never sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Ignored {
    /// A non-host tried a host-only action.
    #[error("requester is not the host")]
    Unauthorized,

    /// The player already locked in an answer for this question.
    #[error("player already answered this question")]
    DuplicateAnswer,

    /// The action does not apply in the room's current phase.
    #[error("not allowed in phase {0}")]
    WrongPhase(Phase),

    /// The sender is not a player of this room.
    #[error("player is not in the room")]
    UnknownPlayer,

    /// The connection named a room it is not a member of.
    #[error("connection is not a member of that room")]
    NotMember,

    /// The room's actor is gone.
    #[error("room is unavailable")]
    RoomGone,
}
