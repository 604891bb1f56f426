//! Unified error type for the Quizforge server.

use std::path::PathBuf;

use quizforge_protocol::ProtocolError;
use quizforge_room::RoomError;
use quizforge_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each wrapped variant generates a `From`
/// impl, so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum QuizforgeError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, handshake).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (not found, started, bad question bank).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The question file could not be read.
    #[error("cannot read question file {path}: {source}")]
    QuestionFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An environment setting has an unusable value.
    #[error("configuration error: {0}")]
    Config(String),
}
