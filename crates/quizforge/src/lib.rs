//! # Quizforge
//!
//! A room-based multiplayer trivia server. Players create or join a room
//! with a short code; the host starts the game and advances questions;
//! the server broadcasts questions, answer progress, scores, the reveal
//! and the final leaderboard.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quizforge::prelude::*;
//!
//! # async fn start() -> Result<(), QuizforgeError> {
//! let server = QuizforgeServer::from_config(ServerConfig::from_env()?).await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{DEFAULT_BIND, ServerConfig};
pub use error::QuizforgeError;
pub use server::{PROTOCOL_VERSION, QuizforgeServer, QuizforgeServerBuilder};

/// Everything needed to run a server or write a client test.
pub mod prelude {
    pub use crate::{
        PROTOCOL_VERSION, QuizforgeError, QuizforgeServer, QuizforgeServerBuilder, ServerConfig,
    };
    pub use quizforge_protocol::{
        AnswerRecord, ClientRequest, Codec, Envelope, JsonCodec, LeaderboardEntry, Payload,
        PlayerId, PublicPlayer, PublicRoomState, QuestionPayload, Reply, RoomCode, ServerEvent,
        SystemMessage,
    };
    pub use quizforge_room::{Question, QuestionBank, RoomConfig};
}
