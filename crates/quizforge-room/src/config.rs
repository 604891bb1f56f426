//! Room configuration and the game phase state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Settings shared by every room a registry creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Points awarded for a correct answer. No partial credit.
    pub points_per_correct: u32,

    /// Nickname used when a player leaves theirs blank.
    pub default_nickname: String,

    /// Nicknames longer than this many characters are cut.
    pub max_nickname_len: usize,

    /// How many fresh codes to try before giving up on room creation.
    pub max_code_attempts: usize,

    /// Capacity of each room actor's command channel.
    pub channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            points_per_correct: 100,
            default_nickname: "Monkey".to_string(),
            max_nickname_len: 24,
            max_code_attempts: 64,
            channel_size: 64,
        }
    }
}

impl RoomConfig {
    /// Trims a requested nickname, falls back to the default when blank,
    /// and enforces the length cap.
    pub fn sanitize_nickname(&self, requested: &str) -> String {
        let trimmed = requested.trim();
        let name = if trimmed.is_empty() {
            self.default_nickname.as_str()
        } else {
            trimmed
        };
        name.chars().take(self.max_nickname_len).collect()
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where a room is in its game lifecycle.
///
/// ```text
/// Lobby → QuestionOpen → QuestionRevealed → QuestionOpen → … → Finished
///                                                               │
///              (host restarts) QuestionOpen ←───────────────────┘
/// ```
///
/// - **Lobby**: accepting joins, no game yet.
/// - **QuestionOpen**: a question is live and answers are being collected.
/// - **QuestionRevealed**: everyone answered; answers and the correct option
///   have been disclosed. Waiting for the host to move on.
/// - **Finished**: the last question was passed and the leaderboard sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Lobby,
    QuestionOpen,
    QuestionRevealed,
    Finished,
}

impl Phase {
    /// New players may only join before the first question.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Lobby)
    }

    /// What the public projection reports as `isStarted`.
    pub fn is_started(self) -> bool {
        matches!(self, Self::QuestionOpen | Self::QuestionRevealed)
    }

    /// Submissions are only recorded while a question is open.
    pub fn accepts_answers(self) -> bool {
        matches!(self, Self::QuestionOpen)
    }

    /// The host may start from the lobby or restart a finished game.
    ///
    /// A start sent while a question is open or revealed is dropped; it
    /// never restarts a running game. A restart from `Finished` puts every
    /// player back at zero points instead of carrying scores over.
    pub fn can_start(self) -> bool {
        matches!(self, Self::Lobby | Self::Finished)
    }

    /// The host may advance while a game is running, revealed or not.
    pub fn can_advance(self) -> bool {
        matches!(self, Self::QuestionOpen | Self::QuestionRevealed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobby => write!(f, "lobby"),
            Self::QuestionOpen => write!(f, "question-open"),
            Self::QuestionRevealed => write!(f, "question-revealed"),
            Self::Finished => write!(f, "finished"),
        }
    }
}
