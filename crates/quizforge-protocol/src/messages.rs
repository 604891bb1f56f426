//! Game-level messages: client requests, direct replies, and room broadcasts.
//!
//! Field names are camelCase on the wire to match the browser client.

use serde::{Deserialize, Serialize};

use crate::{PlayerId, RoomCode};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// An action a client asks the server to perform.
///
/// Room codes arrive as raw strings; they are normalized by the registry so
/// that a malformed code on `joinRoom` can be reported back to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientRequest {
    /// Open a new room with the sender as host.
    CreateRoom {
        #[serde(default)]
        nickname: String,
    },

    /// Join an existing room in the lobby.
    JoinRoom {
        room_code: String,
        #[serde(default)]
        nickname: String,
    },

    /// Host only: start (or restart) the game.
    StartGame { room_code: String },

    /// Host only: advance to the next question or finish the game.
    NextQuestion { room_code: String },

    /// Lock in an answer for the open question.
    SubmitAnswer { room_code: String, answer_index: usize },
}

impl ClientRequest {
    /// Wire name of the action, for logging.
    pub fn action(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "createRoom",
            Self::JoinRoom { .. } => "joinRoom",
            Self::StartGame { .. } => "startGame",
            Self::NextQuestion { .. } => "nextQuestion",
            Self::SubmitAnswer { .. } => "submitAnswer",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → requester
// ---------------------------------------------------------------------------

/// Direct reply to `createRoom` / `joinRoom`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Reply {
    /// The requester is now a member of `room_code`.
    RoomJoined {
        room_code: RoomCode,
        player_id: PlayerId,
        is_host: bool,
    },

    /// The request failed. `kind` is a stable machine-readable tag
    /// (`roomNotFound`, `gameAlreadyStarted`, `invalidRoomCode`, ...).
    Error {
        code: u16,
        kind: String,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Server → room
// ---------------------------------------------------------------------------

/// A player as shown to everyone in the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicPlayer {
    pub id: PlayerId,
    pub nickname: String,
    pub score: u32,
}

/// Broadcast-safe projection of a room. Never carries answer content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicRoomState {
    pub host_id: PlayerId,
    pub is_started: bool,
    /// Players in join order.
    pub players: Vec<PublicPlayer>,
}

/// A question as sent to players. The correct option is withheld.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionPayload {
    /// 1-based position in the game.
    pub index: usize,
    pub total: usize,
    pub category: String,
    pub question: String,
    pub options: Vec<String>,
}

/// One locked-in answer, disclosed at reveal time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub player_id: PlayerId,
    pub nickname: String,
    pub answer_index: usize,
    pub correct: bool,
}

/// A final standing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub nickname: String,
    pub score: u32,
}

/// Events broadcast to the members of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Membership or host changed.
    RoomUpdate(PublicRoomState),

    /// The room left the lobby (or a finished game was restarted).
    GameStarted,

    /// A question is open for answers.
    NewQuestion(QuestionPayload),

    /// Scores after a submission.
    ScoreUpdate { players: Vec<PublicPlayer> },

    /// Lock-in indicator; carries identity only, never the chosen option.
    PlayerAnswered { player_id: PlayerId },

    /// Every present player answered: full disclosure for the question.
    AnswerReveal {
        answers: Vec<AnswerRecord>,
        correct_index: usize,
    },

    /// The last question was passed. Sorted by score, ties in join order.
    GameOver { leaderboard: Vec<LeaderboardEntry> },
}

impl ServerEvent {
    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoomUpdate(_) => "roomUpdate",
            Self::GameStarted => "gameStarted",
            Self::NewQuestion(_) => "newQuestion",
            Self::ScoreUpdate { .. } => "scoreUpdate",
            Self::PlayerAnswered { .. } => "playerAnswered",
            Self::AnswerReveal { .. } => "answerReveal",
            Self::GameOver { .. } => "gameOver",
        }
    }
}

#[cfg(test)]
mod tests {
    //! The browser client parses these shapes directly, so the tests pin the
    //! exact JSON field names.

    use super::*;

    #[test]
    fn test_join_room_request_json_format() {
        let json = r#"{"action":"joinRoom","roomCode":"ab3k9","nickname":"Ana"}"#;
        let req: ClientRequest = serde_json::from_str(json).unwrap();
        assert_eq!(
            req,
            ClientRequest::JoinRoom {
                room_code: "ab3k9".into(),
                nickname: "Ana".into(),
            }
        );
        assert_eq!(req.action(), "joinRoom");
    }

    #[test]
    fn test_create_room_nickname_defaults_to_empty() {
        let req: ClientRequest = serde_json::from_str(r#"{"action":"createRoom"}"#).unwrap();
        assert_eq!(req, ClientRequest::CreateRoom { nickname: String::new() });
    }

    #[test]
    fn test_submit_answer_uses_camel_case_fields() {
        let req = ClientRequest::SubmitAnswer {
            room_code: "AB3K9".into(),
            answer_index: 2,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["action"], "submitAnswer");
        assert_eq!(json["roomCode"], "AB3K9");
        assert_eq!(json["answerIndex"], 2);
    }

    #[test]
    fn test_submit_answer_rejects_negative_index() {
        let json = r#"{"action":"submitAnswer","roomCode":"AB3K9","answerIndex":-1}"#;
        assert!(serde_json::from_str::<ClientRequest>(json).is_err());
    }

    #[test]
    fn test_room_joined_reply_json_format() {
        let reply = Reply::RoomJoined {
            room_code: RoomCode::parse("AB3K9").unwrap(),
            player_id: PlayerId(3),
            is_host: true,
        };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["status"], "roomJoined");
        assert_eq!(json["roomCode"], "AB3K9");
        assert_eq!(json["playerId"], 3);
        assert_eq!(json["isHost"], true);
    }

    #[test]
    fn test_error_reply_json_format() {
        let reply = Reply::Error {
            code: 404,
            kind: "roomNotFound".into(),
            message: "room ZZZZZ not found".into(),
        };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], 404);
        assert_eq!(json["kind"], "roomNotFound");
    }

    #[test]
    fn test_room_update_flattens_public_state() {
        let event = ServerEvent::RoomUpdate(PublicRoomState {
            host_id: PlayerId(1),
            is_started: false,
            players: vec![PublicPlayer {
                id: PlayerId(1),
                nickname: "Ana".into(),
                score: 0,
            }],
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "roomUpdate");
        assert_eq!(json["hostId"], 1);
        assert_eq!(json["isStarted"], false);
        assert_eq!(json["players"][0]["nickname"], "Ana");
    }

    #[test]
    fn test_new_question_withholds_correct_index() {
        let event = ServerEvent::NewQuestion(QuestionPayload {
            index: 1,
            total: 6,
            category: "Flags".into(),
            question: "Which flag belongs to Japan?".into(),
            options: vec!["A".into(), "B".into()],
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "newQuestion");
        assert_eq!(json["index"], 1);
        assert_eq!(json["total"], 6);
        assert!(json.get("correctIndex").is_none());
        assert!(json.get("correct_index").is_none());
    }

    #[test]
    fn test_answer_reveal_json_format() {
        let event = ServerEvent::AnswerReveal {
            answers: vec![AnswerRecord {
                player_id: PlayerId(2),
                nickname: "Bo".into(),
                answer_index: 1,
                correct: true,
            }],
            correct_index: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "answerReveal");
        assert_eq!(json["correctIndex"], 1);
        assert_eq!(json["answers"][0]["playerId"], 2);
        assert_eq!(json["answers"][0]["answerIndex"], 1);
        assert_eq!(json["answers"][0]["correct"], true);
    }

    #[test]
    fn test_unit_and_struct_events_round_trip() {
        for event in [
            ServerEvent::GameStarted,
            ServerEvent::PlayerAnswered { player_id: PlayerId(9) },
            ServerEvent::GameOver {
                leaderboard: vec![LeaderboardEntry {
                    nickname: "Ana".into(),
                    score: 300,
                }],
            },
        ] {
            let bytes = serde_json::to_vec(&event).unwrap();
            let decoded: ServerEvent = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(decoded, event, "{}", event.name());
        }
    }

    #[test]
    fn test_player_answered_carries_identity_only() {
        let json = serde_json::to_value(ServerEvent::PlayerAnswered { player_id: PlayerId(4) }).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2, "only the tag and playerId: {json}");
        assert_eq!(json["playerId"], 4);
    }
}
