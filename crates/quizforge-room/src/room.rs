//! The per-room game state machine.
//!
//! [`Room`] is plain synchronous state: every operation mutates it and
//! returns the events to broadcast to its members. The room actor owns one
//! and does the actual sending, which keeps everything here testable
//! without a runtime.

use indexmap::IndexMap;
use quizforge_protocol::{
    AnswerRecord, LeaderboardEntry, PlayerId, PublicPlayer, PublicRoomState, RoomCode, ServerEvent,
};

use crate::{Ignored, Phase, QuestionBank, RoomConfig, RoomError};

/// Events produced by a room operation, in delivery order. Every event
/// goes to every current member.
pub type Outbound = Vec<ServerEvent>;

/// A participant in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub nickname: String,
    pub score: u32,
    /// Whether the player locked in an answer for the current question.
    pub answered: bool,
}

impl Player {
    fn new(id: PlayerId, nickname: String) -> Self {
        Self {
            id,
            nickname,
            score: 0,
            answered: false,
        }
    }

    fn public(&self) -> PublicPlayer {
        PublicPlayer {
            id: self.id,
            nickname: self.nickname.clone(),
            score: self.score,
        }
    }
}

/// What happened when a player was removed.
#[derive(Debug)]
pub struct Departure {
    pub events: Outbound,
    /// Set when the host left and someone else was promoted.
    pub new_host: Option<PlayerId>,
    /// The last player left; the room should be discarded.
    pub room_empty: bool,
}

/// One quiz room: its players, host, phase, and the current question's
/// answers.
///
/// Invariants kept by every operation:
/// - the host is always a current player while the room is non-empty;
/// - a current player's `answered` flag is true iff they have an entry in
///   the current question's answer list;
/// - scores only change on a correct answer or a game (re)start.
#[derive(Debug)]
pub struct Room {
    code: RoomCode,
    host: PlayerId,
    players: IndexMap<PlayerId, Player>,
    phase: Phase,
    question_index: usize,
    answers: Vec<AnswerRecord>,
    bank: QuestionBank,
    config: RoomConfig,
}

impl Room {
    /// Creates a room in the lobby with its creator as host and only player.
    pub fn new(
        code: RoomCode,
        host: PlayerId,
        nickname: &str,
        bank: QuestionBank,
        config: RoomConfig,
    ) -> Self {
        let mut players = IndexMap::new();
        players.insert(host, Player::new(host, config.sanitize_nickname(nickname)));
        Self {
            code,
            host,
            players,
            phase: Phase::Lobby,
            question_index: 0,
            answers: Vec::new(),
            bank,
            config,
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn host(&self) -> PlayerId {
        self.host
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// 0-based index of the current question.
    pub fn question_index(&self) -> usize {
        self.question_index
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Players in join order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Answers locked in for the current question, in submission order.
    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    /// The projection every member is allowed to see.
    pub fn public_state(&self) -> PublicRoomState {
        PublicRoomState {
            host_id: self.host,
            is_started: self.phase.is_started(),
            players: self.public_players(),
        }
    }

    /// Final standings: score descending, join order among ties.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut ranked: Vec<&Player> = self.players.values().collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        ranked
            .into_iter()
            .map(|p| LeaderboardEntry {
                nickname: p.nickname.clone(),
                score: p.score,
            })
            .collect()
    }

    /// Adds a player in the lobby and announces the new membership.
    pub fn join(&mut self, id: PlayerId, nickname: &str) -> Result<Outbound, RoomError> {
        if !self.phase.is_joinable() {
            return Err(RoomError::GameAlreadyStarted(self.code.clone()));
        }
        if self.players.contains_key(&id) {
            return Err(RoomError::AlreadyInRoom(id, self.code.clone()));
        }
        let nickname = self.config.sanitize_nickname(nickname);
        self.players.insert(id, Player::new(id, nickname));
        Ok(vec![self.room_update()])
    }

    /// Removes a player, promoting the earliest remaining joiner if the
    /// host left.
    ///
    /// If a question is open and everyone still present has answered, the
    /// departure triggers the reveal. Answers already locked in by the
    /// departed player stay in the list.
    pub fn remove_player(&mut self, id: PlayerId) -> Result<Departure, RoomError> {
        if self.players.shift_remove(&id).is_none() {
            return Err(RoomError::NotInRoom(id, self.code.clone()));
        }

        if self.players.is_empty() {
            return Ok(Departure {
                events: Vec::new(),
                new_host: None,
                room_empty: true,
            });
        }

        let mut new_host = None;
        if self.host == id {
            if let Some(&next) = self.players.keys().next() {
                self.host = next;
                new_host = Some(next);
            }
        }

        let mut events = vec![self.room_update()];
        events.extend(self.reveal_if_complete());
        Ok(Departure {
            events,
            new_host,
            room_empty: false,
        })
    }

    /// Host only. Starts from the lobby, or restarts a finished game with
    /// every score back at zero.
    pub fn start_game(&mut self, requester: PlayerId) -> Result<Outbound, Ignored> {
        self.require_host(requester)?;
        if !self.phase.can_start() {
            return Err(Ignored::WrongPhase(self.phase));
        }

        self.question_index = 0;
        self.reset_round();
        for player in self.players.values_mut() {
            player.score = 0;
        }

        let mut events = vec![ServerEvent::GameStarted];
        events.extend(self.open_question());
        Ok(events)
    }

    /// Locks in a player's answer for the open question.
    ///
    /// Always announces who answered and the updated scores. When this was
    /// the last outstanding answer, the reveal follows in the same batch.
    /// An out-of-range `answer_index` is recorded as wrong.
    pub fn submit_answer(
        &mut self,
        player_id: PlayerId,
        answer_index: usize,
    ) -> Result<Outbound, Ignored> {
        let phase = self.phase;
        let Some(player) = self.players.get_mut(&player_id) else {
            return Err(Ignored::UnknownPlayer);
        };
        if !phase.accepts_answers() {
            return Err(Ignored::WrongPhase(phase));
        }
        if player.answered {
            return Err(Ignored::DuplicateAnswer);
        }
        let Some(question) = self.bank.get(self.question_index) else {
            return Err(Ignored::WrongPhase(phase));
        };

        let correct = question.is_correct(answer_index);
        if correct {
            player.score = player.score.saturating_add(self.config.points_per_correct);
        }
        player.answered = true;
        self.answers.push(AnswerRecord {
            player_id,
            nickname: player.nickname.clone(),
            answer_index,
            correct,
        });

        let mut events = vec![
            ServerEvent::PlayerAnswered { player_id },
            ServerEvent::ScoreUpdate {
                players: self.public_players(),
            },
        ];
        events.extend(self.reveal_if_complete());
        Ok(events)
    }

    /// Host only. Moves to the next question, or ends the game with the
    /// leaderboard once the bank is exhausted. Works whether or not the
    /// current question was revealed.
    pub fn next_question(&mut self, requester: PlayerId) -> Result<Outbound, Ignored> {
        self.require_host(requester)?;
        if !self.phase.can_advance() {
            return Err(Ignored::WrongPhase(self.phase));
        }

        self.question_index += 1;
        self.reset_round();
        Ok(self.open_question())
    }

    fn require_host(&self, requester: PlayerId) -> Result<(), Ignored> {
        if !self.players.contains_key(&requester) {
            return Err(Ignored::UnknownPlayer);
        }
        if requester != self.host {
            return Err(Ignored::Unauthorized);
        }
        Ok(())
    }

    fn reset_round(&mut self) {
        self.answers.clear();
        for player in self.players.values_mut() {
            player.answered = false;
        }
    }

    /// Opens the question at `question_index`, or finishes the game if
    /// there is none.
    fn open_question(&mut self) -> Outbound {
        let total = self.bank.len();
        match self.bank.get(self.question_index) {
            Some(question) => {
                let payload = question.payload(self.question_index + 1, total);
                self.phase = Phase::QuestionOpen;
                vec![ServerEvent::NewQuestion(payload)]
            }
            None => {
                self.phase = Phase::Finished;
                vec![ServerEvent::GameOver {
                    leaderboard: self.leaderboard(),
                }]
            }
        }
    }

    /// Reveals at most once per question and never for an empty room.
    fn reveal_if_complete(&mut self) -> Option<ServerEvent> {
        if !self.phase.accepts_answers()
            || self.players.is_empty()
            || !self.players.values().all(|p| p.answered)
        {
            return None;
        }
        let correct_index = self.bank.get(self.question_index)?.correct_index;
        self.phase = Phase::QuestionRevealed;
        Some(ServerEvent::AnswerReveal {
            answers: self.answers.clone(),
            correct_index,
        })
    }

    fn room_update(&self) -> ServerEvent {
        ServerEvent::RoomUpdate(self.public_state())
    }

    fn public_players(&self) -> Vec<PublicPlayer> {
        self.players.values().map(Player::public).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Question;

    const ANA: PlayerId = PlayerId(1);
    const BEN: PlayerId = PlayerId(2);
    const CY: PlayerId = PlayerId(3);

    fn bank() -> QuestionBank {
        QuestionBank::new(vec![
            Question::new("Math", "1 + 1?", &["1", "2", "3"], 1),
            Question::new("Math", "2 + 2?", &["4", "5"], 0),
        ])
        .unwrap()
    }

    fn lobby() -> Room {
        let mut room = Room::new(
            RoomCode::parse("AB3K9").unwrap(),
            ANA,
            "Ana",
            bank(),
            RoomConfig::default(),
        );
        room.join(BEN, "Ben").unwrap();
        room.join(CY, "Cy").unwrap();
        room
    }

    fn names(events: &Outbound) -> Vec<&'static str> {
        events.iter().map(ServerEvent::name).collect()
    }

    #[test]
    fn test_new_room_has_creator_as_host() {
        let room = Room::new(
            RoomCode::parse("AB3K9").unwrap(),
            ANA,
            "  ",
            bank(),
            RoomConfig::default(),
        );
        assert_eq!(room.host(), ANA);
        assert_eq!(room.phase(), Phase::Lobby);
        assert_eq!(room.player(ANA).unwrap().nickname, "Monkey");
        assert!(!room.public_state().is_started);
    }

    #[test]
    fn test_join_broadcasts_room_update_in_join_order() {
        let mut room = lobby();
        let events = room.join(PlayerId(4), "Dee").unwrap();
        assert_eq!(events.len(), 1);
        let ServerEvent::RoomUpdate(state) = &events[0] else {
            panic!("expected roomUpdate, got {:?}", events[0]);
        };
        let order: Vec<_> = state.players.iter().map(|p| p.nickname.as_str()).collect();
        assert_eq!(order, ["Ana", "Ben", "Cy", "Dee"]);
    }

    #[test]
    fn test_join_after_start_rejected() {
        let mut room = lobby();
        room.start_game(ANA).unwrap();
        let err = room.join(PlayerId(4), "Late").unwrap_err();
        assert!(matches!(err, RoomError::GameAlreadyStarted(_)));
    }

    #[test]
    fn test_join_finished_room_rejected() {
        let mut room = lobby();
        room.start_game(ANA).unwrap();
        room.next_question(ANA).unwrap();
        room.next_question(ANA).unwrap();
        assert_eq!(room.phase(), Phase::Finished);
        assert!(room.join(PlayerId(4), "Late").is_err());
    }

    #[test]
    fn test_duplicate_join_rejected() {
        let mut room = lobby();
        let err = room.join(BEN, "Ben again").unwrap_err();
        assert!(matches!(err, RoomError::AlreadyInRoom(..)));
    }

    #[test]
    fn test_start_game_emits_started_then_first_question() {
        let mut room = lobby();
        let events = room.start_game(ANA).unwrap();
        assert_eq!(names(&events), ["gameStarted", "newQuestion"]);
        let ServerEvent::NewQuestion(q) = &events[1] else {
            panic!("expected newQuestion");
        };
        assert_eq!((q.index, q.total), (1, 2));
        assert_eq!(room.phase(), Phase::QuestionOpen);
        assert!(room.public_state().is_started);
    }

    #[test]
    fn test_non_host_start_ignored() {
        let mut room = lobby();
        assert_eq!(room.start_game(BEN), Err(Ignored::Unauthorized));
        assert_eq!(room.phase(), Phase::Lobby);
    }

    #[test]
    fn test_start_while_running_ignored() {
        let mut room = lobby();
        room.start_game(ANA).unwrap();
        assert_eq!(
            room.start_game(ANA),
            Err(Ignored::WrongPhase(Phase::QuestionOpen))
        );
    }

    #[test]
    fn test_correct_answer_scores_and_broadcasts() {
        let mut room = lobby();
        room.start_game(ANA).unwrap();
        let events = room.submit_answer(BEN, 1).unwrap();
        assert_eq!(names(&events), ["playerAnswered", "scoreUpdate"]);
        assert_eq!(room.player(BEN).unwrap().score, 100);
        assert!(room.player(BEN).unwrap().answered);
    }

    #[test]
    fn test_player_answered_does_not_leak_choice() {
        let mut room = lobby();
        room.start_game(ANA).unwrap();
        let events = room.submit_answer(BEN, 2).unwrap();
        assert_eq!(events[0], ServerEvent::PlayerAnswered { player_id: BEN });
    }

    #[test]
    fn test_wrong_and_out_of_range_answers_score_nothing() {
        let mut room = lobby();
        room.start_game(ANA).unwrap();
        room.submit_answer(ANA, 0).unwrap();
        room.submit_answer(BEN, 99).unwrap();
        assert_eq!(room.player(ANA).unwrap().score, 0);
        assert_eq!(room.player(BEN).unwrap().score, 0);
        assert!(!room.answers()[1].correct);
    }

    #[test]
    fn test_second_answer_ignored() {
        let mut room = lobby();
        room.start_game(ANA).unwrap();
        room.submit_answer(BEN, 0).unwrap();
        assert_eq!(room.submit_answer(BEN, 1), Err(Ignored::DuplicateAnswer));
        assert_eq!(room.player(BEN).unwrap().score, 0);
        assert_eq!(room.answers().len(), 1);
    }

    #[test]
    fn test_answer_in_lobby_ignored() {
        let mut room = lobby();
        assert_eq!(
            room.submit_answer(BEN, 1),
            Err(Ignored::WrongPhase(Phase::Lobby))
        );
    }

    #[test]
    fn test_answer_from_stranger_ignored() {
        let mut room = lobby();
        room.start_game(ANA).unwrap();
        assert_eq!(
            room.submit_answer(PlayerId(99), 1),
            Err(Ignored::UnknownPlayer)
        );
    }

    #[test]
    fn test_last_answer_triggers_reveal_once() {
        let mut room = lobby();
        room.start_game(ANA).unwrap();
        room.submit_answer(ANA, 1).unwrap();
        room.submit_answer(BEN, 0).unwrap();
        let events = room.submit_answer(CY, 1).unwrap();
        assert_eq!(
            names(&events),
            ["playerAnswered", "scoreUpdate", "answerReveal"]
        );
        let ServerEvent::AnswerReveal {
            answers,
            correct_index,
        } = &events[2]
        else {
            panic!("expected answerReveal");
        };
        assert_eq!(*correct_index, 1);
        let order: Vec<_> = answers.iter().map(|a| a.player_id).collect();
        assert_eq!(order, [ANA, BEN, CY]);
        assert_eq!(room.phase(), Phase::QuestionRevealed);

        // Nothing more can be submitted, so no second reveal.
        assert!(room.submit_answer(CY, 1).is_err());
    }

    #[test]
    fn test_next_question_resets_round() {
        let mut room = lobby();
        room.start_game(ANA).unwrap();
        room.submit_answer(BEN, 1).unwrap();
        let events = room.next_question(ANA).unwrap();
        assert_eq!(names(&events), ["newQuestion"]);
        assert_eq!(room.question_index(), 1);
        assert!(room.answers().is_empty());
        assert!(room.players().all(|p| !p.answered));
        assert_eq!(room.player(BEN).unwrap().score, 100);
    }

    #[test]
    fn test_non_host_next_question_ignored() {
        let mut room = lobby();
        room.start_game(ANA).unwrap();
        assert_eq!(room.next_question(CY), Err(Ignored::Unauthorized));
        assert_eq!(room.question_index(), 0);
    }

    #[test]
    fn test_next_question_in_lobby_ignored() {
        let mut room = lobby();
        assert_eq!(
            room.next_question(ANA),
            Err(Ignored::WrongPhase(Phase::Lobby))
        );
    }

    #[test]
    fn test_passing_last_question_ends_game_with_sorted_leaderboard() {
        let mut room = lobby();
        room.start_game(ANA).unwrap();
        room.submit_answer(CY, 1).unwrap();
        room.next_question(ANA).unwrap();
        room.submit_answer(CY, 0).unwrap();
        room.submit_answer(BEN, 0).unwrap();

        let events = room.next_question(ANA).unwrap();
        assert_eq!(names(&events), ["gameOver"]);
        let ServerEvent::GameOver { leaderboard } = &events[0] else {
            panic!("expected gameOver");
        };
        let standings: Vec<_> = leaderboard
            .iter()
            .map(|e| (e.nickname.as_str(), e.score))
            .collect();
        assert_eq!(standings, [("Cy", 200), ("Ben", 100), ("Ana", 0)]);
        assert_eq!(room.phase(), Phase::Finished);
        assert!(!room.public_state().is_started);
    }

    #[test]
    fn test_leaderboard_ties_keep_join_order() {
        let mut room = lobby();
        room.start_game(ANA).unwrap();
        room.submit_answer(CY, 1).unwrap();
        room.submit_answer(ANA, 1).unwrap();
        let board: Vec<_> = room
            .leaderboard()
            .into_iter()
            .map(|e| e.nickname)
            .collect();
        assert_eq!(board, ["Ana", "Cy", "Ben"]);
    }

    #[test]
    fn test_restart_after_finish_resets_scores() {
        let mut room = lobby();
        room.start_game(ANA).unwrap();
        room.submit_answer(BEN, 1).unwrap();
        room.next_question(ANA).unwrap();
        room.next_question(ANA).unwrap();
        assert_eq!(room.phase(), Phase::Finished);

        let events = room.start_game(ANA).unwrap();
        assert_eq!(names(&events), ["gameStarted", "newQuestion"]);
        assert_eq!(room.question_index(), 0);
        assert!(room.players().all(|p| p.score == 0));
    }

    #[test]
    fn test_host_leaving_promotes_earliest_joiner() {
        let mut room = lobby();
        let departure = room.remove_player(ANA).unwrap();
        assert_eq!(departure.new_host, Some(BEN));
        assert!(!departure.room_empty);
        assert_eq!(room.host(), BEN);
        let ServerEvent::RoomUpdate(state) = &departure.events[0] else {
            panic!("expected roomUpdate");
        };
        assert_eq!(state.host_id, BEN);
        assert_eq!(state.players.len(), 2);
    }

    #[test]
    fn test_non_host_leaving_keeps_host() {
        let mut room = lobby();
        let departure = room.remove_player(BEN).unwrap();
        assert_eq!(departure.new_host, None);
        assert_eq!(room.host(), ANA);
    }

    #[test]
    fn test_last_player_leaving_empties_room() {
        let mut room = Room::new(
            RoomCode::parse("AB3K9").unwrap(),
            ANA,
            "Ana",
            bank(),
            RoomConfig::default(),
        );
        let departure = room.remove_player(ANA).unwrap();
        assert!(departure.room_empty);
        assert!(departure.events.is_empty());
    }

    #[test]
    fn test_remove_unknown_player_errors() {
        let mut room = lobby();
        let err = room.remove_player(PlayerId(42)).unwrap_err();
        assert!(matches!(err, RoomError::NotInRoom(..)));
    }

    #[test]
    fn test_leaving_straggler_triggers_reveal() {
        let mut room = lobby();
        room.start_game(ANA).unwrap();
        room.submit_answer(ANA, 1).unwrap();
        room.submit_answer(BEN, 1).unwrap();

        let departure = room.remove_player(CY).unwrap();
        assert_eq!(
            names(&departure.events),
            ["roomUpdate", "answerReveal"]
        );
        assert_eq!(room.phase(), Phase::QuestionRevealed);
    }

    #[test]
    fn test_departed_answer_stays_in_reveal() {
        let mut room = lobby();
        room.start_game(ANA).unwrap();
        room.submit_answer(CY, 0).unwrap();
        room.submit_answer(ANA, 1).unwrap();
        room.remove_player(CY).unwrap();

        let events = room.submit_answer(BEN, 1).unwrap();
        let Some(ServerEvent::AnswerReveal { answers, .. }) = events.last() else {
            panic!("expected answerReveal last");
        };
        let who: Vec<_> = answers.iter().map(|a| a.nickname.as_str()).collect();
        assert_eq!(who, ["Cy", "Ana", "Ben"]);
    }

    #[test]
    fn test_leaving_after_reveal_does_not_reveal_again() {
        let mut room = lobby();
        room.start_game(ANA).unwrap();
        for p in [ANA, BEN, CY] {
            room.submit_answer(p, 1).unwrap();
        }
        let departure = room.remove_player(BEN).unwrap();
        assert_eq!(names(&departure.events), ["roomUpdate"]);
    }

    #[test]
    fn test_promoted_host_can_drive_game() {
        let mut room = lobby();
        room.start_game(ANA).unwrap();
        room.remove_player(ANA).unwrap();
        assert!(room.next_question(BEN).is_ok());
        assert_eq!(room.question_index(), 1);
    }
}
