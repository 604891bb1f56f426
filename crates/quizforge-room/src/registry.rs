//! Room registry: creates rooms, tracks which connection is where, and
//! routes game actions to the right actor.

use std::collections::HashMap;

use quizforge_protocol::{PlayerId, ProtocolError, PublicRoomState, RoomCode};
use quizforge_transport::ConnectionId;
use rand::Rng;

use crate::actor::spawn_room;
use crate::{
    ConnectionSender, Ignored, JoinAck, LeaveOutcome, QuestionBank, RoomConfig, RoomError,
    RoomHandle, RoomInfo,
};

/// Where a connection currently plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub room_code: RoomCode,
    pub player_id: PlayerId,
}

type CodeSource = Box<dyn FnMut() -> RoomCode + Send + Sync>;

/// Draws a code uniformly from the room code alphabet.
fn random_code() -> RoomCode {
    let mut rng = rand::rng();
    RoomCode::generate_with(|len| rng.random_range(0..len))
}

/// Every live room, keyed by code, plus the connection → membership index.
///
/// A connection is in at most one room at a time. Creating or joining while
/// already a member leaves the old room, but only once the new seat is
/// secured: a failed create or join leaves the caller where it was.
///
/// The registry itself is not synchronized; the gateway keeps it behind a
/// `tokio::sync::Mutex`. Game actions only need [`RoomRegistry::route`],
/// which is synchronous, so the lock is never held across an actor's work
/// for them.
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, RoomHandle>,
    members: HashMap<ConnectionId, Membership>,
    bank: QuestionBank,
    config: RoomConfig,
    next_player_id: u64,
    code_source: CodeSource,
}

impl RoomRegistry {
    /// Creates an empty registry whose rooms play through `bank`.
    pub fn new(bank: QuestionBank, config: RoomConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            members: HashMap::new(),
            bank,
            config,
            next_player_id: 1,
            code_source: Box::new(random_code),
        }
    }

    /// Replaces the random code generator, e.g. to get predictable codes.
    pub fn with_code_source(mut self, source: impl FnMut() -> RoomCode + Send + Sync + 'static) -> Self {
        self.code_source = Box::new(source);
        self
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Creates a room with `conn` as host and sole player.
    ///
    /// The `roomJoined` reply and first `roomUpdate` are queued on `sender`.
    pub async fn create_room(
        &mut self,
        conn: ConnectionId,
        nickname: &str,
        sender: ConnectionSender,
    ) -> Result<JoinAck, RoomError> {
        let room_code = self.fresh_code()?;
        self.leave_previous(conn).await;

        let player_id = self.allocate_player_id();
        let (handle, ack) = spawn_room(
            room_code.clone(),
            player_id,
            nickname,
            sender,
            self.bank.clone(),
            self.config.clone(),
        );
        self.rooms.insert(room_code.clone(), handle);
        self.members.insert(
            conn,
            Membership {
                room_code: room_code.clone(),
                player_id,
            },
        );
        tracing::info!(%room_code, %conn, %player_id, rooms = self.rooms.len(), "room created");
        Ok(ack)
    }

    /// Adds `conn` to an existing room that is still in its lobby.
    ///
    /// `raw_code` is normalized first, so `" ab3k9 "` finds `AB3K9`.
    /// Naming the room the connection is already in is an error.
    pub async fn join_room(
        &mut self,
        conn: ConnectionId,
        raw_code: &str,
        nickname: &str,
        sender: ConnectionSender,
    ) -> Result<JoinAck, RoomError> {
        let room_code = parse_code(raw_code)?;

        if let Some(current) = self.members.get(&conn) {
            if current.room_code == room_code {
                return Err(RoomError::AlreadyInRoom(current.player_id, room_code));
            }
        }

        let handle = self
            .rooms
            .get(&room_code)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_code.clone()))?;

        let player_id = self.allocate_player_id();
        match handle.join(player_id, nickname, sender).await {
            Ok(ack) => {
                self.leave_previous(conn).await;
                self.members.insert(
                    conn,
                    Membership {
                        room_code,
                        player_id,
                    },
                );
                Ok(ack)
            }
            Err(RoomError::Unavailable(code)) => {
                tracing::warn!(room_code = %code, "room actor gone, dropping room");
                self.rooms.remove(&code);
                Err(RoomError::NotFound(code))
            }
            Err(e) => Err(e),
        }
    }

    /// Removes `conn` from its room. Called on disconnect.
    ///
    /// Forgets the room once its last player is gone.
    pub async fn leave(&mut self, conn: ConnectionId) -> Result<LeaveOutcome, RoomError> {
        let Membership {
            room_code,
            player_id,
        } = self
            .members
            .remove(&conn)
            .ok_or(RoomError::NotAMember(conn))?;

        let Some(handle) = self.rooms.get(&room_code).cloned() else {
            return Err(RoomError::NotFound(room_code));
        };

        match handle.leave(player_id).await {
            Ok(outcome) => {
                if outcome.room_empty {
                    self.rooms.remove(&room_code);
                    tracing::info!(%room_code, rooms = self.rooms.len(), "room removed");
                }
                Ok(outcome)
            }
            Err(RoomError::Unavailable(code)) => {
                self.rooms.remove(&code);
                Err(RoomError::Unavailable(code))
            }
            Err(e) => Err(e),
        }
    }

    /// Resolves a game action to the room's handle and the sender's player.
    ///
    /// The action is dropped unless `conn` is a member of exactly the room
    /// named by `raw_code`.
    pub fn route(&self, conn: ConnectionId, raw_code: &str) -> Result<(RoomHandle, PlayerId), Ignored> {
        let membership = self.members.get(&conn).ok_or(Ignored::NotMember)?;
        let named = RoomCode::parse(raw_code).map_err(|_| Ignored::NotMember)?;
        if named != membership.room_code {
            return Err(Ignored::NotMember);
        }
        let handle = self
            .rooms
            .get(&membership.room_code)
            .ok_or(Ignored::RoomGone)?;
        Ok((handle.clone(), membership.player_id))
    }

    pub async fn start_game(&self, conn: ConnectionId, raw_code: &str) -> Result<(), Ignored> {
        let (handle, player_id) = self.route(conn, raw_code)?;
        handle.start_game(player_id).await.map_err(|_| Ignored::RoomGone)
    }

    pub async fn next_question(&self, conn: ConnectionId, raw_code: &str) -> Result<(), Ignored> {
        let (handle, player_id) = self.route(conn, raw_code)?;
        handle.next_question(player_id).await.map_err(|_| Ignored::RoomGone)
    }

    pub async fn submit_answer(
        &self,
        conn: ConnectionId,
        raw_code: &str,
        answer_index: usize,
    ) -> Result<(), Ignored> {
        let (handle, player_id) = self.route(conn, raw_code)?;
        handle
            .submit_answer(player_id, answer_index)
            .await
            .map_err(|_| Ignored::RoomGone)
    }

    /// The public projection of a room.
    pub async fn public_state(&self, room_code: &RoomCode) -> Result<PublicRoomState, RoomError> {
        Ok(self.room_info(room_code).await?.state)
    }

    pub async fn room_info(&self, room_code: &RoomCode) -> Result<RoomInfo, RoomError> {
        let handle = self
            .rooms
            .get(room_code)
            .ok_or_else(|| RoomError::NotFound(room_code.clone()))?;
        handle.get_info().await
    }

    pub fn membership(&self, conn: ConnectionId) -> Option<&Membership> {
        self.members.get(&conn)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_codes(&self) -> Vec<RoomCode> {
        self.rooms.keys().cloned().collect()
    }

    /// Stops every room actor and forgets all memberships.
    pub async fn close_all(&mut self) {
        for (room_code, handle) in self.rooms.drain() {
            if handle.shutdown().await.is_err() {
                tracing::debug!(%room_code, "room already stopped");
            }
        }
        self.members.clear();
    }

    async fn leave_previous(&mut self, conn: ConnectionId) {
        if !self.members.contains_key(&conn) {
            return;
        }
        if let Err(e) = self.leave(conn).await {
            tracing::debug!(%conn, error = %e, "implicit leave failed");
        }
    }

    fn fresh_code(&mut self) -> Result<RoomCode, RoomError> {
        let attempts = self.config.max_code_attempts.max(1);
        for _ in 0..attempts {
            let code = (self.code_source)();
            if !self.rooms.contains_key(&code) {
                return Ok(code);
            }
            tracing::debug!(room_code = %code, "room code collision, retrying");
        }
        tracing::warn!(attempts, rooms = self.rooms.len(), "room code space exhausted");
        Err(RoomError::CodeSpaceExhausted(attempts))
    }

    fn allocate_player_id(&mut self) -> PlayerId {
        let id = PlayerId(self.next_player_id);
        self.next_player_id += 1;
        id
    }
}

fn parse_code(raw: &str) -> Result<RoomCode, RoomError> {
    RoomCode::parse(raw).map_err(|e| match e {
        ProtocolError::InvalidRoomCode(reason) => RoomError::InvalidRoomCode(reason),
        other => RoomError::InvalidRoomCode(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_code_keeps_reason() {
        let err = parse_code("").unwrap_err();
        let RoomError::InvalidRoomCode(reason) = err else {
            panic!("expected InvalidRoomCode");
        };
        assert!(!reason.starts_with("invalid room code"));
    }

    #[test]
    fn test_random_code_is_valid() {
        for _ in 0..100 {
            let code = random_code();
            assert!(RoomCode::parse(code.as_str()).is_ok());
        }
    }

    #[test]
    fn test_player_ids_are_unique_and_increasing() {
        let mut registry = RoomRegistry::new(QuestionBank::builtin(), RoomConfig::default());
        let a = registry.allocate_player_id();
        let b = registry.allocate_player_id();
        assert!(b > a);
    }
}
