//! Room actor: an isolated Tokio task that owns one [`Room`].
//!
//! Each room runs in its own task and talks to the outside world through
//! an mpsc channel. Commands from different rooms never contend; commands
//! for the same room are applied one at a time, in arrival order.

use std::collections::HashMap;

use quizforge_protocol::{Payload, PlayerId, PublicRoomState, Reply, RoomCode, ServerEvent};
use tokio::sync::{mpsc, oneshot};

use crate::room::{Outbound, Room};
use crate::{Ignored, Phase, QuestionBank, RoomConfig, RoomError};

/// Channel for delivering payloads to one connection's writer task.
pub type ConnectionSender = mpsc::UnboundedSender<Payload>;

/// What a player gets back after creating or joining a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinAck {
    pub room_code: RoomCode,
    pub player_id: PlayerId,
    pub is_host: bool,
}

impl JoinAck {
    fn reply(&self) -> Payload {
        Payload::Reply(Reply::RoomJoined {
            room_code: self.room_code.clone(),
            player_id: self.player_id,
            is_host: self.is_host,
        })
    }
}

/// Outcome of a leave, as seen by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub new_host: Option<PlayerId>,
    /// The actor has stopped and the room should be forgotten.
    pub room_empty: bool,
}

/// Commands sent to a room actor through its channel.
///
/// Variants carrying a `oneshot::Sender` expect an answer; the rest are
/// fire-and-forget.
pub(crate) enum RoomCommand {
    Join {
        player_id: PlayerId,
        nickname: String,
        sender: ConnectionSender,
        reply: oneshot::Sender<Result<JoinAck, RoomError>>,
    },
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<LeaveOutcome, RoomError>>,
    },
    StartGame {
        requester: PlayerId,
    },
    NextQuestion {
        requester: PlayerId,
    },
    SubmitAnswer {
        player_id: PlayerId,
        answer_index: usize,
    },
    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },
    Shutdown,
}

/// A point-in-time snapshot of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_code: RoomCode,
    pub phase: Phase,
    /// 0-based.
    pub question_index: usize,
    pub state: PublicRoomState,
}

/// Handle to a running room actor.
///
/// Cheap to clone: it wraps an `mpsc::Sender`. The registry holds one per
/// room and hands out clones so game commands never wait on the registry.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Adds a player. On success the actor has already queued the
    /// `roomJoined` reply to `sender`, ahead of the membership broadcast.
    pub async fn join(
        &self,
        player_id: PlayerId,
        nickname: &str,
        sender: ConnectionSender,
    ) -> Result<JoinAck, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Join {
            player_id,
            nickname: nickname.to_string(),
            sender,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    pub async fn leave(&self, player_id: PlayerId) -> Result<LeaveOutcome, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Leave {
            player_id,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    pub async fn start_game(&self, requester: PlayerId) -> Result<(), RoomError> {
        self.send(RoomCommand::StartGame { requester }).await
    }

    pub async fn next_question(&self, requester: PlayerId) -> Result<(), RoomError> {
        self.send(RoomCommand::NextQuestion { requester }).await
    }

    pub async fn submit_answer(
        &self,
        player_id: PlayerId,
        answer_index: usize,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::SubmitAnswer {
            player_id,
            answer_index,
        })
        .await
    }

    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::GetInfo { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Tells the room to stop. Members receive nothing further.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.send(RoomCommand::Shutdown).await
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender.send(cmd).await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.room_code.clone())
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct RoomActor {
    room: Room,
    /// Per-player outbound channels.
    senders: HashMap<PlayerId, ConnectionSender>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Processes commands until shutdown, the last player leaves, or every
    /// handle is dropped.
    async fn run(mut self) {
        let room_code = self.room.code().clone();
        tracing::info!(%room_code, host = %self.room.host(), "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            let before = self.room.phase();
            match cmd {
                RoomCommand::Join {
                    player_id,
                    nickname,
                    sender,
                    reply,
                } => {
                    let result = self.handle_join(player_id, &nickname, sender);
                    let _ = reply.send(result);
                }
                RoomCommand::Leave { player_id, reply } => {
                    let result = self.handle_leave(player_id);
                    let stop = matches!(result, Ok(LeaveOutcome { room_empty: true, .. }));
                    let _ = reply.send(result);
                    if stop {
                        tracing::info!(%room_code, "last player left, closing room");
                        break;
                    }
                }
                RoomCommand::StartGame { requester } => {
                    let result = self.room.start_game(requester);
                    self.apply("startGame", requester, result);
                }
                RoomCommand::NextQuestion { requester } => {
                    let result = self.room.next_question(requester);
                    self.apply("nextQuestion", requester, result);
                }
                RoomCommand::SubmitAnswer {
                    player_id,
                    answer_index,
                } => {
                    let result = self.room.submit_answer(player_id, answer_index);
                    self.apply("submitAnswer", player_id, result);
                }
                RoomCommand::GetInfo { reply } => {
                    let _ = reply.send(self.info());
                }
                RoomCommand::Shutdown => {
                    tracing::info!(%room_code, "room shutting down");
                    break;
                }
            }

            let after = self.room.phase();
            if after != before {
                tracing::info!(
                    %room_code,
                    from = %before,
                    to = %after,
                    question = self.room.question_index() + 1,
                    "phase changed"
                );
            }
        }

        tracing::info!(%room_code, "room actor stopped");
    }

    fn handle_join(
        &mut self,
        player_id: PlayerId,
        nickname: &str,
        sender: ConnectionSender,
    ) -> Result<JoinAck, RoomError> {
        let events = self.room.join(player_id, nickname)?;
        let ack = JoinAck {
            room_code: self.room.code().clone(),
            player_id,
            is_host: false,
        };

        // The reply goes out before the broadcast that includes the joiner.
        let _ = sender.send(ack.reply());
        self.senders.insert(player_id, sender);

        tracing::info!(
            room_code = %self.room.code(),
            %player_id,
            players = self.room.player_count(),
            "player joined"
        );
        self.dispatch(events);
        Ok(ack)
    }

    fn handle_leave(&mut self, player_id: PlayerId) -> Result<LeaveOutcome, RoomError> {
        let departure = self.room.remove_player(player_id)?;
        self.senders.remove(&player_id);

        tracing::info!(
            room_code = %self.room.code(),
            %player_id,
            players = self.room.player_count(),
            "player left"
        );
        if let Some(new_host) = departure.new_host {
            tracing::info!(room_code = %self.room.code(), %new_host, "host promoted");
        }

        self.dispatch(departure.events);
        Ok(LeaveOutcome {
            new_host: departure.new_host,
            room_empty: departure.room_empty,
        })
    }

    /// Dispatches the events of a game action, or logs why it was dropped.
    fn apply(&self, action: &str, player_id: PlayerId, result: Result<Outbound, Ignored>) {
        match result {
            Ok(events) => self.dispatch(events),
            Err(reason) => tracing::debug!(
                room_code = %self.room.code(),
                %player_id,
                action,
                %reason,
                "action ignored"
            ),
        }
    }

    /// Broadcasts outbound events to every member, in order.
    ///
    /// A member whose writer is gone is skipped; the disconnect path removes
    /// them shortly after.
    fn dispatch(&self, events: Outbound) {
        for event in events {
            tracing::trace!(room_code = %self.room.code(), event = event.name(), "dispatch");
            for sender in self.senders.values() {
                let _ = sender.send(Payload::Event(event.clone()));
            }
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_code: self.room.code().clone(),
            phase: self.room.phase(),
            question_index: self.room.question_index(),
            state: self.room.public_state(),
        }
    }
}

/// Spawns a room actor with `host` as its first player and returns a handle.
///
/// The creator's `roomJoined` reply and the initial `roomUpdate` are queued
/// on `sender` before this returns. `config.channel_size` bounds the command
/// queue; senders wait when it is full.
pub(crate) fn spawn_room(
    room_code: RoomCode,
    host: PlayerId,
    nickname: &str,
    sender: ConnectionSender,
    bank: QuestionBank,
    config: RoomConfig,
) -> (RoomHandle, JoinAck) {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));

    let room = Room::new(room_code.clone(), host, nickname, bank, config);
    let ack = JoinAck {
        room_code: room_code.clone(),
        player_id: host,
        is_host: true,
    };
    let _ = sender.send(ack.reply());
    let _ = sender.send(Payload::Event(ServerEvent::RoomUpdate(room.public_state())));

    let mut senders = HashMap::new();
    senders.insert(host, sender);

    let actor = RoomActor {
        room,
        senders,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    (
        RoomHandle {
            room_code,
            sender: tx,
        },
        ack,
    )
}
