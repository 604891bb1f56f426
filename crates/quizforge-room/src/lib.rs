//! Quiz rooms for Quizforge.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns a
//! [`Room`] state machine: players, host, phase, scores and the answers to
//! the current question.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates rooms, maps connections to players, routes
//!   game actions
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`Room`]: the synchronous game state machine
//! - [`Phase`]: lobby → question open → revealed → … → finished
//! - [`QuestionBank`]: the validated, shared question list
//! - [`RoomConfig`]: scoring and naming settings

mod actor;
mod config;
mod error;
mod questions;
mod registry;
mod room;

pub use actor::{ConnectionSender, JoinAck, LeaveOutcome, RoomHandle, RoomInfo};
pub use config::{Phase, RoomConfig};
pub use error::{Ignored, RoomError};
pub use questions::{Question, QuestionBank};
pub use registry::{Membership, RoomRegistry};
pub use room::{Departure, Outbound, Player, Room};
