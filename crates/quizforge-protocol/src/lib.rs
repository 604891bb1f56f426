//! Wire protocol for Quizforge.
//!
//! - **Types** ([`Envelope`], [`Payload`], [`SystemMessage`], [`RoomCode`],
//!   [`PlayerId`]): framing and identity.
//! - **Messages** ([`ClientRequest`], [`Reply`], [`ServerEvent`]): what
//!   clients ask for and what rooms broadcast.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, bytes out.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Room registry (PlayerId)
//! ```

mod codec;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{
    AnswerRecord, ClientRequest, LeaderboardEntry, PublicPlayer, PublicRoomState,
    QuestionPayload, Reply, ServerEvent,
};
pub use types::{
    Envelope, Payload, PlayerId, ROOM_CODE_ALPHABET, ROOM_CODE_LEN, RoomCode,
    SystemMessage,
};
