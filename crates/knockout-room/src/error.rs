//! Error types for the room layer.

use knockout_protocol::{ClientId, Phase};

use crate::RoomId;
use crate::rules::Choice;
use crate::scheduler::SchedulerError;

/// Errors that can occur during room operations.
///
/// The first group are precondition failures: the player asked for
/// something the room won't allow right now. Their `Display` text is shown
/// to that player verbatim.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("You are not in this room.")]
    NotInRoom(ClientId),

    #[error("You must be ready to do that.")]
    NotReady,

    #[error("You can't do that right now (the room is in the {actual} phase).")]
    WrongPhase { expected: Phase, actual: Phase },

    #[error("You have been eliminated; wait for the next game.")]
    Eliminated,

    #[error("You already picked this round.")]
    AlreadyChose,

    #[error("You are marked away.")]
    Away,

    #[error("Spectators can't do that.")]
    Spectator,

    #[error("It isn't your turn.")]
    NotYourTurn,

    #[error("'{choice}' isn't a valid pick. Choose one of: {allowed}.")]
    InvalidChoice { choice: String, allowed: String },

    #[error("You can't pick {choice} twice in a row. Choose one of: {allowed}.")]
    ChoiceOnCooldown { choice: Choice, allowed: String },

    #[error("Only the host can do that.")]
    NotHost,

    #[error("Only ready players can go away.")]
    AwayUnavailable,

    #[error("You are already connected.")]
    AlreadyConnected,

    #[error("Messages can't be empty.")]
    EmptyMessage,

    // -- directory ---------------------------------------------------------

    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// No more participant slots.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    #[error("client {0} already in room {1}")]
    AlreadyInRoom(ClientId, RoomId),

    /// The room's command channel is full or closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    // -- invariants --------------------------------------------------------

    /// The turn order was used at the wrong time. Ends the session.
    #[error("turn scheduler: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("internal room error: {0}")]
    Internal(String),
}

impl RoomError {
    /// `true` for errors caused by what a player asked for, which are
    /// reported back to that player and change nothing.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotInRoom(_)
                | Self::NotReady
                | Self::WrongPhase { .. }
                | Self::Eliminated
                | Self::AlreadyChose
                | Self::Away
                | Self::Spectator
                | Self::NotYourTurn
                | Self::InvalidChoice { .. }
                | Self::ChoiceOnCooldown { .. }
                | Self::NotHost
                | Self::AwayUnavailable
                | Self::AlreadyConnected
                | Self::EmptyMessage
        )
    }
}
