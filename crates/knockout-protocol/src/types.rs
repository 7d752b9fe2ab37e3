//! Message types for Knockout's wire format.
//!
//! Every frame is a flat JSON object with a `"type"` tag in
//! SCREAMING_SNAKE_CASE, e.g. `{"type":"POINTS","client_id":3,"points":1}`.
//! Inbound and outbound traffic use separate enums because several tags
//! (`TURN`, `READY`, `AWAY_UPDATE`, `EXTRA_OPTIONS_TOGGLE`) carry different
//! fields depending on direction.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identity of a connected client, derived from its connection id.
///
/// Serialized as a bare number. `ClientId(0)` is reserved for the server
/// itself and is used as the sender of private system messages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl ClientId {
    /// Sender id used for messages that originate from the server.
    pub const SERVER: ClientId = ClientId(0);
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Room-wide stage gating which actions are accepted.
///
/// ```text
/// Ready ──(session start)──→ InProgress ──(session end)──→ Ready
/// ```
///
/// `Ready` is both the initial state and the state a room returns to after
/// every session; there are no other edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Lobby: ready checks, spectating, host configuration.
    #[default]
    Ready,
    /// A session is running: turn actions and timers.
    InProgress,
}

impl Phase {
    /// Returns `true` while a session is running.
    pub fn is_active(self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// The only phase reachable from this one.
    pub fn next(self) -> Self {
        match self {
            Self::Ready => Self::InProgress,
            Self::InProgress => Self::Ready,
        }
    }

    /// Returns `true` if `target` is a legal transition from this phase.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == target
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "READY"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
        }
    }
}

/// Which countdown a `TIME` notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerKind {
    /// Whole-round countdown (simultaneous play).
    Round,
    /// Per-player countdown (turn-based play).
    Turn,
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Round => write!(f, "round"),
            Self::Turn => write!(f, "turn"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Commands a client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// First frame on a new connection: who I am and where I want to play.
    /// A missing `room` means the server's default room.
    Connect {
        client_name: String,
        #[serde(default)]
        room: Option<String>,
    },

    /// Ready check. `is_ready: false` or `wants_spectator: true` means
    /// "let me watch".
    Ready {
        is_ready: bool,
        #[serde(default)]
        wants_spectator: bool,
    },

    /// A pick for the current round: `r`, `p`, `s` (plus `f`, `w` with
    /// extra options), or the full name. Validated by the room.
    Turn { choice: String },

    /// Host only: flip the five-symbol rule set.
    ExtraOptionsToggle,

    /// Host only: flip the "no repeating last round's pick" rule.
    ChoiceCooldownToggle,

    /// Mark myself away (or back).
    AwayUpdate { away: bool },

    /// Chat line for everyone in the room. Relayed as a server `MESSAGE`
    /// carrying the sender's id.
    Message { message: String },

    /// I'm leaving.
    Disconnect,
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Notifications the server pushes to clients.
///
/// The `SYNC_*` variants carry the same data as their plain counterparts but
/// tell the client to update silently (late-join catch-up, no animation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// Handshake reply: the id the server assigned to this connection.
    #[serde(rename = "CLIENT_ID")]
    Welcome {
        client_id: ClientId,
        client_name: String,
    },

    /// Someone joined the room.
    RoomJoin {
        client_id: ClientId,
        client_name: String,
    },

    /// Someone left the room.
    RoomLeave {
        client_id: ClientId,
        client_name: String,
    },

    /// Roster entry for a late joiner.
    SyncClient {
        client_id: ClientId,
        client_name: String,
    },

    /// The room's current phase.
    Phase { phase: Phase },

    /// `client_id` has (or has not) taken their turn this round.
    Turn { client_id: ClientId, took_turn: bool },

    /// Silent form of [`ServerMessage::Turn`].
    SyncTurn { client_id: ClientId, took_turn: bool },

    /// `client_id` is (or is no longer) ready.
    Ready { client_id: ClientId, is_ready: bool },

    /// Silent form of [`ServerMessage::Ready`].
    SyncReady { client_id: ClientId, is_ready: bool },

    /// `client_id` is (or is no longer) spectating.
    Spectator { client_id: ClientId, is_spectator: bool },

    /// Countdown update. `time == -1` means the timer was cleared.
    Time { timer: TimerKind, time: i32 },

    /// Point total for `client_id`.
    Points { client_id: ClientId, points: u32 },

    /// Whether `client_id` still owes a pick this round.
    PendingPick { client_id: ClientId, pending: bool },

    /// Whether `client_id` is knocked out of the current session.
    Eliminated { client_id: ClientId, eliminated: bool },

    /// Whether `client_id` is away.
    AwayUpdate { client_id: ClientId, away: bool },

    /// Sent to one client: are you the host?
    HostStatus { is_host: bool },

    /// Current value of the extra-options flag (join-time sync).
    ExtraOptionsEnabled { enabled: bool },

    /// The host flipped the extra-options flag.
    ExtraOptionsToggle { enabled: bool },

    /// Current value of the choice-cooldown flag.
    ChoiceCooldownToggle { enabled: bool },

    /// Free-text narration for the game log.
    GameEvent { message: String },

    /// A chat-style message; `client_id` is the sender
    /// ([`ClientId::SERVER`] for system notices).
    Message { client_id: ClientId, message: String },

    /// Acknowledges an accepted pick.
    TurnConfirmed,

    /// Connection-level failure (bad frame, bad handshake).
    Error { code: u16, message: String },
}

impl ServerMessage {
    /// `TIME` value meaning "this countdown is gone".
    pub const TIME_CLEARED: i32 = -1;

    /// A private system notice to one client.
    pub fn notice(message: impl Into<String>) -> Self {
        Self::Message {
            client_id: ClientId::SERVER,
            message: message.into(),
        }
    }

    /// Narration for the game log.
    pub fn event(message: impl Into<String>) -> Self {
        Self::GameEvent {
            message: message.into(),
        }
    }

    /// `TIME` notification clearing the given countdown.
    pub fn timer_cleared(timer: TimerKind) -> Self {
        Self::Time {
            timer,
            time: Self::TIME_CLEARED,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
