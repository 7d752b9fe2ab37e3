//! Per-player state inside a room.

use knockout_protocol::{ClientId, ServerMessage};
use serde::{Deserialize, Serialize};

use crate::PlayerSender;
use crate::rules::Choice;

/// Where a participant stands. Exactly one at a time.
///
/// ```text
///            ready              away
/// Pending ─────────→ Ready ←────────→ Away
///    ↑  ╲ spectate     │ lost / no pick
///    │   ↘             ↓
///    │   Spectator   Eliminated
///    └── session end (Ready, Away, Eliminated)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Connected, hasn't answered the ready check.
    #[default]
    Pending,
    /// Ready in the lobby; alive during a session.
    Ready,
    /// Ready but stepped away: skipped for turns, exempt from forfeits.
    Away,
    /// Knocked out of the current session.
    Eliminated,
    /// Watching only.
    Spectator,
}

impl Status {
    /// Passed the ready check (away and eliminated players did too).
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready | Self::Away | Self::Eliminated)
    }

    /// Still in the running this session.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Ready | Self::Away)
    }
}

/// One connected player or spectator.
#[derive(Debug)]
pub(crate) struct Participant {
    pub id: ClientId,
    pub name: String,
    pub status: Status,
    pub points: u32,
    pub choice: Option<Choice>,
    /// Previous round's pick, for the choice cooldown.
    pub last_choice: Option<Choice>,
    pub took_turn: bool,
    pub host: bool,
    sender: PlayerSender,
}

impl Participant {
    pub fn new(id: ClientId, name: String, status: Status, host: bool, sender: PlayerSender) -> Self {
        Self {
            id,
            name,
            status,
            points: 0,
            choice: None,
            last_choice: None,
            took_turn: false,
            host,
            sender,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status.is_ready()
    }

    pub fn is_spectator(&self) -> bool {
        self.status == Status::Spectator
    }

    pub fn is_away(&self) -> bool {
        self.status == Status::Away
    }

    pub fn is_eliminated(&self) -> bool {
        self.status == Status::Eliminated
    }

    /// Owes a pick this round.
    pub fn is_pending_pick(&self) -> bool {
        self.status == Status::Ready && self.choice.is_none()
    }

    /// Queues `msg` on this participant's connection. `false` means the
    /// connection is gone.
    pub fn send(&self, msg: ServerMessage) -> bool {
        self.sender.send(msg).is_ok()
    }

    /// Clears everything a session accumulated. Spectators stay spectators.
    pub fn reset(&mut self) {
        self.points = 0;
        self.choice = None;
        self.last_choice = None;
        self.took_turn = false;
        if self.status.is_ready() {
            self.status = Status::Pending;
        }
    }

    pub fn view(&self) -> ParticipantView {
        ParticipantView {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
            points: self.points,
            choice: self.choice,
            took_turn: self.took_turn,
            host: self.host,
        }
    }
}

/// Read-only copy of a participant, as returned in room snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantView {
    pub id: ClientId,
    pub name: String,
    pub status: Status,
    pub points: u32,
    pub choice: Option<Choice>,
    pub took_turn: bool,
    pub host: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn participant(status: Status) -> (Participant, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Participant::new(ClientId(1), "ana".into(), status, false, tx), rx)
    }

    #[test]
    fn test_status_derived_flags() {
        assert!(Status::Ready.is_ready());
        assert!(Status::Away.is_ready());
        assert!(Status::Eliminated.is_ready());
        assert!(!Status::Pending.is_ready());
        assert!(!Status::Spectator.is_ready());
        assert!(Status::Away.is_active());
        assert!(!Status::Eliminated.is_active());
    }

    #[test]
    fn test_reset_returns_players_to_pending() {
        for status in [Status::Ready, Status::Away, Status::Eliminated] {
            let (mut p, _rx) = participant(status);
            p.points = 3;
            p.choice = Some(Choice::Rock);
            p.last_choice = Some(Choice::Paper);
            p.took_turn = true;
            p.reset();
            assert_eq!(p.status, Status::Pending);
            assert_eq!(p.points, 0);
            assert_eq!(p.choice, None);
            assert_eq!(p.last_choice, None);
            assert!(!p.took_turn);
        }
    }

    #[test]
    fn test_reset_keeps_spectators() {
        let (mut p, _rx) = participant(Status::Spectator);
        p.reset();
        assert_eq!(p.status, Status::Spectator);
    }

    #[test]
    fn test_send_reports_closed_connection() {
        let (p, rx) = participant(Status::Ready);
        assert!(p.send(ServerMessage::TurnConfirmed));
        drop(rx);
        assert!(!p.send(ServerMessage::TurnConfirmed));
    }

    #[test]
    fn test_pending_pick_only_for_ready_without_choice() {
        let (mut p, _rx) = participant(Status::Ready);
        assert!(p.is_pending_pick());
        p.choice = Some(Choice::Scissors);
        assert!(!p.is_pending_pick());
        p.choice = None;
        p.status = Status::Away;
        assert!(!p.is_pending_pick());
    }
}
