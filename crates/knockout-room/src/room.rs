//! Room actor: an isolated Tokio task that owns one [`GameRoom`].
//!
//! Connection tasks talk to the actor through a bounded command channel;
//! the room's timers talk to it through an unbounded signal channel. The
//! actor is the only code that touches game state, so the two inputs
//! never race.

use std::fmt;

use knockout_protocol::{ClientId, ClientMessage, ServerMessage};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::game::{GameRoom, RoomSnapshot, TimerSignal};
use crate::{RoomConfig, RoomError};

/// Unique identifier for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// Channel sender for delivering outbound messages to a player.
pub type PlayerSender = mpsc::UnboundedSender<ServerMessage>;

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    Join {
        client_id: ClientId,
        name: String,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    Leave {
        client_id: ClientId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// A decoded message from a player (fire-and-forget).
    Message {
        sender: ClientId,
        msg: ClientMessage,
    },

    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },

    Shutdown,
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    name: String,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a participant. They start in the lobby, or as a spectator if a
    /// game is running.
    pub async fn join(
        &self,
        client_id: ClientId,
        name: impl Into<String>,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join {
                client_id,
                name: name.into(),
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    pub async fn leave(&self, client_id: ClientId) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Leave {
                client_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Forwards a player's message. Rejections come back to the player as
    /// a private `MESSAGE`, not here.
    pub async fn send_message(
        &self,
        sender: ClientId,
        msg: ClientMessage,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Message { sender, msg })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Copy of the room's current state. Also a barrier: every command sent
    /// before it has been fully processed.
    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room_id: RoomId,
    game: GameRoom,
    receiver: mpsc::Receiver<RoomCommand>,
    timers: mpsc::UnboundedReceiver<TimerSignal>,
}

impl RoomActor {
    async fn run(mut self) {
        info!(room_id = %self.room_id, "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle_command(cmd) {
                        break;
                    }
                }
                Some(signal) = self.timers.recv() => {
                    let result = self.game.handle_timer(signal);
                    self.settle(None, result);
                }
            }
            self.reap_dead();
        }

        self.game.shutdown();
        info!(room_id = %self.room_id, "room actor stopped");
    }

    /// Returns `false` when the actor should stop.
    fn handle_command(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::Join {
                client_id,
                name,
                sender,
                reply,
            } => {
                let result = self.game.on_client_added(client_id, name, sender);
                let _ = reply.send(result);
            }
            RoomCommand::Leave { client_id, reply } => {
                let result = self.game.on_client_removed(client_id);
                let reply_result = match result {
                    Err(RoomError::NotInRoom(id)) => Err(RoomError::NotInRoom(id)),
                    other => {
                        // Leaving itself succeeded; anything it set off
                        // is the room's business.
                        self.settle(None, other);
                        Ok(())
                    }
                };
                let _ = reply.send(reply_result);
            }
            RoomCommand::Message { sender, msg } => {
                let result = self.dispatch(sender, msg);
                self.settle(Some(sender), result);
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.game.snapshot());
            }
            RoomCommand::Shutdown => {
                info!(room_id = %self.room_id, "room shutting down");
                return false;
            }
        }
        true
    }

    /// Routes one client message to its handler.
    fn dispatch(&mut self, sender: ClientId, msg: ClientMessage) -> Result<(), RoomError> {
        debug!(room_id = %self.room_id, client_id = %sender, ?msg, "client message");
        match msg {
            ClientMessage::Connect { .. } => Err(RoomError::AlreadyConnected),
            ClientMessage::Ready {
                is_ready,
                wants_spectator,
            } => self.game.handle_ready(sender, is_ready, wants_spectator),
            ClientMessage::Turn { choice } => self.game.handle_turn_action(sender, &choice),
            ClientMessage::ExtraOptionsToggle => self.game.handle_extra_options_toggle(sender),
            ClientMessage::ChoiceCooldownToggle => {
                self.game.handle_choice_cooldown_toggle(sender)
            }
            ClientMessage::AwayUpdate { away } => self.game.handle_away_toggle(sender, away),
            ClientMessage::Message { message } => self.game.handle_chat(sender, &message),
            ClientMessage::Disconnect => self.game.on_client_removed(sender),
        }
    }

    /// The error boundary: nothing a handler returns escapes the actor.
    fn settle(&mut self, client: Option<ClientId>, result: Result<(), RoomError>) {
        let Err(err) = result else {
            return;
        };
        match err {
            err if err.is_precondition() => {
                warn!(room_id = %self.room_id, client_id = ?client, %err, "action rejected");
                if let Some(id) = client {
                    self.game.notify(id, ServerMessage::notice(err.to_string()));
                }
            }
            RoomError::Scheduler(err) => {
                error!(room_id = %self.room_id, %err, "turn order broken, ending session");
                self.game.abort_session();
            }
            err => {
                error!(room_id = %self.room_id, client_id = ?client, %err, "room step failed");
            }
        }
    }

    /// Removes participants whose connection went away during the last
    /// step. Removal can itself find more.
    fn reap_dead(&mut self) {
        while let Some(id) = self.game.next_dead() {
            if !self.game.contains(id) {
                continue;
            }
            warn!(room_id = %self.room_id, client_id = %id, "delivery failed, removing client");
            let result = self.game.on_client_removed(id);
            self.settle(None, result);
        }
    }
}

/// Spawns a new room actor task and returns a handle to communicate with it.
///
/// `channel_size` bounds the command queue; senders wait when it's full.
pub(crate) fn spawn_room(
    room_id: RoomId,
    name: String,
    config: RoomConfig,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let (timer_tx, timer_rx) = mpsc::unbounded_channel();

    let actor = RoomActor {
        room_id,
        game: GameRoom::new(room_id, config.validated(), timer_tx),
        receiver: rx,
        timers: timer_rx,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        name,
        sender: tx,
    }
}
