//! The game state machine for one room.
//!
//! ```text
//! Ready ──(all ready, ≥ min players)──→ InProgress ──(winner / tie / empty)──→ Ready
//!                                          │
//!                    round start ←─────────┤  ≥ 2 survivors
//!                       │                  │
//!          simultaneous │ turn-based       │
//!          round timer  │ turn → turn → …  │
//!                       └──→ round end ────┘
//! ```
//!
//! `GameRoom` is owned by the room actor and only ever touched from that
//! task, so every lifecycle step below runs to completion before the next
//! command or timer signal is looked at.
//!
//! Outbound messages go straight onto each participant's channel. A send
//! that fails marks the participant dead; the actor removes dead
//! participants after the current step (see [`GameRoom::next_dead`]).

use std::collections::{BTreeMap, BTreeSet};

use knockout_protocol::{ClientId, Phase, ServerMessage, TimerKind};
use knockout_timer::TimedEvent;
use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::config::{PlayStyle, RoomConfig};
use crate::participant::{Participant, ParticipantView, Status};
use crate::resolution::{self, DuelResult, Entrant};
use crate::rules::{self, Choice, RuleSet};
use crate::scheduler::TurnScheduler;
use crate::{PlayerSender, RoomError, RoomId};

// ---------------------------------------------------------------------------
// Timer signals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerEvent {
    Tick(u32),
    Expired,
}

/// What a timer callback sends back to the actor.
///
/// `epoch` identifies the arming; signals from a timer that has since been
/// cancelled or replaced are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimerSignal {
    pub kind: TimerKind,
    pub epoch: u64,
    pub event: TimerEvent,
}

struct ActiveTimer {
    epoch: u64,
    event: TimedEvent,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A point-in-time copy of a room, for tests and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub phase: Phase,
    pub round: u32,
    pub style: PlayStyle,
    /// In join order.
    pub participants: Vec<ParticipantView>,
    pub turn_order: Vec<ClientId>,
    pub current_turn: Option<ClientId>,
    pub extra_options: bool,
    pub choice_cooldown: bool,
    pub active_timer: Option<TimerKind>,
}

impl RoomSnapshot {
    pub fn participant(&self, id: ClientId) -> Option<&ParticipantView> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn host(&self) -> Option<ClientId> {
        self.participants.iter().find(|p| p.host).map(|p| p.id)
    }
}

// ---------------------------------------------------------------------------
// GameRoom
// ---------------------------------------------------------------------------

pub(crate) struct GameRoom {
    room_id: RoomId,
    config: RoomConfig,
    phase: Phase,
    round: u32,
    roster: BTreeMap<ClientId, Participant>,
    scheduler: TurnScheduler,
    round_timer: Option<ActiveTimer>,
    turn_timer: Option<ActiveTimer>,
    epoch: u64,
    extra_options: bool,
    choice_cooldown: bool,
    timer_tx: mpsc::UnboundedSender<TimerSignal>,
    dead: BTreeSet<ClientId>,
}

impl GameRoom {
    pub fn new(
        room_id: RoomId,
        config: RoomConfig,
        timer_tx: mpsc::UnboundedSender<TimerSignal>,
    ) -> Self {
        Self {
            room_id,
            config,
            phase: Phase::Ready,
            round: 0,
            roster: BTreeMap::new(),
            scheduler: TurnScheduler::new(),
            round_timer: None,
            turn_timer: None,
            epoch: 0,
            extra_options: false,
            choice_cooldown: false,
            timer_tx,
            dead: BTreeSet::new(),
        }
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.roster.contains_key(&id)
    }

    /// Next participant whose connection went away, if any.
    pub fn next_dead(&mut self) -> Option<ClientId> {
        self.dead.pop_first()
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        let active_timer = if self.round_timer.is_some() {
            Some(TimerKind::Round)
        } else if self.turn_timer.is_some() {
            Some(TimerKind::Turn)
        } else {
            None
        };
        RoomSnapshot {
            room_id: self.room_id,
            phase: self.phase,
            round: self.round,
            style: self.config.style,
            participants: self.roster.values().map(Participant::view).collect(),
            turn_order: self.scheduler.order().to_vec(),
            current_turn: self.scheduler.current(),
            extra_options: self.extra_options,
            choice_cooldown: self.choice_cooldown,
            active_timer,
        }
    }

    fn rules(&self) -> &'static dyn RuleSet {
        rules::rule_set(self.extra_options)
    }

    fn participant(&self, id: ClientId) -> Result<&Participant, RoomError> {
        self.roster.get(&id).ok_or(RoomError::NotInRoom(id))
    }

    fn participant_mut(&mut self, id: ClientId) -> Result<&mut Participant, RoomError> {
        self.roster.get_mut(&id).ok_or(RoomError::NotInRoom(id))
    }

    fn name_of(&self, id: ClientId) -> String {
        self.roster
            .get(&id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Ready players who haven't picked yet this round.
    fn outstanding_picks(&self) -> usize {
        self.roster.values().filter(|p| p.is_pending_pick()).count()
    }

    // -- fan-out ------------------------------------------------------------

    fn broadcast(&mut self, msg: ServerMessage) {
        for p in self.roster.values() {
            if !p.send(msg.clone()) {
                self.dead.insert(p.id);
            }
        }
    }

    fn send_to(&mut self, id: ClientId, msg: ServerMessage) {
        if let Some(p) = self.roster.get(&id) {
            if !p.send(msg) {
                self.dead.insert(id);
            }
        }
    }

    /// Sends one message to one participant.
    pub fn notify(&mut self, id: ClientId, msg: ServerMessage) {
        self.send_to(id, msg);
    }

    fn event(&mut self, message: impl Into<String>) {
        self.broadcast(ServerMessage::event(message));
    }

    // -- timers -------------------------------------------------------------

    fn timer_slot(&mut self, kind: TimerKind) -> &mut Option<ActiveTimer> {
        match kind {
            TimerKind::Round => &mut self.round_timer,
            TimerKind::Turn => &mut self.turn_timer,
        }
    }

    fn arm_timer(&mut self, kind: TimerKind, units: u32) {
        self.epoch += 1;
        let epoch = self.epoch;
        let tick_tx = self.timer_tx.clone();
        let done_tx = self.timer_tx.clone();
        let event = TimedEvent::start(
            units,
            self.config.timer_unit,
            move |left| {
                let _ = tick_tx.send(TimerSignal {
                    kind,
                    epoch,
                    event: TimerEvent::Tick(left),
                });
            },
            move || {
                let _ = done_tx.send(TimerSignal {
                    kind,
                    epoch,
                    event: TimerEvent::Expired,
                });
            },
        );
        // Replacing the slot drops (and so cancels) any previous timer.
        *self.timer_slot(kind) = Some(ActiveTimer { epoch, event });
        trace!(room_id = %self.room_id, timer = %kind, epoch, units, "timer armed");
        self.broadcast(ServerMessage::Time {
            timer: kind,
            time: i32::try_from(units).unwrap_or(i32::MAX),
        });
    }

    fn cancel_timer(&mut self, kind: TimerKind) {
        if let Some(timer) = self.timer_slot(kind).take() {
            timer.event.cancel();
            trace!(room_id = %self.room_id, timer = %kind, epoch = timer.epoch, "timer cancelled");
            self.broadcast(ServerMessage::timer_cleared(kind));
        }
    }

    fn cancel_timers(&mut self) {
        self.cancel_timer(TimerKind::Round);
        self.cancel_timer(TimerKind::Turn);
    }

    /// Applies a tick or expiry from one of this room's timers.
    pub fn handle_timer(&mut self, signal: TimerSignal) -> Result<(), RoomError> {
        let armed = self.timer_slot(signal.kind).as_ref().map(|t| t.epoch);
        if armed != Some(signal.epoch) {
            trace!(
                room_id = %self.room_id,
                timer = %signal.kind,
                epoch = signal.epoch,
                "stale timer signal ignored"
            );
            return Ok(());
        }

        match signal.event {
            TimerEvent::Tick(left) => {
                self.broadcast(ServerMessage::Time {
                    timer: signal.kind,
                    time: i32::try_from(left).unwrap_or(i32::MAX),
                });
                Ok(())
            }
            TimerEvent::Expired => {
                self.timer_slot(signal.kind).take();
                debug!(room_id = %self.room_id, timer = %signal.kind, round = self.round, "timer expired");
                match signal.kind {
                    TimerKind::Round => self.on_round_end(),
                    TimerKind::Turn => self.on_turn_end(),
                }
            }
        }
    }

    // -- membership ---------------------------------------------------------

    pub fn on_client_added(
        &mut self,
        id: ClientId,
        name: String,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        if self.roster.contains_key(&id) {
            return Err(RoomError::AlreadyInRoom(id, self.room_id));
        }
        if self.roster.len() >= self.config.max_players {
            return Err(RoomError::RoomFull(self.room_id));
        }

        let late = self.phase.is_active();
        let status = if late { Status::Spectator } else { Status::Pending };
        let host = self.roster.is_empty();
        self.roster
            .insert(id, Participant::new(id, name.clone(), status, host, sender));
        info!(
            room_id = %self.room_id,
            client_id = %id,
            %name,
            host,
            late,
            players = self.roster.len(),
            "client joined"
        );

        self.broadcast(ServerMessage::RoomJoin {
            client_id: id,
            client_name: name,
        });
        self.sync_joiner(id);

        if late {
            self.broadcast(ServerMessage::Spectator {
                client_id: id,
                is_spectator: true,
            });
            self.send_to(
                id,
                ServerMessage::notice("A game is in progress. You are spectating until it ends."),
            );
        }
        Ok(())
    }

    /// Brings a new participant's view of the room up to date.
    fn sync_joiner(&mut self, id: ClientId) {
        let in_game = self.phase.is_active();
        let mut sync = vec![ServerMessage::Phase { phase: self.phase }];

        for p in self.roster.values().filter(|p| p.id != id) {
            sync.push(ServerMessage::SyncClient {
                client_id: p.id,
                client_name: p.name.clone(),
            });
            sync.push(ServerMessage::SyncReady {
                client_id: p.id,
                is_ready: p.is_ready(),
            });
            sync.push(ServerMessage::Spectator {
                client_id: p.id,
                is_spectator: p.is_spectator(),
            });
            if p.is_away() {
                sync.push(ServerMessage::AwayUpdate {
                    client_id: p.id,
                    away: true,
                });
            }
            if in_game {
                sync.push(ServerMessage::SyncTurn {
                    client_id: p.id,
                    took_turn: p.took_turn,
                });
                sync.push(ServerMessage::Points {
                    client_id: p.id,
                    points: p.points,
                });
                sync.push(ServerMessage::Eliminated {
                    client_id: p.id,
                    eliminated: p.is_eliminated(),
                });
            }
        }

        let is_host = self.roster.get(&id).is_some_and(|p| p.host);
        sync.push(ServerMessage::HostStatus { is_host });
        sync.push(ServerMessage::ExtraOptionsEnabled {
            enabled: self.extra_options,
        });
        sync.push(ServerMessage::ChoiceCooldownToggle {
            enabled: self.choice_cooldown,
        });

        for msg in sync {
            self.send_to(id, msg);
        }
    }

    pub fn on_client_removed(&mut self, id: ClientId) -> Result<(), RoomError> {
        let gone = self.roster.remove(&id).ok_or(RoomError::NotInRoom(id))?;
        self.dead.remove(&id);
        info!(
            room_id = %self.room_id,
            client_id = %id,
            name = %gone.name,
            players = self.roster.len(),
            "client left"
        );
        self.broadcast(ServerMessage::RoomLeave {
            client_id: id,
            client_name: gone.name,
        });

        if gone.host {
            self.reassign_host();
        }

        if self.roster.is_empty() {
            self.cancel_timers();
            self.on_session_end();
            self.scheduler.clear();
            return Ok(());
        }

        if !self.phase.is_active() {
            // A lobby straggler leaving can be what everyone was waiting for.
            return self.check_all_ready(false);
        }

        match self.config.style {
            PlayStyle::Simultaneous => {
                self.scheduler.remove(id);
                if self.outstanding_picks() == 0 {
                    return self.on_round_end();
                }
            }
            PlayStyle::TurnBased => {
                let holder = self.scheduler.current() == Some(id);
                let was_last = holder && self.scheduler.is_last()?;
                self.scheduler.remove(id);
                if holder {
                    debug!(room_id = %self.room_id, client_id = %id, "turn holder left");
                    self.cancel_timer(TimerKind::Turn);
                    return if was_last {
                        self.on_round_end()
                    } else {
                        self.on_turn_start()
                    };
                }
            }
        }
        Ok(())
    }

    /// Hands the host role to the earliest remaining joiner.
    fn reassign_host(&mut self) {
        let Some(next) = self.roster.values_mut().next() else {
            return;
        };
        next.host = true;
        let id = next.id;
        info!(room_id = %self.room_id, client_id = %id, "host passed on");
        self.send_to(id, ServerMessage::HostStatus { is_host: true });
    }

    // -- lifecycle ----------------------------------------------------------

    fn on_session_start(&mut self) -> Result<(), RoomError> {
        if !self.phase.can_transition_to(Phase::InProgress) {
            return Err(RoomError::WrongPhase {
                expected: Phase::Ready,
                actual: self.phase,
            });
        }
        self.phase = Phase::InProgress;
        self.round = 0;

        let mut order: Vec<ClientId> = self
            .roster
            .values()
            .filter(|p| p.is_ready() && !p.is_spectator())
            .map(|p| p.id)
            .collect();
        if self.config.shuffle_turn_order {
            order.shuffle(&mut rand::rng());
        }
        info!(
            room_id = %self.room_id,
            players = order.len(),
            style = ?self.config.style,
            rules = self.rules().name(),
            "session started"
        );

        let names: Vec<String> = order.iter().map(|id| self.name_of(*id)).collect();
        self.scheduler.set_order(order);
        self.broadcast(ServerMessage::Phase {
            phase: Phase::InProgress,
        });
        self.event("The game has started!");
        if self.config.style == PlayStyle::TurnBased {
            self.event(format!("Turn order: {}", names.join(", ")));
        }
        self.on_round_start()
    }

    fn on_round_start(&mut self) -> Result<(), RoomError> {
        self.cancel_timers();

        let mut active = Vec::new();
        for p in self.roster.values_mut().filter(|p| p.status.is_active()) {
            p.last_choice = p.choice.take();
            p.took_turn = false;
            active.push((p.id, p.status == Status::Ready));
        }
        self.round += 1;
        info!(room_id = %self.room_id, round = self.round, players = active.len(), "round started");

        for (id, pending) in active {
            self.broadcast(ServerMessage::Turn {
                client_id: id,
                took_turn: false,
            });
            if pending {
                self.broadcast(ServerMessage::PendingPick {
                    client_id: id,
                    pending: true,
                });
            }
        }
        let prompt = self.rules().describe();
        self.event(format!("Round {} has started! Pick one of: {prompt}", self.round));

        match self.config.style {
            PlayStyle::Simultaneous => {
                self.arm_timer(TimerKind::Round, self.config.round_secs);
                Ok(())
            }
            PlayStyle::TurnBased => {
                self.scheduler.rewind();
                self.on_turn_start()
            }
        }
    }

    /// Passes the turn to the next player who can still pick this round.
    fn on_turn_start(&mut self) -> Result<(), RoomError> {
        self.cancel_timer(TimerKind::Turn);
        loop {
            if self.scheduler.current().is_some() && self.scheduler.is_last()? {
                debug!(room_id = %self.room_id, round = self.round, "no one left to take a turn");
                return self.on_round_end();
            }
            let id = self.scheduler.advance()?;
            let eligible = self.roster.get(&id).is_some_and(|p| p.is_pending_pick());
            if !eligible {
                trace!(room_id = %self.room_id, client_id = %id, "skipping turn");
                continue;
            }

            let name = self.name_of(id);
            debug!(room_id = %self.room_id, client_id = %id, round = self.round, "turn started");
            self.event(format!("It's {name}'s turn."));
            let prompt = format!("Your turn! Pick one of: {}", self.rules().describe());
            self.send_to(id, ServerMessage::notice(prompt));
            self.arm_timer(TimerKind::Turn, self.config.turn_secs);
            return Ok(());
        }
    }

    fn on_turn_end(&mut self) -> Result<(), RoomError> {
        self.cancel_timer(TimerKind::Turn);
        if self.scheduler.is_last()? {
            self.on_round_end()
        } else {
            self.on_turn_start()
        }
    }

    fn on_round_end(&mut self) -> Result<(), RoomError> {
        self.cancel_timers();

        // Both styles resolve in turn order, so adjacency follows the shuffle.
        let order = self.scheduler.order().to_vec();
        let entrants: Vec<Entrant> = order
            .iter()
            .filter_map(|id| self.roster.get(id))
            .filter(|p| p.status.is_active())
            .map(|p| Entrant {
                id: p.id,
                choice: p.choice,
                exempt: p.is_away(),
            })
            .collect();

        let outcome = resolution::resolve(self.config.resolution, self.rules(), &entrants);
        info!(
            room_id = %self.room_id,
            round = self.round,
            forfeits = outcome.forfeits.len(),
            duels = outcome.duels.len(),
            eliminated = outcome.eliminated.len(),
            "round resolved"
        );

        for &id in &outcome.forfeits {
            let name = self.name_of(id);
            self.event(format!("{name} was eliminated for not picking."));
        }
        for duel in &outcome.duels {
            let a = format!("{} ({})", self.name_of(duel.attacker), duel.attacker_choice);
            let b = format!("{} ({})", self.name_of(duel.defender), duel.defender_choice);
            let line = match duel.result {
                DuelResult::Win => format!("{a} beat {b}"),
                DuelResult::Loss => format!("{b} beat {a}"),
                DuelResult::Tie => format!("{a} tied with {b}"),
            };
            self.event(line);
        }
        for (&id, &earned) in &outcome.points {
            if let Some(p) = self.roster.get_mut(&id) {
                p.points += earned;
                let points = p.points;
                self.broadcast(ServerMessage::Points {
                    client_id: id,
                    points,
                });
            }
        }
        for id in outcome.knocked_out() {
            if let Some(p) = self.roster.get_mut(&id) {
                p.status = Status::Eliminated;
            }
            self.broadcast(ServerMessage::Eliminated {
                client_id: id,
                eliminated: true,
            });
        }
        for &id in &outcome.eliminated {
            let name = self.name_of(id);
            self.event(format!("{name} was eliminated."));
        }
        for entrant in &entrants {
            self.broadcast(ServerMessage::PendingPick {
                client_id: entrant.id,
                pending: false,
            });
        }

        let survivors: Vec<ClientId> = self
            .roster
            .values()
            .filter(|p| p.status == Status::Ready)
            .map(|p| p.id)
            .collect();
        self.event(format!("Survivors remaining: {}", survivors.len()));
        match survivors.as_slice() {
            [winner] => {
                let name = self.name_of(*winner);
                info!(room_id = %self.room_id, client_id = %winner, round = self.round, "session won");
                self.event(format!("{name} wins the game!"));
                self.on_session_end();
                Ok(())
            }
            [] => {
                info!(room_id = %self.room_id, round = self.round, "session tied");
                self.event("Nobody is left standing. It's a tie!");
                self.on_session_end();
                Ok(())
            }
            _ => self.on_round_start(),
        }
    }

    /// Announces the standings and returns the room to the lobby. Does
    /// nothing if no session is running.
    fn on_session_end(&mut self) {
        if !self.phase.is_active() {
            return;
        }
        self.cancel_timers();

        let mut board: Vec<(ClientId, String, u32)> = self
            .roster
            .values()
            .filter(|p| p.is_ready())
            .map(|p| (p.id, p.name.clone(), p.points))
            .collect();
        board.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));
        if !board.is_empty() {
            self.event("Final standings:");
        }
        for (rank, (id, name, points)) in board.into_iter().enumerate() {
            self.broadcast(ServerMessage::Points {
                client_id: id,
                points,
            });
            self.event(format!("{}. {name}: {points} point(s)", rank + 1));
        }

        let mut reset = Vec::new();
        for p in self.roster.values_mut() {
            let was = p.status;
            p.reset();
            if was != p.status {
                reset.push((p.id, was));
            }
        }
        for (id, was) in reset {
            self.broadcast(ServerMessage::Ready {
                client_id: id,
                is_ready: false,
            });
            match was {
                Status::Eliminated => self.broadcast(ServerMessage::Eliminated {
                    client_id: id,
                    eliminated: false,
                }),
                Status::Away => self.broadcast(ServerMessage::AwayUpdate {
                    client_id: id,
                    away: false,
                }),
                _ => {}
            }
            self.broadcast(ServerMessage::Points {
                client_id: id,
                points: 0,
            });
        }

        let ids: Vec<ClientId> = self.roster.keys().copied().collect();
        for id in ids {
            self.send_to(id, ServerMessage::notice("Game over. Ready up to play again."));
        }

        self.scheduler.clear();
        self.phase = Phase::Ready;
        info!(room_id = %self.room_id, rounds = self.round, "session ended");
        self.broadcast(ServerMessage::Phase { phase: Phase::Ready });
    }

    /// Ends a running session after an invariant failure, so the room is
    /// never left in a phase nothing will advance.
    pub fn abort_session(&mut self) {
        if self.phase.is_active() {
            self.event("The game was stopped because of a server error.");
            self.on_session_end();
        }
    }

    /// Stops every timer. Used when the actor shuts down.
    pub fn shutdown(&mut self) {
        self.cancel_timers();
    }

    // -- handlers -----------------------------------------------------------

    pub fn handle_turn_action(&mut self, id: ClientId, raw: &str) -> Result<(), RoomError> {
        let p = self.participant(id)?;
        if !p.is_ready() {
            return Err(RoomError::NotReady);
        }
        if !self.phase.is_active() {
            return Err(RoomError::WrongPhase {
                expected: Phase::InProgress,
                actual: self.phase,
            });
        }
        if p.is_eliminated() {
            return Err(RoomError::Eliminated);
        }
        if p.choice.is_some() {
            return Err(RoomError::AlreadyChose);
        }
        if p.is_away() {
            return Err(RoomError::Away);
        }
        if p.is_spectator() {
            return Err(RoomError::Spectator);
        }
        if self.config.style == PlayStyle::TurnBased && self.scheduler.current() != Some(id) {
            return Err(RoomError::NotYourTurn);
        }

        let rules = self.rules();
        let choice = Choice::parse(raw)
            .filter(|c| rules.allows(*c))
            .ok_or_else(|| RoomError::InvalidChoice {
                choice: raw.trim().to_string(),
                allowed: rules.describe(),
            })?;
        if self.choice_cooldown && p.last_choice == Some(choice) {
            return Err(RoomError::ChoiceOnCooldown {
                choice,
                allowed: rules.describe_without(Some(choice)),
            });
        }

        let p = self.participant_mut(id)?;
        p.choice = Some(choice);
        p.took_turn = true;
        let name = p.name.clone();
        debug!(room_id = %self.room_id, client_id = %id, round = self.round, %choice, "pick accepted");

        self.broadcast(ServerMessage::Turn {
            client_id: id,
            took_turn: true,
        });
        self.event(format!("{name} has picked."));
        self.broadcast(ServerMessage::PendingPick {
            client_id: id,
            pending: false,
        });
        self.send_to(id, ServerMessage::TurnConfirmed);

        match self.config.style {
            PlayStyle::Simultaneous if self.outstanding_picks() == 0 => self.on_round_end(),
            PlayStyle::Simultaneous => Ok(()),
            PlayStyle::TurnBased => self.on_turn_end(),
        }
    }

    pub fn handle_ready(
        &mut self,
        id: ClientId,
        is_ready: bool,
        wants_spectator: bool,
    ) -> Result<(), RoomError> {
        self.participant(id)?;
        if self.phase != Phase::Ready {
            return Err(RoomError::WrongPhase {
                expected: Phase::Ready,
                actual: self.phase,
            });
        }

        let spectate = wants_spectator || !is_ready;
        let p = self.participant_mut(id)?;
        let was = p.status;
        p.status = match (spectate, was) {
            (true, _) => Status::Spectator,
            (false, Status::Away) => Status::Away,
            (false, _) => Status::Ready,
        };
        let status = p.status;
        let name = p.name.clone();
        debug!(room_id = %self.room_id, client_id = %id, ?status, "ready check answered");

        self.broadcast(ServerMessage::Ready {
            client_id: id,
            is_ready: status.is_ready(),
        });
        if (was == Status::Spectator) != (status == Status::Spectator) {
            self.broadcast(ServerMessage::Spectator {
                client_id: id,
                is_spectator: status == Status::Spectator,
            });
        }
        if spectate {
            self.event(format!("{name} is spectating."));
        } else {
            self.event(format!("{name} is ready."));
        }

        self.check_all_ready(true)
    }

    /// Starts a session once every non-spectator is ready and there are
    /// enough of them.
    fn check_all_ready(&mut self, announce: bool) -> Result<(), RoomError> {
        let players: Vec<&Participant> =
            self.roster.values().filter(|p| !p.is_spectator()).collect();
        let count = players.len();
        if count == 0 || !players.iter().all(|p| p.is_ready()) {
            return Ok(());
        }
        if count >= self.config.min_players {
            return self.on_session_start();
        }
        if announce {
            let needed = self.config.min_players;
            self.event(format!(
                "Everyone is ready, but at least {needed} players are needed to start."
            ));
        }
        Ok(())
    }

    fn require_host_in_lobby(&self, id: ClientId) -> Result<(), RoomError> {
        let p = self.participant(id)?;
        if self.phase != Phase::Ready {
            return Err(RoomError::WrongPhase {
                expected: Phase::Ready,
                actual: self.phase,
            });
        }
        if !p.host {
            return Err(RoomError::NotHost);
        }
        Ok(())
    }

    pub fn handle_extra_options_toggle(&mut self, id: ClientId) -> Result<(), RoomError> {
        self.require_host_in_lobby(id)?;
        self.extra_options = !self.extra_options;
        let enabled = self.extra_options;
        info!(room_id = %self.room_id, enabled, "extra options toggled");

        self.broadcast(ServerMessage::ExtraOptionsToggle { enabled });
        if enabled {
            self.event("Extra options enabled: fire and water are in play.");
        } else {
            self.event("Extra options disabled: back to rock, paper, scissors.");
        }
        Ok(())
    }

    pub fn handle_choice_cooldown_toggle(&mut self, id: ClientId) -> Result<(), RoomError> {
        self.require_host_in_lobby(id)?;
        self.choice_cooldown = !self.choice_cooldown;
        let enabled = self.choice_cooldown;
        info!(room_id = %self.room_id, enabled, "choice cooldown toggled");

        self.broadcast(ServerMessage::ChoiceCooldownToggle { enabled });
        if enabled {
            self.event("Choice cooldown enabled: no picking the same thing twice in a row.");
        } else {
            self.event("Choice cooldown disabled.");
        }
        Ok(())
    }

    /// Relays a chat line from `id` to everyone in the room, whatever the
    /// phase or the sender's status.
    pub fn handle_chat(&mut self, id: ClientId, raw: &str) -> Result<(), RoomError> {
        self.participant(id)?;
        let message = raw.trim();
        if message.is_empty() {
            return Err(RoomError::EmptyMessage);
        }
        debug!(room_id = %self.room_id, client_id = %id, len = message.len(), "chat relayed");
        self.broadcast(ServerMessage::Message {
            client_id: id,
            message: message.to_string(),
        });
        Ok(())
    }

    pub fn handle_away_toggle(&mut self, id: ClientId, away: bool) -> Result<(), RoomError> {
        let p = self.participant_mut(id)?;
        let next = match (p.status, away) {
            (Status::Ready, true) => Status::Away,
            (Status::Away, false) => Status::Ready,
            (Status::Ready, false) | (Status::Away, true) => return Ok(()),
            _ => return Err(RoomError::AwayUnavailable),
        };
        p.status = next;
        let has_choice = p.choice.is_some();
        let name = p.name.clone();
        debug!(room_id = %self.room_id, client_id = %id, away, "away toggled");

        self.broadcast(ServerMessage::AwayUpdate { client_id: id, away });
        if away {
            self.event(format!("{name} is away."));
        } else {
            self.event(format!("{name} is back."));
        }

        if !self.phase.is_active() || has_choice {
            return Ok(());
        }
        self.broadcast(ServerMessage::PendingPick {
            client_id: id,
            pending: !away,
        });
        if !away {
            return Ok(());
        }
        match self.config.style {
            PlayStyle::Simultaneous if self.outstanding_picks() == 0 => self.on_round_end(),
            PlayStyle::TurnBased if self.scheduler.current() == Some(id) => self.on_turn_end(),
            _ => Ok(()),
        }
    }
}
