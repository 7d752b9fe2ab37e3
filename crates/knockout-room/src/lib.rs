//! Game rooms for Knockout.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns the
//! roster, the phase, the turn order and the countdown timers for one game.
//!
//! # Key types
//!
//! - [`RoomManager`] — creates rooms by name, routes clients
//! - [`RoomHandle`] — send commands to a running room actor
//! - [`RoomConfig`] — player limits, play style, timer lengths
//! - [`RuleSet`] / [`resolve`] — who beats whom, and what a round produces
//! - [`TurnScheduler`] — round-robin turn order

mod config;
mod error;
mod game;
mod manager;
mod participant;
mod resolution;
mod room;
mod rules;
mod scheduler;

pub use config::{PlayStyle, ResolutionPolicy, RoomConfig};
pub use error::RoomError;
pub use game::RoomSnapshot;
pub use manager::RoomManager;
pub use participant::{ParticipantView, Status};
pub use resolution::{resolve, Duel, DuelResult, Entrant, Outcome};
pub use room::{PlayerSender, RoomHandle, RoomId};
pub use rules::{rule_set, Choice, Classic, Extended, RuleSet};
pub use scheduler::{SchedulerError, TurnScheduler};
