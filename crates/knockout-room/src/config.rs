//! Room configuration.

use std::time::Duration;

use knockout_timer::TimerConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How players take their picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayStyle {
    /// Everyone picks at once against a round timer.
    #[default]
    Simultaneous,
    /// One player at a time against a turn timer, in shuffled order.
    TurnBased,
}

impl PlayStyle {
    /// Parses `simultaneous` or `turn-based` (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "simultaneous" => Some(Self::Simultaneous),
            "turn-based" | "turn_based" | "turnbased" => Some(Self::TurnBased),
            _ => None,
        }
    }
}

/// How a round's picks are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionPolicy {
    /// Every pair of contenders meets once; both sides can score.
    #[default]
    AllPairs,
    /// Each contender attacks the next one in order; only attackers score.
    AdjacentRoundRobin,
}

impl ResolutionPolicy {
    /// Parses `all-pairs` or `adjacent` (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "all-pairs" | "all_pairs" | "allpairs" => Some(Self::AllPairs),
            "adjacent" | "adjacent-round-robin" | "adjacent_round_robin" => {
                Some(Self::AdjacentRoundRobin)
            }
            _ => None,
        }
    }
}

/// Configuration for a room instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Ready players needed before a session starts.
    pub min_players: usize,

    /// Maximum participants, spectators included.
    pub max_players: usize,

    pub style: PlayStyle,

    pub resolution: ResolutionPolicy,

    /// Round timer length, in timer units (simultaneous play).
    pub round_secs: u32,

    /// Turn timer length, in timer units (turn-based play).
    pub turn_secs: u32,

    /// Length of one timer unit. One second outside of tests.
    pub timer_unit: Duration,

    /// Shuffle the turn order at session start.
    pub shuffle_turn_order: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 16,
            style: PlayStyle::default(),
            resolution: ResolutionPolicy::default(),
            round_secs: 30,
            turn_secs: 15,
            timer_unit: TimerConfig::default().unit,
            shuffle_turn_order: true,
        }
    }
}

impl RoomConfig {
    /// A game needs two players to mean anything.
    pub const MIN_PLAYERS_FLOOR: usize = 2;

    /// Fix out-of-range values so the room can rely on them.
    pub fn validated(mut self) -> Self {
        if self.min_players < Self::MIN_PLAYERS_FLOOR {
            warn!(min_players = self.min_players, "min_players below 2, clamping");
            self.min_players = Self::MIN_PLAYERS_FLOOR;
        }
        if self.max_players < self.min_players {
            warn!(
                max_players = self.max_players,
                min_players = self.min_players,
                "max_players below min_players, raising"
            );
            self.max_players = self.min_players;
        }
        if self.round_secs == 0 {
            warn!("round_secs is 0, clamping to 1");
            self.round_secs = 1;
        }
        if self.turn_secs == 0 {
            warn!("turn_secs is 0, clamping to 1");
            self.turn_secs = 1;
        }
        self.timer_unit = self.timer_config().validated().unit;
        self
    }

    pub fn timer_config(&self) -> TimerConfig {
        TimerConfig::with_unit(self.timer_unit)
    }
}
