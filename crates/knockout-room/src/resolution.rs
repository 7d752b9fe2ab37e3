//! Turns a round's choices into points and eliminations.
//!
//! Pure functions: nothing here touches the room, so the room decides what
//! to broadcast and when to apply the result.

use std::collections::{BTreeMap, BTreeSet};

use knockout_protocol::ClientId;

use crate::config::ResolutionPolicy;
use crate::rules::{Choice, RuleSet};

/// One participant going into resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entrant {
    pub id: ClientId,
    pub choice: Option<Choice>,
    /// Away players without a choice sit the round out instead of
    /// forfeiting.
    pub exempt: bool,
}

/// How a duel went, from the attacker's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuelResult {
    Win,
    Loss,
    Tie,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duel {
    pub attacker: ClientId,
    pub attacker_choice: Choice,
    pub defender: ClientId,
    pub defender_choice: Choice,
    pub result: DuelResult,
}

/// Everything a round produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// No choice and not exempt.
    pub forfeits: Vec<ClientId>,
    /// In comparison order.
    pub duels: Vec<Duel>,
    /// Points earned this round; only entries above zero.
    pub points: BTreeMap<ClientId, u32>,
    /// Lost at least one counted duel. Disjoint from `forfeits`.
    pub eliminated: BTreeSet<ClientId>,
}

impl Outcome {
    /// Forfeits and duel losers together.
    pub fn knocked_out(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.forfeits.iter().copied().chain(self.eliminated.iter().copied())
    }
}

/// Resolves one round.
///
/// Entrants without a choice forfeit first (unless exempt); the remaining
/// contenders are compared according to `policy`, in the order given.
/// Eliminations are collected and returned, never applied here.
pub fn resolve(policy: ResolutionPolicy, rules: &dyn RuleSet, entrants: &[Entrant]) -> Outcome {
    let mut outcome = Outcome::default();
    let mut contenders: Vec<(ClientId, Choice)> = Vec::with_capacity(entrants.len());

    for entrant in entrants {
        match entrant.choice {
            Some(choice) => contenders.push((entrant.id, choice)),
            None if entrant.exempt => {}
            None => outcome.forfeits.push(entrant.id),
        }
    }

    match policy {
        ResolutionPolicy::AllPairs => all_pairs(rules, &contenders, &mut outcome),
        ResolutionPolicy::AdjacentRoundRobin => adjacent(rules, &contenders, &mut outcome),
    }
    outcome
}

fn duel(rules: &dyn RuleSet, (a, a_choice): (ClientId, Choice), (b, b_choice): (ClientId, Choice)) -> Duel {
    let result = if rules.wins_against(a_choice, b_choice) {
        DuelResult::Win
    } else if rules.wins_against(b_choice, a_choice) {
        DuelResult::Loss
    } else {
        DuelResult::Tie
    };
    Duel {
        attacker: a,
        attacker_choice: a_choice,
        defender: b,
        defender_choice: b_choice,
        result,
    }
}

fn all_pairs(rules: &dyn RuleSet, contenders: &[(ClientId, Choice)], outcome: &mut Outcome) {
    for (i, &a) in contenders.iter().enumerate() {
        for &b in &contenders[i + 1..] {
            // A contender who already lost this round doesn't duel again.
            if outcome.eliminated.contains(&a.0) || outcome.eliminated.contains(&b.0) {
                continue;
            }
            let d = duel(rules, a, b);
            match d.result {
                DuelResult::Win => {
                    *outcome.points.entry(d.attacker).or_default() += 1;
                    outcome.eliminated.insert(d.defender);
                }
                DuelResult::Loss => {
                    *outcome.points.entry(d.defender).or_default() += 1;
                    outcome.eliminated.insert(d.attacker);
                }
                DuelResult::Tie => {}
            }
            outcome.duels.push(d);
        }
    }
}

fn adjacent(rules: &dyn RuleSet, contenders: &[(ClientId, Choice)], outcome: &mut Outcome) {
    let n = contenders.len();
    if n < 2 {
        return;
    }
    for i in 0..n {
        let d = duel(rules, contenders[i], contenders[(i + 1) % n]);
        // Only the attacker can score here; a lost attack costs nothing.
        if d.result == DuelResult::Win {
            *outcome.points.entry(d.attacker).or_default() += 1;
            outcome.eliminated.insert(d.defender);
        }
        outcome.duels.push(d);
    }
}
