//! Choices and the rule sets that rank them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Everything a player can throw.
///
/// `Fire` and `Water` only exist when the room's extra options are on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Rock,
    Paper,
    Scissors,
    Fire,
    Water,
}

impl Choice {
    /// Single-letter form used on the wire and in prompts.
    pub fn letter(self) -> char {
        match self {
            Self::Rock => 'r',
            Self::Paper => 'p',
            Self::Scissors => 's',
            Self::Fire => 'f',
            Self::Water => 'w',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Rock => "rock",
            Self::Paper => "paper",
            Self::Scissors => "scissors",
            Self::Fire => "fire",
            Self::Water => "water",
        }
    }

    /// Parses `r`/`rock`, `p`/`paper`, ... ignoring case and surrounding
    /// whitespace. Says nothing about whether the room allows the choice.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_ascii_lowercase();
        match raw.as_str() {
            "r" | "rock" => Some(Self::Rock),
            "p" | "paper" => Some(Self::Paper),
            "s" | "scissors" => Some(Self::Scissors),
            "f" | "fire" => Some(Self::Fire),
            "w" | "water" => Some(Self::Water),
            _ => None,
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Rule sets
// ---------------------------------------------------------------------------

/// Decides who beats whom.
///
/// Implementations must be antisymmetric: `wins_against(a, b)` and
/// `wins_against(b, a)` are never both true, and both are false for
/// `a == b` or for choices outside [`alphabet`](Self::alphabet).
pub trait RuleSet: Send + Sync {
    /// Short name for logs and announcements.
    fn name(&self) -> &'static str;

    /// Choices this rule set accepts.
    fn alphabet(&self) -> &'static [Choice];

    /// Does `a` beat `b`?
    fn wins_against(&self, a: Choice, b: Choice) -> bool;

    fn allows(&self, choice: Choice) -> bool {
        self.alphabet().contains(&choice)
    }

    /// The alphabet as a prompt, e.g. `"r, p, s"`.
    fn describe(&self) -> String {
        self.describe_without(None)
    }

    /// Like [`describe`](Self::describe) but leaving out one choice.
    fn describe_without(&self, excluded: Option<Choice>) -> String {
        self.alphabet()
            .iter()
            .filter(|c| Some(**c) != excluded)
            .map(|c| c.letter().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Rock, paper, scissors.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classic;

impl RuleSet for Classic {
    fn name(&self) -> &'static str {
        "classic"
    }

    fn alphabet(&self) -> &'static [Choice] {
        &[Choice::Rock, Choice::Paper, Choice::Scissors]
    }

    fn wins_against(&self, a: Choice, b: Choice) -> bool {
        matches!(
            (a, b),
            (Choice::Rock, Choice::Scissors)
                | (Choice::Paper, Choice::Rock)
                | (Choice::Scissors, Choice::Paper)
        )
    }
}

/// The five-symbol variant: each choice beats exactly two others.
#[derive(Debug, Clone, Copy, Default)]
pub struct Extended;

impl Extended {
    fn beats(choice: Choice) -> [Choice; 2] {
        match choice {
            Choice::Rock => [Choice::Scissors, Choice::Fire],
            Choice::Paper => [Choice::Rock, Choice::Water],
            Choice::Scissors => [Choice::Paper, Choice::Water],
            Choice::Fire => [Choice::Paper, Choice::Scissors],
            Choice::Water => [Choice::Fire, Choice::Rock],
        }
    }
}

impl RuleSet for Extended {
    fn name(&self) -> &'static str {
        "extended"
    }

    fn alphabet(&self) -> &'static [Choice] {
        &[
            Choice::Rock,
            Choice::Paper,
            Choice::Scissors,
            Choice::Fire,
            Choice::Water,
        ]
    }

    fn wins_against(&self, a: Choice, b: Choice) -> bool {
        Self::beats(a).contains(&b)
    }
}

/// The rule set a room plays with. The only place the extra-options flag
/// is turned into rules.
pub fn rule_set(extra_options: bool) -> &'static dyn RuleSet {
    if extra_options { &Extended } else { &Classic }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Choice; 5] = [
        Choice::Rock,
        Choice::Paper,
        Choice::Scissors,
        Choice::Fire,
        Choice::Water,
    ];

    fn assert_antisymmetric(rules: &dyn RuleSet) {
        for a in ALL {
            assert!(!rules.wins_against(a, a), "{a} must not beat itself");
            for b in ALL {
                assert!(
                    !(rules.wins_against(a, b) && rules.wins_against(b, a)),
                    "{a} and {b} both win under {}",
                    rules.name()
                );
            }
        }
    }

    #[test]
    fn test_classic_rules_never_win_both_ways() {
        assert_antisymmetric(&Classic);
    }

    #[test]
    fn test_extended_rules_never_win_both_ways() {
        assert_antisymmetric(&Extended);
    }

    #[test]
    fn test_classic_cycle() {
        assert!(Classic.wins_against(Choice::Rock, Choice::Scissors));
        assert!(Classic.wins_against(Choice::Paper, Choice::Rock));
        assert!(Classic.wins_against(Choice::Scissors, Choice::Paper));
        assert!(!Classic.wins_against(Choice::Rock, Choice::Paper));
    }

    #[test]
    fn test_classic_ignores_extended_choices() {
        assert!(!Classic.wins_against(Choice::Fire, Choice::Paper));
        assert!(!Classic.allows(Choice::Water));
    }

    #[test]
    fn test_extended_every_distinct_pair_is_decided() {
        // Five symbols, each beating two: no distinct pair ties.
        for a in ALL {
            for b in ALL {
                if a != b {
                    assert!(Extended.wins_against(a, b) ^ Extended.wins_against(b, a));
                }
            }
        }
    }

    #[test]
    fn test_extended_fire_and_water() {
        assert!(Extended.wins_against(Choice::Fire, Choice::Scissors));
        assert!(Extended.wins_against(Choice::Water, Choice::Fire));
        assert!(Extended.wins_against(Choice::Water, Choice::Rock));
        assert!(Extended.wins_against(Choice::Rock, Choice::Fire));
    }

    #[test]
    fn test_parse_accepts_letters_and_names() {
        assert_eq!(Choice::parse("r"), Some(Choice::Rock));
        assert_eq!(Choice::parse("  Paper "), Some(Choice::Paper));
        assert_eq!(Choice::parse("S"), Some(Choice::Scissors));
        assert_eq!(Choice::parse("water"), Some(Choice::Water));
        assert_eq!(Choice::parse("lizard"), None);
        assert_eq!(Choice::parse(""), None);
    }

    #[test]
    fn test_rule_set_follows_extra_options_flag() {
        assert_eq!(rule_set(false).name(), "classic");
        assert_eq!(rule_set(true).name(), "extended");
        assert_eq!(rule_set(false).describe(), "r, p, s");
        assert_eq!(rule_set(true).describe_without(Some(Choice::Fire)), "r, p, s, w");
    }
}
