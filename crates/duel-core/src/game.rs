//! Moves and the pure rule that decides a round.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A move a player can submit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Rock,
    Paper,
    Scissors,
}

impl Choice {
    pub const ALL: [Choice; 3] = [Choice::Rock, Choice::Paper, Choice::Scissors];

    /// Whether `self` defeats `other`.
    pub fn beats(self, other: Choice) -> bool {
        matches!(
            (self, other),
            (Choice::Rock, Choice::Scissors)
                | (Choice::Scissors, Choice::Paper)
                | (Choice::Paper, Choice::Rock)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Choice::Rock => "rock",
            Choice::Paper => "paper",
            Choice::Scissors => "scissors",
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of comparing the first player's move against the second's.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Draw,
    FirstWins,
    SecondWins,
}

/// Decide a round. Total over all nine pairs.
pub fn resolve(first: Choice, second: Choice) -> Outcome {
    if first == second {
        Outcome::Draw
    } else if first.beats(second) {
        Outcome::FirstWins
    } else {
        Outcome::SecondWins
    }
}
