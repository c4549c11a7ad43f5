//! Vocabulary of the parity game shared by players, referees and the league.
//!
//! A match is decided by a single dice roll: each player bets on the parity of the roll
//! beforehand, and a player is correct when its bet equals the parity of the roll.

use std::{fmt, str::FromStr};

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parity of an integer, and the only two values a player may bet on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    /// Divisible by two.
    Even,
    /// Not divisible by two.
    Odd,
}

impl Parity {
    /// Parity of `n`.
    pub fn of(n: u32) -> Self {
        if n % 2 == 0 {
            Parity::Even
        } else {
            Parity::Odd
        }
    }

    /// The other parity.
    pub fn opposite(self) -> Self {
        match self {
            Parity::Even => Parity::Odd,
            Parity::Odd => Parity::Even,
        }
    }

    /// Uniformly random parity.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            Parity::Even
        } else {
            Parity::Odd
        }
    }

    /// Wire representation (`"even"` or `"odd"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Parity::Even => "even",
            Parity::Odd => "odd",
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is neither `"even"` nor `"odd"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is neither \"even\" nor \"odd\"")]
pub struct InvalidParity(pub String);

impl FromStr for Parity {
    type Err = InvalidParity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "even" => Ok(Parity::Even),
            "odd" => Ok(Parity::Odd),
            other => Err(InvalidParity(other.to_string())),
        }
    }
}

/// A player's bet as seen by the referee.
///
/// `None` is the placeholder used when a player did not answer in time or answered
/// something other than a parity. It is never correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    /// Bet on even.
    Even,
    /// Bet on odd.
    Odd,
    /// No valid bet.
    None,
}

impl Choice {
    /// The parity bet on, if any.
    pub fn parity(self) -> Option<Parity> {
        match self {
            Choice::Even => Some(Parity::Even),
            Choice::Odd => Some(Parity::Odd),
            Choice::None => None,
        }
    }

    /// True when this bet matches the parity of the roll.
    pub fn is_correct(self, dice_parity: Parity) -> bool {
        self.parity() == Some(dice_parity)
    }

    /// Lenient parsing used on peer responses: anything but a parity becomes `None`.
    pub fn from_wire(value: Option<&str>) -> Self {
        value
            .and_then(|s| s.parse::<Parity>().ok())
            .map_or(Choice::None, Choice::from)
    }
}

impl From<Parity> for Choice {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::Even => Choice::Even,
            Parity::Odd => Choice::Odd,
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::Even => f.write_str("even"),
            Choice::Odd => f.write_str("odd"),
            Choice::None => f.write_str("none"),
        }
    }
}

/// How a single game ended from one player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameOutcome {
    #[allow(missing_docs)]
    Win,
    #[allow(missing_docs)]
    Loss,
    #[allow(missing_docs)]
    Draw,
}

/// One finished game in a player's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Game identifier chosen by the referee.
    pub game_id: String,
    /// Opponent display name, when the referee reported it.
    pub opponent: Option<String>,
    /// What this player bet.
    pub own_choice: Option<Parity>,
    /// What the opponent bet, when reported.
    pub opponent_choice: Option<Parity>,
    /// The roll, when reported.
    pub dice_roll: Option<u32>,
    /// Shortcut for `outcome == GameOutcome::Win`.
    pub won: bool,
    /// Outcome for this player.
    pub outcome: GameOutcome,
}

/// Running statistics of a player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Invitations received.
    pub games_invited: u32,
    /// Results received.
    pub games_played: u32,
    #[allow(missing_docs)]
    pub wins: u32,
    #[allow(missing_docs)]
    pub losses: u32,
    #[allow(missing_docs)]
    pub draws: u32,
}

impl PlayerStats {
    /// Fraction of played games that were won, 0 when nothing was played.
    pub fn win_rate(&self) -> f64 {
        if self.games_played == 0 {
            0.0
        } else {
            f64::from(self.wins) / f64::from(self.games_played)
        }
    }

    pub(crate) fn record(&mut self, outcome: GameOutcome) {
        self.games_played += 1;
        match outcome {
            GameOutcome::Win => self.wins += 1,
            GameOutcome::Loss => self.losses += 1,
            GameOutcome::Draw => self.draws += 1,
        }
    }
}

#[cfg(test)]
mod game_tests {
    use super::*;

    #[test]
    fn parity_of_roll() {
        assert_eq!(Parity::of(1), Parity::Odd);
        assert_eq!(Parity::of(2), Parity::Even);
        assert_eq!(Parity::of(100), Parity::Even);
        assert_eq!(Parity::Even.opposite(), Parity::Odd);
    }

    #[test]
    fn none_is_never_correct() {
        assert!(!Choice::None.is_correct(Parity::Even));
        assert!(!Choice::None.is_correct(Parity::Odd));
        assert!(Choice::Even.is_correct(Parity::Even));
        assert!(!Choice::Odd.is_correct(Parity::Even));
    }

    #[test]
    fn lenient_wire_parsing() {
        assert_eq!(Choice::from_wire(Some("odd")), Choice::Odd);
        assert_eq!(Choice::from_wire(Some("EVEN")), Choice::None);
        assert_eq!(Choice::from_wire(Some("maybe")), Choice::None);
        assert_eq!(Choice::from_wire(None), Choice::None);
        assert_eq!(
            serde_json::to_value(Choice::None).unwrap(),
            serde_json::json!("none")
        );
    }

    #[test]
    fn stats_keep_counts_consistent() {
        let mut stats = PlayerStats::default();
        stats.record(GameOutcome::Win);
        stats.record(GameOutcome::Draw);
        stats.record(GameOutcome::Loss);
        stats.record(GameOutcome::Win);
        assert_eq!(stats.games_played, 4);
        assert_eq!(stats.wins + stats.losses + stats.draws, stats.games_played);
        assert!((stats.win_rate() - 0.5).abs() < f64::EPSILON);
    }
}
