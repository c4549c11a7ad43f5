//! Tournament strategies used by the league to schedule matches.
//!
//! This module defines the [`TournamentStrategy`] trait and the built-in
//! [`RoundRobinTournament`]. A strategy only decides *who plays whom*; releasing the fixtures
//! without double-booking a player is the job of the league's scheduler.
//!
//! # Implementing a Custom Strategy
//! To implement a new tournament format, define your own type that implements
//! [`TournamentStrategy`]. The league calls `schedule` once, with the names of the players
//! registered at start time, and runs every returned fixture.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::info;

/// One scheduled pairing, players referenced by display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchSpec {
    /// `r{round}-m{index}`, unique within a league run.
    pub match_id: String,
    #[allow(missing_docs)]
    pub player_a: String,
    #[allow(missing_docs)]
    pub player_b: String,
    /// 1-based.
    pub round_number: u32,
}

impl MatchSpec {
    /// True when `name` plays in this match.
    pub fn involves(&self, name: &str) -> bool {
        self.player_a == name || self.player_b == name
    }
}

impl Display for MatchSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} VS {}]", self.player_a, self.player_b)
    }
}

/// A trait defining how players are paired in a league.
pub trait TournamentStrategy {
    /// Every fixture of the league, in the order they should be released.
    ///
    /// Fixtures of round `r` must come before those of round `r + 1`.
    fn schedule(&self, players: &[String]) -> Vec<MatchSpec>;
}

/// A round-robin league: in each round, every player meets every other player once.
///
/// With `N` players and `R` rounds this produces `R·N(N-1)/2` fixtures.
#[derive(Debug, Clone, Copy)]
pub struct RoundRobinTournament {
    rounds: u32,
}

impl RoundRobinTournament {
    /// Creates a new Round Robin tournament of `rounds` rounds.
    pub fn new(rounds: u32) -> Self {
        Self { rounds }
    }

    #[allow(missing_docs)]
    pub fn rounds(&self) -> u32 {
        self.rounds
    }
}

impl TournamentStrategy for RoundRobinTournament {
    fn schedule(&self, players: &[String]) -> Vec<MatchSpec> {
        let n = players.len();
        let mut pending = Vec::with_capacity(self.rounds as usize * n * n.saturating_sub(1) / 2);
        let mut index = 0;
        for round in 1..=self.rounds {
            for i in 0..n {
                for j in (i + 1)..n {
                    index += 1;
                    pending.push(MatchSpec {
                        match_id: format!("r{round}-m{index}"),
                        player_a: players[i].clone(),
                        player_b: players[j].clone(),
                        round_number: round,
                    });
                }
            }
        }
        info!(
            players = n,
            rounds = self.rounds,
            fixtures = pending.len(),
            "round-robin schedule built"
        );
        pending
    }
}
