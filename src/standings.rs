//! League table.
//!
//! Scoring: 3 points for a win, 1 for a draw, 0 for a loss. Ranking: points, then wins
//! (both descending), then name.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::match_runner::MatchResult;

/// Points for a win.
pub const WIN_POINTS: u32 = 3;
/// Points for a draw.
pub const DRAW_POINTS: u32 = 1;

/// Accumulated record of one player.
///
/// Always satisfies `wins + losses + draws == games_played` and
/// `points == 3 * wins + draws`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingsEntry {
    #[allow(missing_docs)]
    pub agent_name: String,
    #[allow(missing_docs)]
    pub points: u32,
    #[allow(missing_docs)]
    pub wins: u32,
    #[allow(missing_docs)]
    pub losses: u32,
    #[allow(missing_docs)]
    pub draws: u32,
    #[allow(missing_docs)]
    pub games_played: u32,
}

impl StandingsEntry {
    fn new(agent_name: &str) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            ..Default::default()
        }
    }

    fn add_win(&mut self) {
        self.wins += 1;
        self.points += WIN_POINTS;
        self.games_played += 1;
    }

    fn add_loss(&mut self) {
        self.losses += 1;
        self.games_played += 1;
    }

    fn add_draw(&mut self) {
        self.draws += 1;
        self.points += DRAW_POINTS;
        self.games_played += 1;
    }

    /// Fraction of games won, 0 before the first game.
    pub fn win_rate(&self) -> f64 {
        if self.games_played == 0 {
            0.0
        } else {
            f64::from(self.wins) / f64::from(self.games_played)
        }
    }
}

/// One row of the standings as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// 1-based.
    pub rank: usize,
    /// Display name.
    pub agent: String,
    #[allow(missing_docs)]
    pub points: u32,
    #[allow(missing_docs)]
    pub wins: u32,
    #[allow(missing_docs)]
    pub losses: u32,
    #[allow(missing_docs)]
    pub draws: u32,
    #[allow(missing_docs)]
    pub games_played: u32,
    /// Percentage with one decimal, e.g. `"66.7%"`.
    pub win_rate: String,
}

/// Standings of every player, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct StandingsTable {
    entries: HashMap<String, StandingsEntry>,
    total_games: u64,
}

impl StandingsTable {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a zeroed entry for `name` if it has none.
    pub fn ensure(&mut self, name: &str) {
        self.entries
            .entry(name.to_string())
            .or_insert_with(|| StandingsEntry::new(name));
    }

    /// Remove the entry of `name` if it has not played yet. Returns whether it was removed.
    pub fn drop_unplayed(&mut self, name: &str) -> bool {
        let unplayed = self
            .entries
            .get(name)
            .is_some_and(|entry| entry.games_played == 0);
        if unplayed {
            self.entries.remove(name);
        }
        unplayed
    }

    /// Apply one result to both players' entries.
    pub fn record(&mut self, result: &MatchResult) {
        let a = result.player_a.as_str();
        let b = result.player_b.as_str();
        self.ensure(a);
        self.ensure(b);

        match result.winner.as_deref() {
            Some(winner) if winner == a => {
                self.entry_mut(a).add_win();
                self.entry_mut(b).add_loss();
            }
            Some(winner) if winner == b => {
                self.entry_mut(b).add_win();
                self.entry_mut(a).add_loss();
            }
            other => {
                if let Some(stranger) = other {
                    warn!(match_id = %result.match_id, "winner '{stranger}' did not play; counting a draw");
                }
                self.entry_mut(a).add_draw();
                self.entry_mut(b).add_draw();
            }
        }
        self.total_games += 1;
    }

    fn entry_mut(&mut self, name: &str) -> &mut StandingsEntry {
        self.entries
            .entry(name.to_string())
            .or_insert_with(|| StandingsEntry::new(name))
    }

    /// Entry of `name`, if known.
    pub fn get(&self, name: &str) -> Option<&StandingsEntry> {
        self.entries.get(name)
    }

    /// Results recorded so far.
    pub fn total_games(&self) -> u64 {
        self.total_games
    }

    /// Entries sorted by points desc, wins desc, name asc, with their rank.
    pub fn ranked(&self) -> Vec<RankedEntry> {
        let mut sorted = self.entries.values().collect::<Vec<_>>();
        sorted.sort_by(|x, y| {
            y.points
                .cmp(&x.points)
                .then(y.wins.cmp(&x.wins))
                .then_with(|| x.agent_name.cmp(&y.agent_name))
        });
        sorted
            .into_iter()
            .enumerate()
            .map(|(i, entry)| RankedEntry {
                rank: i + 1,
                agent: entry.agent_name.clone(),
                points: entry.points,
                wins: entry.wins,
                losses: entry.losses,
                draws: entry.draws,
                games_played: entry.games_played,
                win_rate: format!("{:.1}%", entry.win_rate() * 100.0),
            })
            .collect()
    }
}
