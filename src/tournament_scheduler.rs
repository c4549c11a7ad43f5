use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::tournament_strategy::MatchSpec;

/// Releases fixtures so that no player is in two matches at once and at most
/// `max_concurrent` matches run simultaneously.
///
/// Fixtures are released in schedule order whenever possible; a fixture whose players are
/// busy is skipped until one of its players frees up.
#[derive(Debug)]
pub struct TournamentScheduler {
    pending: Vec<MatchSpec>,
    busy: HashSet<String>,
    running: usize,
    max_concurrent: usize,
    remaining_per_round: HashMap<u32, usize>,
    rounds_completed: u32,
}

impl TournamentScheduler {
    pub fn new(fixtures: Vec<MatchSpec>, max_concurrent: usize) -> Self {
        let mut remaining_per_round = HashMap::new();
        for fixture in &fixtures {
            *remaining_per_round.entry(fixture.round_number).or_insert(0) += 1;
        }
        TournamentScheduler {
            pending: fixtures,
            busy: HashSet::new(),
            running: 0,
            max_concurrent: max_concurrent.max(1),
            remaining_per_round,
            rounds_completed: 0,
        }
    }

    pub fn advance(&mut self) -> Vec<MatchSpec> {
        let mut matches_to_run = vec![];

        let mut remaining = vec![];
        for fixture in self.pending.drain(..) {
            let free = !self.busy.contains(&fixture.player_a)
                && !self.busy.contains(&fixture.player_b);
            if free && self.running + matches_to_run.len() < self.max_concurrent {
                self.busy.insert(fixture.player_a.clone());
                self.busy.insert(fixture.player_b.clone());
                matches_to_run.push(fixture);
            } else {
                remaining.push(fixture);
            }
        }
        self.pending = remaining;
        self.running += matches_to_run.len();
        trace!(
            released = matches_to_run.len(),
            running = self.running,
            pending = self.pending.len()
        );
        matches_to_run
    }

    pub fn on_result(&mut self, finished: &MatchSpec) -> Vec<MatchSpec> {
        self.busy.remove(&finished.player_a);
        self.busy.remove(&finished.player_b);
        self.running = self.running.saturating_sub(1);

        if let Some(left) = self.remaining_per_round.get_mut(&finished.round_number) {
            *left = left.saturating_sub(1);
        }
        // a round counts once it and every earlier round are done
        while self
            .remaining_per_round
            .get(&(self.rounds_completed + 1))
            .is_some_and(|left| *left == 0)
        {
            self.rounds_completed += 1;
            trace!("round {} completed", self.rounds_completed);
        }
        self.advance()
    }

    /// All fixtures ran and finished
    pub fn is_finished(&self) -> bool {
        self.pending.is_empty() && self.running == 0
    }

    pub fn rounds_completed(&self) -> u32 {
        self.rounds_completed
    }

    pub fn running(&self) -> usize {
        self.running
    }
}
