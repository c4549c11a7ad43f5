//! Parity selection strategies available to players.
//!
//! Strategies are looked up by name in a [`StrategyRegistry`] built once at startup. Each
//! player owns a fresh instance, so stateful strategies (e.g. [`Alternating`]) are never
//! shared between players.
//!
//! # Built-in strategies
//! - `random`: uniform choice.
//! - `always_even` / `always_odd` (aliases `constant_even`, `constant-even`, ...).
//! - `alternating`: odd, even, odd, ... by call count.
//! - `deterministic` (alias `hash`): parity of the last byte of SHA-256(game id).
//! - `biased_random_<P>`: even with probability P%.
//! - `adaptive`: keep the last choice after a win, switch otherwise.
//! - `counter`: opposite of the opponent's most frequent recent choice.

use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{
    error::UnknownStrategy,
    game::{GameRecord, Parity, PlayerStats},
};

/// How a player picks its bet.
pub trait ParityStrategy: Send + Debug {
    /// Registry name of the strategy.
    fn name(&self) -> String;

    /// Pick a parity for `game_id`. `history` may be empty.
    fn choose(&mut self, game_id: &str, history: &[GameRecord], stats: &PlayerStats) -> Parity;
}

/// Uniform choice.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomChoice;

impl ParityStrategy for RandomChoice {
    fn name(&self) -> String {
        "random".into()
    }

    fn choose(&mut self, _game_id: &str, _history: &[GameRecord], _stats: &PlayerStats) -> Parity {
        Parity::random(&mut thread_rng())
    }
}

/// Always the same parity.
#[derive(Debug, Clone, Copy)]
pub struct Constant(pub Parity);

impl ParityStrategy for Constant {
    fn name(&self) -> String {
        format!("always_{}", self.0)
    }

    fn choose(&mut self, _game_id: &str, _history: &[GameRecord], _stats: &PlayerStats) -> Parity {
        self.0
    }
}

/// Odd on the first call, then even, then odd...
#[derive(Debug, Default, Clone, Copy)]
pub struct Alternating {
    calls: u64,
}

impl ParityStrategy for Alternating {
    fn name(&self) -> String {
        "alternating".into()
    }

    fn choose(&mut self, _game_id: &str, _history: &[GameRecord], _stats: &PlayerStats) -> Parity {
        self.calls += 1;
        if self.calls % 2 == 0 {
            Parity::Even
        } else {
            Parity::Odd
        }
    }
}

/// Same game id, same choice.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashOfGameId;

impl ParityStrategy for HashOfGameId {
    fn name(&self) -> String {
        "deterministic".into()
    }

    fn choose(&mut self, game_id: &str, _history: &[GameRecord], _stats: &PlayerStats) -> Parity {
        let digest = Sha256::digest(game_id.as_bytes());
        Parity::of(u32::from(digest[digest.len() - 1]))
    }
}

/// Even with probability `even_percent`%.
#[derive(Debug, Clone, Copy)]
pub struct BiasedRandom {
    even_percent: u8,
}

impl BiasedRandom {
    /// Percentages above 100 are clamped.
    pub fn new(even_percent: u8) -> Self {
        Self {
            even_percent: even_percent.min(100),
        }
    }
}

impl ParityStrategy for BiasedRandom {
    fn name(&self) -> String {
        format!("biased_random_{}", self.even_percent)
    }

    fn choose(&mut self, _game_id: &str, _history: &[GameRecord], _stats: &PlayerStats) -> Parity {
        if thread_rng().gen_ratio(u32::from(self.even_percent), 100) {
            Parity::Even
        } else {
            Parity::Odd
        }
    }
}

/// Win-stay, lose-shift.
#[derive(Debug, Default, Clone, Copy)]
pub struct Adaptive {
    last_choice: Option<Parity>,
}

impl ParityStrategy for Adaptive {
    fn name(&self) -> String {
        "adaptive".into()
    }

    fn choose(&mut self, _game_id: &str, history: &[GameRecord], _stats: &PlayerStats) -> Parity {
        let choice = match history.last() {
            None => Parity::random(&mut thread_rng()),
            Some(last) => match last.own_choice.or(self.last_choice) {
                None => Parity::random(&mut thread_rng()),
                Some(previous) if last.won => previous,
                Some(previous) => previous.opposite(),
            },
        };
        self.last_choice = Some(choice);
        choice
    }
}

/// Bets against the opponent's habit over the last [`Counter::WINDOW`] games.
#[derive(Debug, Default, Clone, Copy)]
pub struct Counter;

impl Counter {
    /// Number of recent games considered.
    pub const WINDOW: usize = 10;
}

impl ParityStrategy for Counter {
    fn name(&self) -> String {
        "counter".into()
    }

    fn choose(&mut self, _game_id: &str, history: &[GameRecord], _stats: &PlayerStats) -> Parity {
        let recent = &history[history.len().saturating_sub(Self::WINDOW)..];
        let (even, odd) = recent
            .iter()
            .filter_map(|game| game.opponent_choice)
            .fold((0u32, 0u32), |(even, odd), choice| match choice {
                Parity::Even => (even + 1, odd),
                Parity::Odd => (even, odd + 1),
            });

        if even > odd {
            Parity::Odd
        } else if odd > even {
            Parity::Even
        } else {
            Parity::random(&mut thread_rng())
        }
    }
}

/// Builds a fresh strategy instance.
pub type StrategyFactory = Arc<dyn Fn() -> Box<dyn ParityStrategy> + Send + Sync>;

/// Strategy names mapped to factories.
#[derive(Clone)]
pub struct StrategyRegistry {
    factories: BTreeMap<String, StrategyFactory>,
}

impl Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Every built-in strategy and its aliases.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("random", || Box::new(RandomChoice));
        for name in ["always_even", "constant_even", "constant-even"] {
            registry.register(name, || Box::new(Constant(Parity::Even)));
        }
        for name in ["always_odd", "constant_odd", "constant-odd"] {
            registry.register(name, || Box::new(Constant(Parity::Odd)));
        }
        registry.register("alternating", || Box::<Alternating>::default());
        for name in ["deterministic", "hash"] {
            registry.register(name, || Box::new(HashOfGameId));
        }
        registry.register("biased_random_70", || Box::new(BiasedRandom::new(70)));
        registry.register("biased_random_30", || Box::new(BiasedRandom::new(30)));
        registry.register("adaptive", || Box::<Adaptive>::default());
        registry.register("counter", || Box::new(Counter));
        registry
    }

    /// Add or replace a strategy.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn ParityStrategy> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// A fresh instance of the named strategy.
    ///
    /// Besides registered names, any `biased_random_<P>` with `P` in `0..=255` is accepted
    /// (clamped to 100).
    pub fn create(&self, name: &str) -> Result<Box<dyn ParityStrategy>, UnknownStrategy> {
        if let Some(factory) = self.factories.get(name) {
            return Ok(factory());
        }
        if let Some(percent) = name
            .strip_prefix("biased_random_")
            .and_then(|p| p.parse::<u8>().ok())
        {
            debug!(percent, "building unregistered biased strategy");
            return Ok(Box::new(BiasedRandom::new(percent)));
        }
        Err(UnknownStrategy {
            name: name.to_string(),
            available: self.names(),
        })
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    #[allow(missing_docs)]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod strategy_tests {
    use crate::game::GameOutcome;

    use super::*;

    fn record(own: Parity, opponent: Parity, won: bool) -> GameRecord {
        GameRecord {
            game_id: "g".into(),
            opponent: Some("other".into()),
            own_choice: Some(own),
            opponent_choice: Some(opponent),
            dice_roll: Some(4),
            won,
            outcome: if won { GameOutcome::Win } else { GameOutcome::Loss },
        }
    }

    #[test]
    fn every_builtin_answers_with_and_without_history() {
        let registry = StrategyRegistry::builtin();
        let history = vec![
            record(Parity::Even, Parity::Odd, true),
            record(Parity::Odd, Parity::Odd, false),
        ];
        for name in registry.names() {
            let mut strategy = registry.create(&name).unwrap();
            for h in [&[][..], &history[..]] {
                // the return type already restricts the answer to even/odd
                let choice = strategy.choose("game_1", h, &PlayerStats::default());
                assert!(matches!(choice, Parity::Even | Parity::Odd), "{name}");
            }
        }
    }

    #[test]
    fn aliases_and_constants() {
        let registry = StrategyRegistry::builtin();
        let stats = PlayerStats::default();
        for name in ["always_even", "constant_even", "constant-even"] {
            assert_eq!(registry.create(name).unwrap().choose("g", &[], &stats), Parity::Even);
        }
        for name in ["always_odd", "constant_odd", "constant-odd"] {
            assert_eq!(registry.create(name).unwrap().choose("g", &[], &stats), Parity::Odd);
        }
    }

    #[test]
    fn alternating_starts_odd() {
        let mut strategy = Alternating::default();
        let stats = PlayerStats::default();
        let picks = (0..4)
            .map(|_| strategy.choose("g", &[], &stats))
            .collect::<Vec<_>>();
        assert_eq!(picks, [Parity::Odd, Parity::Even, Parity::Odd, Parity::Even]);
    }

    #[test]
    fn hash_is_stable_per_game() {
        let registry = StrategyRegistry::builtin();
        let stats = PlayerStats::default();
        let mut a = registry.create("deterministic").unwrap();
        let mut b = registry.create("hash").unwrap();
        for game in ["game_1", "game_2", "abcdef"] {
            assert_eq!(a.choose(game, &[], &stats), b.choose(game, &[], &stats));
        }
    }

    #[test]
    fn biased_extremes() {
        let stats = PlayerStats::default();
        let mut always = BiasedRandom::new(100);
        let mut never = BiasedRandom::new(0);
        for _ in 0..50 {
            assert_eq!(always.choose("g", &[], &stats), Parity::Even);
            assert_eq!(never.choose("g", &[], &stats), Parity::Odd);
        }
        assert_eq!(BiasedRandom::new(250).name(), "biased_random_100");
    }

    #[test]
    fn adaptive_keeps_after_win_and_switches_after_loss() {
        let stats = PlayerStats::default();
        let mut strategy = Adaptive::default();
        let won = [record(Parity::Odd, Parity::Even, true)];
        assert_eq!(strategy.choose("g", &won, &stats), Parity::Odd);
        let lost = [record(Parity::Odd, Parity::Even, false)];
        assert_eq!(strategy.choose("g", &lost, &stats), Parity::Even);
    }

    #[test]
    fn counter_bets_against_the_habit() {
        let stats = PlayerStats::default();
        let mut history = vec![record(Parity::Odd, Parity::Odd, false); 15];
        // only the last ten games count
        for game in history.iter_mut().take(5) {
            game.opponent_choice = Some(Parity::Even);
        }
        history.extend(vec![record(Parity::Odd, Parity::Even, false); 3]);
        assert_eq!(Counter.choose("g", &history, &stats), Parity::Even);
    }

    #[test]
    fn unknown_and_parsed_names() {
        let registry = StrategyRegistry::builtin();
        let err = registry.create("psychic").unwrap_err();
        assert!(err.available.contains(&"random".to_string()));
        assert_eq!(registry.create("biased_random_55").unwrap().name(), "biased_random_55");
        assert!(registry.create("biased_random_x").is_err());
    }
}
