//! The league manager: registration, scheduling, and standings.
//!
//! A [`League`] moves through `NotStarted → Running → Completed`, never backwards.
//!
//! - [`League::register`] adds or updates an agent at any time.
//! - [`League::start`] freezes the set of players, builds a round-robin schedule and spawns
//!   the run task. It fails with a [`StartError`] unless at least two players are registered
//!   and the league has not started yet.
//! - The run task releases fixtures through the scheduler (no player in two matches at once,
//!   at most `max_concurrent_matches` matches in flight), hands each to a [`MatchReferee`], and
//!   records every result in the standings.
//!
//! # Referees
//!
//! Matches are run by the embedded [`Referee`] unless `use_external_referee` is set and a
//! referee is registered when the league starts, in which case that referee is driven
//! through [`RemoteReferee`].

use std::{
    collections::HashMap,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, instrument, trace, warn};

use crate::{
    agent::AgentRecord,
    client::RpcClient,
    configuration::LeagueConfig,
    error::StartError,
    game::Choice,
    match_runner::{MatchReferee, MatchResult, Referee, RemoteReferee},
    persistence::ResultSink,
    registry::{AgentRegistry, RegisterAck},
    standings::{RankedEntry, StandingsTable, DRAW_POINTS, WIN_POINTS},
    tournament_scheduler::TournamentScheduler,
    tournament_strategy::{MatchSpec, RoundRobinTournament, TournamentStrategy},
};

/// Lifecycle of a league.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaguePhase {
    /// Accepting registrations, waiting for `start`.
    NotStarted,
    /// Matches are being played.
    Running,
    /// Every fixture finished.
    Completed,
}

/// Returned by a successful [`League::start`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAck {
    /// Always `"started"`.
    pub status: String,
    /// Number of players taking part.
    pub agents: usize,
    #[allow(missing_docs)]
    pub rounds: u32,
    #[allow(missing_docs)]
    pub message: String,
}

/// Answer to the standings query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingsReport {
    #[allow(missing_docs)]
    pub standings: Vec<RankedEntry>,
    #[allow(missing_docs)]
    pub total_games: u64,
    /// Rounds whose fixtures all finished.
    pub rounds_completed: u32,
    #[allow(missing_docs)]
    pub status: LeaguePhase,
}

/// Answer to `GET /health` on the league.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueHealth {
    #[allow(missing_docs)]
    pub ok: bool,
    #[allow(missing_docs)]
    pub status: LeaguePhase,
    #[allow(missing_docs)]
    pub registered_agents: usize,
    #[allow(missing_docs)]
    pub total_games: u64,
}

/// The league manager.
pub struct League {
    config: LeagueConfig,
    registry: AgentRegistry,
    standings: Mutex<StandingsTable>,
    rounds_completed: AtomicU32,
    phase: watch::Sender<LeaguePhase>,
    client: RpcClient,
    referee: Referee,
    referee_override: Option<Arc<dyn MatchReferee>>,
    sink: Option<Arc<dyn ResultSink>>,
}

impl std::fmt::Debug for League {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("League")
            .field("config", &self.config)
            .field("phase", &self.phase())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl League {
    /// Name the embedded referee uses when talking to players.
    pub const REFEREE_NAME: &'static str = "LeagueManager";

    /// A league with no agent, using the embedded referee.
    pub fn new(config: LeagueConfig) -> Self {
        let client = RpcClient::new();
        let referee = Referee::new(Self::REFEREE_NAME, client.clone(), config.timeouts());
        trace!(?config);
        Self {
            config,
            registry: AgentRegistry::new(),
            standings: Mutex::new(StandingsTable::new()),
            rounds_completed: AtomicU32::new(0),
            phase: watch::Sender::new(LeaguePhase::NotStarted),
            client,
            referee,
            referee_override: None,
            sink: None,
        }
    }

    /// Run every match on `referee`, whatever the configuration says.
    pub fn with_referee(mut self, referee: Arc<dyn MatchReferee>) -> Self {
        self.referee_override = Some(referee);
        self
    }

    /// Replace the embedded referee (e.g. to inject a dice).
    pub fn with_embedded_referee(mut self, referee: Referee) -> Self {
        self.referee = referee;
        self
    }

    /// Hand every recorded result to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    fn lock_standings(&self) -> MutexGuard<'_, StandingsTable> {
        self.standings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[allow(missing_docs)]
    pub fn config(&self) -> &LeagueConfig {
        &self.config
    }

    #[allow(missing_docs)]
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    #[allow(missing_docs)]
    pub fn phase(&self) -> LeaguePhase {
        *self.phase.borrow()
    }

    /// Register or update an agent. Players get a standings entry; a player re-registering as
    /// a referee loses its entry unless it has already played.
    pub fn register(&self, record: AgentRecord) -> RegisterAck {
        let mut standings = self.lock_standings();
        if record.is_player() {
            standings.ensure(&record.display_name);
        } else if standings.drop_unplayed(&record.display_name) {
            info!(agent = %record.display_name, "now a referee; removed from the standings");
        }
        drop(standings);
        self.registry.register(record)
    }

    /// Current standings, best first.
    pub fn standings(&self) -> StandingsReport {
        let table = self.lock_standings();
        StandingsReport {
            standings: table.ranked(),
            total_games: table.total_games(),
            rounds_completed: self.rounds_completed.load(Ordering::Acquire),
            status: self.phase(),
        }
    }

    #[allow(missing_docs)]
    pub fn health(&self) -> LeagueHealth {
        LeagueHealth {
            ok: true,
            status: self.phase(),
            registered_agents: self.registry.len(),
            total_games: self.lock_standings().total_games(),
        }
    }

    /// Start the league with the players registered now.
    ///
    /// On success the matches run in a spawned task; use
    /// [`wait_until_completed`](Self::wait_until_completed) to await the end.
    pub fn start(self: &Arc<Self>) -> Result<StartAck, StartError> {
        let players = self.registry.players();
        let mut refused = None;
        self.phase.send_if_modified(|phase| match *phase {
            LeaguePhase::NotStarted if players.len() >= 2 => {
                *phase = LeaguePhase::Running;
                true
            }
            LeaguePhase::NotStarted => {
                refused = Some(StartError::NotEnoughAgents {
                    registered: players.len(),
                });
                false
            }
            LeaguePhase::Running => {
                refused = Some(StartError::AlreadyRunning);
                false
            }
            LeaguePhase::Completed => {
                refused = Some(StartError::AlreadyCompleted);
                false
            }
        });
        if let Some(err) = refused {
            warn!("start refused: {err}");
            return Err(err);
        }

        let rounds = self.config.rounds();
        let names = players
            .iter()
            .map(|p| p.display_name.clone())
            .collect::<Vec<_>>();
        let fixtures = RoundRobinTournament::new(rounds).schedule(&names);
        let referee = self.pick_referee();
        info!(
            agents = players.len(),
            rounds,
            fixtures = fixtures.len(),
            referee = %referee.describe(),
            "league started"
        );

        let ack = StartAck {
            status: "started".to_string(),
            agents: players.len(),
            rounds,
            message: format!(
                "League started with {} agents, {rounds} rounds ({} matches)",
                players.len(),
                fixtures.len()
            ),
        };

        let players = players
            .into_iter()
            .map(|p| (p.display_name.clone(), p))
            .collect();
        tokio::spawn(self.clone().run(fixtures, players, referee));
        Ok(ack)
    }

    fn pick_referee(&self) -> Arc<dyn MatchReferee> {
        if let Some(referee) = &self.referee_override {
            return referee.clone();
        }
        if self.config.use_external_referee {
            match self.registry.referee() {
                Some(record) => {
                    return Arc::new(RemoteReferee::new(
                        record,
                        self.client.clone(),
                        self.config.timeouts(),
                        self.referee.clone(),
                    ))
                }
                None => warn!("external referee requested but none registered; using the embedded one"),
            }
        }
        Arc::new(self.referee.clone())
    }

    #[instrument(skip_all)]
    async fn run(
        self: Arc<Self>,
        fixtures: Vec<MatchSpec>,
        players: HashMap<String, AgentRecord>,
        referee: Arc<dyn MatchReferee>,
    ) {
        // 1. create scheduler and communication channels
        let mut scheduler =
            TournamentScheduler::new(fixtures, self.config.max_concurrent_matches());
        let (tx_result, mut rx_result) = mpsc::unbounded_channel();

        // 2. running matches (for printing purpose)
        let mut running = vec![];

        // 3. init matches
        for spec in scheduler.advance() {
            self.launch_match(spec, &players, &referee, &tx_result, &mut running);
        }

        // 4. main loop
        while !scheduler.is_finished() {
            // not finished <=> match running <=> result to receive
            let Some((spec, result)) = rx_result.recv().await else {
                error!("result channel closed with {} matches running", scheduler.running());
                break;
            };
            running.retain(|s: &MatchSpec| s != &spec);
            if self.config.verbose {
                print_match_result(&spec, &result);
            }
            self.record_result(&result).await;
            for next in scheduler.on_result(&spec) {
                self.launch_match(next, &players, &referee, &tx_result, &mut running);
            }
            self.rounds_completed
                .store(scheduler.rounds_completed(), Ordering::Release);
        }

        self.phase.send_replace(LeaguePhase::Completed);
        let report = self.standings();
        info!(total_games = report.total_games, "league completed");
        if let Some(leader) = report.standings.first() {
            info!(leader = %leader.agent, points = leader.points, "final leader");
        }
    }

    fn launch_match(
        &self,
        spec: MatchSpec,
        players: &HashMap<String, AgentRecord>,
        referee: &Arc<dyn MatchReferee>,
        tx_result: &mpsc::UnboundedSender<(MatchSpec, MatchResult)>,
        running: &mut Vec<MatchSpec>,
    ) {
        // endpoints may have changed since start
        let lookup = |name: &str| {
            self.registry
                .get(name)
                .ok()
                .or_else(|| players.get(name).cloned())
                .unwrap_or_else(|| AgentRecord::new(name, "", ""))
        };
        let a = lookup(&spec.player_a);
        let b = lookup(&spec.player_b);

        running.push(spec.clone());
        if self.config.verbose {
            print_running_matches(running);
        }

        let referee = referee.clone();
        let tx_result = tx_result.clone();
        tokio::spawn(async move {
            let result = match AssertUnwindSafe(referee.run_match(&spec, &a, &b))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(_) => {
                    error!("referee panicked during {spec}; recording a draw");
                    MatchResult::unplayed(spec.match_id.clone(), &spec.player_a, &spec.player_b)
                }
            };
            // the receiver only goes away with the league
            let _ = tx_result.send((spec, result));
        });
    }

    /// Apply one result to the standings, then hand it to the sink.
    pub async fn record_result(&self, result: &MatchResult) {
        let ranked = {
            let mut table = self.lock_standings();
            table.record(result);
            table.ranked()
        };
        info!(match_id = %result.match_id, winner = ?result.winner, "result recorded");

        if let Some(sink) = &self.sink {
            if let Err(err) = sink.record(result, &ranked).await {
                warn!(match_id = %result.match_id, "could not persist result: {err:#}");
            }
        }
    }

    /// Resolve once every fixture has finished.
    pub async fn wait_until_completed(&self) {
        let mut rx = self.phase.subscribe();
        // the sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(|phase| *phase == LeaguePhase::Completed).await;
    }

    /// Start automatically once `min_players` players (at least 2) are registered.
    ///
    /// Returns when the league has started, by this call or another one.
    pub async fn auto_start(self: Arc<Self>, min_players: usize, poll: Duration) {
        let min_players = min_players.max(2);
        loop {
            if self.phase() != LeaguePhase::NotStarted {
                return;
            }
            if self.registry.player_count() >= min_players {
                match self.start() {
                    Ok(ack) => {
                        info!("{}", ack.message);
                        return;
                    }
                    Err(StartError::NotEnoughAgents { .. }) => {}
                    Err(_) => return,
                }
            }
            tokio::time::sleep(poll).await;
        }
    }
}

fn match_score(spec: &MatchSpec, result: &MatchResult) -> String {
    match result.winner.as_deref() {
        Some(winner) if winner == spec.player_a => format!("{WIN_POINTS}-0"),
        Some(_) => format!("0-{WIN_POINTS}"),
        None => format!("{DRAW_POINTS}-{DRAW_POINTS}"),
    }
}

fn print_match_result(spec: &MatchSpec, result: &MatchResult) {
    let mut errors = vec![];
    if result.player_a_choice == Choice::None {
        errors.push(format!("no choice from {}", spec.player_a));
    }
    if result.player_b_choice == Choice::None {
        errors.push(format!("no choice from {}", spec.player_b));
    }

    // clear line, green match, results, red errors, start of line
    println!(
        "\x1b[2K\x1b[32m{spec}: \x1b[39m{} (dice {}) \x1b[31m{}\x1b[39m\x1b[0G",
        match_score(spec, result),
        result.dice_roll,
        errors.join(", ")
    );
}

fn print_running_matches(running: &[MatchSpec]) {
    // clear, green, default, start of line
    print!(
        "\x1b[2K\x1b[32mRunning...:\x1b[39m {}\x1b[0G",
        running
            .iter()
            .map(MatchSpec::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    let _ = std::io::Write::flush(&mut std::io::stdout());
}

#[cfg(test)]
mod league_tests {
    use async_trait::async_trait;

    use super::*;

    /// Always makes player A win.
    struct FavorA;

    #[async_trait]
    impl MatchReferee for FavorA {
        async fn run_match(&self, spec: &MatchSpec, a: &AgentRecord, b: &AgentRecord) -> MatchResult {
            tokio::task::yield_now().await;
            MatchResult::decide(
                spec.match_id.clone(),
                "g",
                (a.display_name.as_str(), Choice::Even),
                (b.display_name.as_str(), Choice::Odd),
                2,
            )
        }

        fn describe(&self) -> String {
            "favor A".into()
        }
    }

    fn league_with(players: &[&str], rounds: u32) -> Arc<League> {
        let league = League::new(LeagueConfig::new().with_rounds(rounds))
            .with_referee(Arc::new(FavorA));
        for name in players {
            league.register(AgentRecord::new(*name, "1", format!("http://{name}/mcp")));
        }
        Arc::new(league)
    }

    #[tokio::test]
    async fn start_needs_two_players() {
        let league = league_with(&["alice"], 1);
        assert_eq!(
            league.start(),
            Err(StartError::NotEnoughAgents { registered: 1 })
        );
        assert_eq!(league.phase(), LeaguePhase::NotStarted);

        league.register(AgentRecord::referee("ref", "1", "http://ref/mcp"));
        assert!(matches!(
            league.start(),
            Err(StartError::NotEnoughAgents { registered: 1 })
        ));
    }

    #[tokio::test]
    async fn runs_every_fixture_then_completes() {
        let league = league_with(&["alice", "bob", "carol"], 2);
        let ack = league.start().unwrap();
        assert_eq!((ack.status.as_str(), ack.agents, ack.rounds), ("started", 3, 2));
        assert_eq!(league.start(), Err(StartError::AlreadyRunning));

        league.wait_until_completed().await;
        assert_eq!(league.start(), Err(StartError::AlreadyCompleted));

        let report = league.standings();
        assert_eq!(report.status, LeaguePhase::Completed);
        assert_eq!(report.total_games, 6);
        assert_eq!(report.rounds_completed, 2);
        // alice is always player A, carol always player B
        let order = report
            .standings
            .iter()
            .map(|r| (r.agent.as_str(), r.points))
            .collect::<Vec<_>>();
        assert_eq!(order, [("alice", 12), ("bob", 6), ("carol", 0)]);
        assert_eq!(league.health().total_games, 6);
    }

    #[tokio::test]
    async fn player_turned_referee_leaves_the_standings() {
        let league = league_with(&["alice", "bob"], 1);
        league.register(AgentRecord::referee("bob", "1", "http://bob/mcp"));
        let names = league
            .standings()
            .standings
            .into_iter()
            .map(|row| row.agent)
            .collect::<Vec<_>>();
        assert_eq!(names, ["alice"]);
        assert_eq!(
            league.start(),
            Err(StartError::NotEnoughAgents { registered: 1 })
        );
    }

    #[tokio::test]
    async fn auto_start_waits_for_players() {
        let league = league_with(&["alice"], 1);
        let waiter = tokio::spawn(league.clone().auto_start(2, Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(league.phase(), LeaguePhase::NotStarted);

        league.register(AgentRecord::new("bob", "1", "http://bob/mcp"));
        waiter.await.unwrap();
        league.wait_until_completed().await;
        assert_eq!(league.standings().total_games, 1);
    }
}
