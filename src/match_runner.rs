//! Running one match: the referee protocol.
//!
//! A match is four strictly sequential steps, tracked by [`MatchPhase`]:
//!
//! 1. `handle_game_invitation` to player A, then player B. A refusal or a timeout is logged
//!    and the match goes on.
//! 2. `parity_choose` to A, then B. Anything but `"even"`/`"odd"` in time becomes
//!    [`Choice::None`].
//! 3. One dice roll in `1..=100`, resolved by [`resolve`].
//! 4. `notify_match_result` to A, then B. Failures are logged and ignored.
//!
//! [`Referee::play_match`] therefore always produces a [`MatchResult`], whatever the players
//! do. The league reaches referees through the [`MatchReferee`] trait, implemented by the
//! embedded [`Referee`] and by [`RemoteReferee`], which delegates to a referee process
//! serving [`RefereeService`].

use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

use crate::{
    agent::AgentRecord,
    client::RpcClient,
    configuration::MatchTimeouts,
    error::CallError,
    game::{Choice, Parity},
    jsonrpc::{MethodTable, Params, RpcError, RpcHandler},
    tournament_strategy::MatchSpec,
};

/// Progress of a match, in protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchPhase {
    #[allow(missing_docs)]
    InvitedASent,
    #[allow(missing_docs)]
    InvitedBSent,
    #[allow(missing_docs)]
    ChoiceAReceived,
    #[allow(missing_docs)]
    ChoiceBReceived,
    #[allow(missing_docs)]
    Resolved,
    #[allow(missing_docs)]
    NotifiedA,
    #[allow(missing_docs)]
    NotifiedB,
    #[allow(missing_docs)]
    Done,
}

impl MatchPhase {
    /// The phase that follows. `Done` is terminal.
    pub fn next(self) -> Self {
        match self {
            MatchPhase::InvitedASent => MatchPhase::InvitedBSent,
            MatchPhase::InvitedBSent => MatchPhase::ChoiceAReceived,
            MatchPhase::ChoiceAReceived => MatchPhase::ChoiceBReceived,
            MatchPhase::ChoiceBReceived => MatchPhase::Resolved,
            MatchPhase::Resolved => MatchPhase::NotifiedA,
            MatchPhase::NotifiedA => MatchPhase::NotifiedB,
            MatchPhase::NotifiedB | MatchPhase::Done => MatchPhase::Done,
        }
    }
}

/// Why a match without winner is a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawKind {
    #[allow(missing_docs)]
    BothCorrect,
    #[allow(missing_docs)]
    BothWrong,
}

/// One of the two seats of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    #[allow(missing_docs)]
    A,
    #[allow(missing_docs)]
    B,
}

/// Outcome of a match, before names are attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    #[allow(missing_docs)]
    Winner(Side),
    #[allow(missing_docs)]
    Draw(DrawKind),
}

/// Decide a match: a player is correct when its choice equals the dice parity, and wins when
/// it is the only correct one.
pub fn resolve(a: Choice, b: Choice, dice_parity: Parity) -> Outcome {
    match (a.is_correct(dice_parity), b.is_correct(dice_parity)) {
        (true, false) => Outcome::Winner(Side::A),
        (false, true) => Outcome::Winner(Side::B),
        (true, true) => Outcome::Draw(DrawKind::BothCorrect),
        (false, false) => Outcome::Draw(DrawKind::BothWrong),
    }
}

/// Everything known about a finished match. `winner` is set if and only if `is_draw` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    #[allow(missing_docs)]
    pub match_id: String,
    /// Identifier sent to the players.
    pub game_id: String,
    #[allow(missing_docs)]
    pub player_a: String,
    #[allow(missing_docs)]
    pub player_b: String,
    #[allow(missing_docs)]
    pub player_a_choice: Choice,
    #[allow(missing_docs)]
    pub player_b_choice: Choice,
    /// In `1..=100`.
    pub dice_roll: u32,
    #[allow(missing_docs)]
    pub dice_parity: Parity,
    #[allow(missing_docs)]
    pub winner: Option<String>,
    #[allow(missing_docs)]
    pub is_draw: bool,
    #[allow(missing_docs)]
    pub draw_kind: Option<DrawKind>,
}

impl MatchResult {
    /// Build the result of a match from the two choices and the roll.
    pub fn decide(
        match_id: impl Into<String>,
        game_id: impl Into<String>,
        (player_a, player_a_choice): (&str, Choice),
        (player_b, player_b_choice): (&str, Choice),
        dice_roll: u32,
    ) -> Self {
        let dice_parity = Parity::of(dice_roll);
        let (winner, draw_kind) = match resolve(player_a_choice, player_b_choice, dice_parity) {
            Outcome::Winner(Side::A) => (Some(player_a.to_string()), None),
            Outcome::Winner(Side::B) => (Some(player_b.to_string()), None),
            Outcome::Draw(kind) => (None, Some(kind)),
        };
        MatchResult {
            match_id: match_id.into(),
            game_id: game_id.into(),
            player_a: player_a.to_string(),
            player_b: player_b.to_string(),
            player_a_choice,
            player_b_choice,
            dice_roll,
            dice_parity,
            is_draw: winner.is_none(),
            winner,
            draw_kind,
        }
    }

    /// The player who lost, if there is a winner.
    pub fn loser(&self) -> Option<&str> {
        match self.winner.as_deref() {
            Some(w) if w == self.player_a => Some(self.player_b.as_str()),
            Some(w) if w == self.player_b => Some(self.player_a.as_str()),
            _ => None,
        }
    }

    /// A fixture whose outcome is unknown: both choices `none`, so a both-wrong draw.
    pub fn unplayed(match_id: impl Into<String>, player_a: &str, player_b: &str) -> Self {
        Self::decide(
            match_id,
            "none",
            (player_a, Choice::None),
            (player_b, Choice::None),
            roll_dice(),
        )
    }

    fn details_for(&self, opponent: &str) -> Value {
        json!({
            "dice_roll": self.dice_roll,
            "dice_parity": self.dice_parity,
            "your_opponent": opponent,
            "player_a": self.player_a,
            "player_b": self.player_b,
            "player_a_choice": self.player_a_choice,
            "player_b_choice": self.player_b_choice,
            "is_draw": self.is_draw,
            "draw_kind": self.draw_kind,
            "match_id": self.match_id,
        })
    }
}

impl Display for MatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) vs {} ({}), dice {} ({}): ",
            self.player_a,
            self.player_a_choice,
            self.player_b,
            self.player_b_choice,
            self.dice_roll,
            self.dice_parity
        )?;
        match (&self.winner, self.draw_kind) {
            (Some(winner), _) => write!(f, "{winner} wins"),
            (None, Some(DrawKind::BothCorrect)) => f.write_str("draw (both correct)"),
            (None, _) => f.write_str("draw (both wrong)"),
        }
    }
}

/// Source of dice rolls, injectable for tests.
pub type DiceSource = Arc<dyn Fn() -> u32 + Send + Sync>;

/// Uniform roll in `1..=100`.
pub fn roll_dice() -> u32 {
    rand::thread_rng().gen_range(1..=100)
}

/// Runs matches by talking to the players directly. Holds no per-match state.
#[derive(Clone)]
pub struct Referee {
    client: RpcClient,
    timeouts: MatchTimeouts,
    dice: DiceSource,
    name: String,
}

impl std::fmt::Debug for Referee {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Referee")
            .field("name", &self.name)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl Referee {
    /// A referee rolling a fair dice.
    pub fn new(name: impl Into<String>, client: RpcClient, timeouts: MatchTimeouts) -> Self {
        Self {
            client,
            timeouts,
            dice: Arc::new(roll_dice),
            name: name.into(),
        }
    }

    /// Replace the dice. Rolls must be in `1..=100`.
    pub fn with_dice(mut self, dice: impl Fn() -> u32 + Send + Sync + 'static) -> Self {
        self.dice = Arc::new(dice);
        self
    }

    #[allow(missing_docs)]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn advance(&self, phase: &mut MatchPhase) {
        *phase = phase.next();
        trace!(?phase);
    }

    /// Run one match between `a` and `b`. Never fails: unresponsive players get
    /// [`Choice::None`].
    #[instrument(skip_all, fields(match_id = %match_id, a = %a.display_name, b = %b.display_name))]
    pub async fn play_match(&self, match_id: &str, a: &AgentRecord, b: &AgentRecord) -> MatchResult {
        let game_id = format!("game_{}", short_id());
        let invitation_id = format!("inv_{}", short_id());
        info!(%game_id, "starting match {match_id}");

        let mut phase = MatchPhase::InvitedASent;
        self.invite(a, b, &game_id, match_id, &format!("{invitation_id}_1"))
            .await;
        self.advance(&mut phase);
        self.invite(b, a, &game_id, match_id, &format!("{invitation_id}_2"))
            .await;
        self.advance(&mut phase);

        let choice_a = self.collect_choice(a, &game_id).await;
        self.advance(&mut phase);
        let choice_b = self.collect_choice(b, &game_id).await;
        self.advance(&mut phase);

        let dice_roll = (self.dice)();
        let result = MatchResult::decide(
            match_id,
            game_id,
            (a.display_name.as_str(), choice_a),
            (b.display_name.as_str(), choice_b),
            dice_roll,
        );
        info!("{result}");
        self.advance(&mut phase);

        self.notify(a, &b.display_name, &result).await;
        self.advance(&mut phase);
        self.notify(b, &a.display_name, &result).await;
        self.advance(&mut phase);
        debug_assert_eq!(phase, MatchPhase::Done);

        result
    }

    async fn invite(
        &self,
        player: &AgentRecord,
        opponent: &AgentRecord,
        game_id: &str,
        match_id: &str,
        invitation_id: &str,
    ) {
        let params = json!({
            "game_id": game_id,
            "invitation_id": invitation_id,
            "from_player": self.name,
            "opponent": opponent.display_name,
            "match_id": match_id,
        });
        match self
            .client
            .call(
                &player.endpoint_url,
                "handle_game_invitation",
                params,
                self.timeouts.invitation(),
            )
            .await
        {
            Ok(ack) if ack["type"] == "GAME_JOIN_ACK" && ack["accepted"] == true => {
                debug!(player = %player.display_name, "invitation accepted");
            }
            Ok(other) => {
                warn!(player = %player.display_name, "invitation not accepted: {other}");
            }
            Err(err) => warn!(player = %player.display_name, "invitation failed: {err}"),
        }
    }

    async fn collect_choice(&self, player: &AgentRecord, game_id: &str) -> Choice {
        let answer = self
            .client
            .call(
                &player.endpoint_url,
                "parity_choose",
                json!({ "game_id": game_id }),
                self.timeouts.choice(),
            )
            .await;
        match answer {
            Ok(result) => {
                let choice = Choice::from_wire(result.get("choice").and_then(Value::as_str));
                if choice == Choice::None {
                    warn!(player = %player.display_name, "invalid choice: {result}");
                }
                choice
            }
            Err(err) => {
                warn!(player = %player.display_name, "no choice: {err}");
                Choice::None
            }
        }
    }

    async fn notify(&self, player: &AgentRecord, opponent: &str, result: &MatchResult) {
        let params = json!({
            "game_id": result.game_id,
            "winner": result.winner,
            "details": result.details_for(opponent),
        });
        if let Err(err) = self
            .client
            .call(
                &player.endpoint_url,
                "notify_match_result",
                params,
                self.timeouts.notification(),
            )
            .await
        {
            warn!(player = %player.display_name, "notification failed: {err}");
        }
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// How the league gets a fixture played.
#[async_trait]
pub trait MatchReferee: Send + Sync {
    /// Play `spec` between `a` and `b`. Always produces a result.
    async fn run_match(&self, spec: &MatchSpec, a: &AgentRecord, b: &AgentRecord) -> MatchResult;

    /// Short description for logs.
    fn describe(&self) -> String;
}

#[async_trait]
impl MatchReferee for Referee {
    async fn run_match(&self, spec: &MatchSpec, a: &AgentRecord, b: &AgentRecord) -> MatchResult {
        self.play_match(&spec.match_id, a, b).await
    }

    fn describe(&self) -> String {
        format!("embedded referee '{}'", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MatchPlayer {
    display_name: String,
    #[serde(default)]
    version: String,
    endpoint: String,
}

impl From<&AgentRecord> for MatchPlayer {
    fn from(record: &AgentRecord) -> Self {
        MatchPlayer {
            display_name: record.display_name.clone(),
            version: record.version.clone(),
            endpoint: record.endpoint_url.clone(),
        }
    }
}

impl From<MatchPlayer> for AgentRecord {
    fn from(player: MatchPlayer) -> Self {
        AgentRecord::new(player.display_name, player.version, player.endpoint)
    }
}

/// A referee process reached over JSON-RPC.
///
/// Every fixture still produces a result. When the call is turned away before the remote
/// referee could start the match, the embedded referee plays it instead. When the remote
/// referee may already have contacted the players (timeout, garbled answer, internal error),
/// the fixture is recorded as [unplayed](MatchResult::unplayed) so that no player is notified
/// twice for it.
#[derive(Debug, Clone)]
pub struct RemoteReferee {
    record: AgentRecord,
    client: RpcClient,
    budget: std::time::Duration,
    fallback: Referee,
}

impl RemoteReferee {
    /// Delegate to `record`, waiting at most `timeouts.match_budget()` per match.
    pub fn new(
        record: AgentRecord,
        client: RpcClient,
        timeouts: MatchTimeouts,
        fallback: Referee,
    ) -> Self {
        Self {
            record,
            client,
            budget: timeouts.match_budget(),
            fallback,
        }
    }

    /// Wait at most `budget` for each remote match.
    pub fn with_budget(mut self, budget: std::time::Duration) -> Self {
        self.budget = budget;
        self
    }

    async fn delegate(
        &self,
        spec: &MatchSpec,
        a: &AgentRecord,
        b: &AgentRecord,
    ) -> Result<MatchResult, CallError> {
        let params = json!({
            "match_id": spec.match_id,
            "player1": MatchPlayer::from(a),
            "player2": MatchPlayer::from(b),
        });
        let value = self
            .client
            .call(&self.record.endpoint_url, "run_match", params, self.budget)
            .await?;
        let result: MatchResult = serde_json::from_value(value)?;
        if result.player_a != a.display_name || result.player_b != b.display_name {
            return Err(CallError::Rpc(RpcError::internal(format!(
                "result is for {} vs {}",
                result.player_a, result.player_b
            ))));
        }
        Ok(result)
    }
}

#[async_trait]
impl MatchReferee for RemoteReferee {
    async fn run_match(&self, spec: &MatchSpec, a: &AgentRecord, b: &AgentRecord) -> MatchResult {
        match self.delegate(spec, a, b).await {
            Ok(result) => result,
            Err(err) if err.rejected_before_running() => {
                warn!(
                    referee = %self.record.display_name,
                    "remote referee refused {spec}: {err}; running it locally"
                );
                self.fallback.play_match(&spec.match_id, a, b).await
            }
            Err(err) => {
                error!(
                    referee = %self.record.display_name,
                    "remote referee failed on {spec}: {err}; recording it as unplayed"
                );
                MatchResult::unplayed(spec.match_id.clone(), &a.display_name, &b.display_name)
            }
        }
    }

    fn describe(&self) -> String {
        format!("remote referee '{}'", self.record)
    }
}

/// JSON-RPC methods served by a referee process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefereeMethod {
    /// `ping`
    Ping,
    /// `run_match`
    RunMatch,
}

#[derive(Debug, Deserialize)]
struct RunMatchParams {
    #[serde(default)]
    match_id: Option<String>,
    player1: MatchPlayer,
    player2: MatchPlayer,
}

/// Answer to `GET /health` on a referee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefereeHealth {
    #[allow(missing_docs)]
    pub ok: bool,
    #[allow(missing_docs)]
    pub display_name: String,
    /// Matches run since startup.
    pub matches_run: u64,
}

/// The referee role: runs matches on request.
#[derive(Debug)]
pub struct RefereeService {
    referee: Referee,
    matches_run: AtomicU64,
    methods: MethodTable<RefereeMethod>,
}

impl RefereeService {
    #[allow(missing_docs)]
    pub fn new(referee: Referee) -> Self {
        Self {
            referee,
            matches_run: AtomicU64::new(0),
            methods: MethodTable::new()
                .with_method("ping", RefereeMethod::Ping)
                .with_method("run_match", RefereeMethod::RunMatch),
        }
    }

    #[allow(missing_docs)]
    pub fn health(&self) -> RefereeHealth {
        RefereeHealth {
            ok: true,
            display_name: self.referee.name().to_string(),
            matches_run: self.matches_run.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl RpcHandler for RefereeService {
    type Method = RefereeMethod;

    fn methods(&self) -> &MethodTable<RefereeMethod> {
        &self.methods
    }

    async fn handle(&self, method: RefereeMethod, params: Params) -> Result<Value, RpcError> {
        match method {
            RefereeMethod::Ping => Ok(json!({
                "ok": true,
                "message": "pong",
                "display_name": self.referee.name(),
            })),
            RefereeMethod::RunMatch => {
                let params: RunMatchParams = params.parse()?;
                let match_id = params
                    .match_id
                    .unwrap_or_else(|| format!("match_{}", short_id()));
                let a = AgentRecord::from(params.player1);
                let b = AgentRecord::from(params.player2);
                if a == b {
                    return Err(RpcError::invalid_params("a player cannot play itself"));
                }
                let result = self.referee.play_match(&match_id, &a, &b).await;
                self.matches_run.fetch_add(1, Ordering::Relaxed);
                serde_json::to_value(result).map_err(RpcError::internal)
            }
        }
    }
}

#[cfg(test)]
mod match_runner_tests {
    use std::time::Duration;

    use crate::{jsonrpc::dispatch, player::PlayerAgent, server::player_router, strategy::Constant};

    use super::*;

    const UNREACHABLE: &str = "http://127.0.0.1:1/mcp";

    fn quick_referee(roll: u32) -> Referee {
        Referee::new(
            "ref",
            RpcClient::new(),
            MatchTimeouts::uniform(Duration::from_millis(300)),
        )
        .with_dice(move || roll)
    }

    #[test]
    fn resolution_table() {
        use Choice::*;
        let even = Parity::Even;
        assert_eq!(resolve(Even, Odd, even), Outcome::Winner(Side::A));
        assert_eq!(resolve(Odd, Even, even), Outcome::Winner(Side::B));
        assert_eq!(resolve(Even, Even, even), Outcome::Draw(DrawKind::BothCorrect));
        assert_eq!(resolve(Odd, Odd, even), Outcome::Draw(DrawKind::BothWrong));
        assert_eq!(resolve(None, Odd, Parity::Odd), Outcome::Winner(Side::B));
        assert_eq!(resolve(None, None, even), Outcome::Draw(DrawKind::BothWrong));
    }

    #[test]
    fn phases_run_in_order() {
        let mut phase = MatchPhase::InvitedASent;
        let mut seen = vec![phase];
        while phase != MatchPhase::Done {
            phase = phase.next();
            seen.push(phase);
        }
        assert_eq!(seen.len(), 8);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(MatchPhase::Done.next(), MatchPhase::Done);
    }

    #[test]
    fn winner_xor_draw() {
        for roll in 1..=100 {
            for a in [Choice::Even, Choice::Odd, Choice::None] {
                for b in [Choice::Even, Choice::Odd, Choice::None] {
                    let result = MatchResult::decide("m", "g", ("a", a), ("b", b), roll);
                    assert_ne!(result.winner.is_some(), result.is_draw);
                    assert_eq!(result.draw_kind.is_some(), result.is_draw);
                    assert_eq!(result.dice_parity, Parity::of(roll));
                }
            }
        }
        let result = MatchResult::decide("m", "g", ("a", Choice::Even), ("b", Choice::Odd), 8);
        assert_eq!(result.winner.as_deref(), Some("a"));
        assert_eq!(result.loser(), Some("b"));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["dice_parity"], "even");
        assert_eq!(json["draw_kind"], Value::Null);
    }

    #[tokio::test]
    async fn unreachable_players_still_produce_a_result() {
        let a = AgentRecord::new("a", "1", UNREACHABLE);
        let b = AgentRecord::new("b", "1", UNREACHABLE);
        let result = quick_referee(17).play_match("r1-m1", &a, &b).await;
        assert_eq!(result.player_a_choice, Choice::None);
        assert_eq!(result.player_b_choice, Choice::None);
        assert!(result.is_draw);
        assert_eq!(result.draw_kind, Some(DrawKind::BothWrong));
        assert_eq!(result.dice_roll, 17);
        assert!(result.game_id.starts_with("game_"));
    }

    #[tokio::test]
    async fn remote_failure_falls_back_to_embedded() {
        let remote = RemoteReferee::new(
            AgentRecord::referee("gone", "1", UNREACHABLE),
            RpcClient::new(),
            MatchTimeouts::uniform(Duration::from_millis(100)),
            quick_referee(4),
        );
        let spec = MatchSpec {
            match_id: "r1-m1".into(),
            player_a: "a".into(),
            player_b: "b".into(),
            round_number: 1,
        };
        let a = AgentRecord::new("a", "1", UNREACHABLE);
        let b = AgentRecord::new("b", "1", UNREACHABLE);
        let result = remote.run_match(&spec, &a, &b).await;
        assert_eq!(result.match_id, "r1-m1");
        assert_eq!(result.dice_roll, 4);
    }

    async fn serve(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/mcp", listener.local_addr().unwrap());
        tokio::spawn(async move { axum::serve(listener, app).await });
        endpoint
    }

    async fn served_player(name: &str) -> (Arc<PlayerAgent>, AgentRecord) {
        let player = Arc::new(PlayerAgent::new(name, Box::new(Constant(Parity::Even))));
        let endpoint = serve(player_router(player.clone())).await;
        (player, AgentRecord::new(name, "1", endpoint))
    }

    fn fixture() -> MatchSpec {
        MatchSpec {
            match_id: "r1-m1".into(),
            player_a: "alice".into(),
            player_b: "bob".into(),
            round_number: 1,
        }
    }

    #[tokio::test]
    async fn slow_remote_is_not_replayed() {
        let (alice, a) = served_player("alice").await;
        let (bob, b) = served_player("bob").await;
        let slow = axum::Router::new().route(
            "/mcp",
            axum::routing::post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "{}"
            }),
        );
        let remote = RemoteReferee::new(
            AgentRecord::referee("slow", "1", serve(slow).await),
            RpcClient::new(),
            MatchTimeouts::uniform(Duration::from_millis(100)),
            quick_referee(4),
        )
        .with_budget(Duration::from_millis(200));

        let result = remote.run_match(&fixture(), &a, &b).await;
        assert_eq!(result.match_id, "r1-m1");
        assert_eq!((result.player_a_choice, result.player_b_choice), (Choice::None, Choice::None));
        assert!(result.is_draw);
        // the embedded referee never contacted the players
        assert_eq!(alice.stats().games_invited, 0);
        assert_eq!(bob.stats().games_played, 0);
    }

    #[tokio::test]
    async fn refused_remote_is_played_locally() {
        let (alice, a) = served_player("alice").await;
        let (_, b) = served_player("bob").await;
        // a player does not know run_match: -32601
        let (_, not_a_referee) = served_player("carol").await;
        let remote = RemoteReferee::new(
            AgentRecord::referee("carol", "1", not_a_referee.endpoint_url),
            RpcClient::new(),
            MatchTimeouts::uniform(Duration::from_millis(500)),
            quick_referee(4),
        );

        let result = remote.run_match(&fixture(), &a, &b).await;
        assert_eq!(result.dice_roll, 4);
        assert_eq!(result.player_a_choice, Choice::Even);
        assert_eq!(alice.stats().games_played, 1);
    }

    #[tokio::test]
    async fn run_match_requires_both_players() {
        let service = RefereeService::new(quick_referee(1));
        let body = json!({
            "jsonrpc": "2.0", "id": 5, "method": "run_match",
            "params": {"player1": {"display_name": "a", "endpoint": UNREACHABLE}},
        });
        let response = dispatch(&service, body.to_string().as_bytes()).await;
        assert_eq!(response.error.unwrap().code, -32602);

        let body = json!({
            "jsonrpc": "2.0", "id": 6, "method": "run_match",
            "params": {
                "match_id": "x1",
                "player1": {"display_name": "a", "endpoint": UNREACHABLE},
                "player2": {"display_name": "b", "endpoint": UNREACHABLE},
            },
        });
        let response = dispatch(&service, body.to_string().as_bytes()).await;
        let result: MatchResult = serde_json::from_value(response.into_result().unwrap()).unwrap();
        assert_eq!(result.match_id, "x1");
        assert_eq!(service.health().matches_run, 1);
    }
}
