//! The player role: answers invitations, picks parities, and keeps its own record.
//!
//! All state of a player process lives in one [`PlayerAgent`] behind a single mutex, so
//! concurrent requests observe consistent statistics and history.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::{
    game::{GameOutcome, GameRecord, Parity, PlayerStats},
    jsonrpc::{MethodTable, Params, RpcError, RpcHandler},
    strategy::ParityStrategy,
};

/// JSON-RPC methods served by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerMethod {
    /// `handle_game_invitation`
    HandleGameInvitation,
    /// `parity_choose`, alias `choose_parity`
    ParityChoose,
    /// `notify_match_result`
    NotifyMatchResult,
    /// `ping`
    Ping,
}

/// An invitation as received from a referee.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Invitation {
    /// Absent in some referees' invitations; such invitations are still accepted.
    #[serde(default)]
    pub game_id: Option<String>,
    /// Echoed back verbatim; `null` when absent.
    #[serde(default)]
    pub invitation_id: Value,
    #[allow(missing_docs)]
    #[serde(default)]
    pub from_player: Option<String>,
    /// Any other field sent along.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ChooseParams {
    #[serde(default)]
    game_id: Option<String>,
    #[serde(flatten)]
    _extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct NotifyParams {
    #[serde(default)]
    game_id: Option<String>,
    #[serde(default)]
    winner: Value,
    #[serde(default)]
    details: Value,
    #[serde(flatten)]
    _extra: Map<String, Value>,
}

/// Answer to `GET /health` on a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerHealth {
    #[allow(missing_docs)]
    pub ok: bool,
    #[allow(missing_docs)]
    pub display_name: String,
    #[allow(missing_docs)]
    pub strategy: String,
    #[allow(missing_docs)]
    pub games_played: u32,
    #[allow(missing_docs)]
    pub wins: u32,
    #[allow(missing_docs)]
    pub losses: u32,
    #[allow(missing_docs)]
    pub draws: u32,
}

#[derive(Debug)]
struct PlayerState {
    strategy: Box<dyn ParityStrategy>,
    stats: PlayerStats,
    history: Vec<GameRecord>,
    invitations: HashMap<String, Invitation>,
    choices: HashMap<String, Parity>,
}

/// A player process.
#[derive(Debug)]
pub struct PlayerAgent {
    display_name: String,
    strategy_name: String,
    state: Mutex<PlayerState>,
    methods: MethodTable<PlayerMethod>,
}

impl PlayerAgent {
    /// A player with no history, using `strategy`.
    pub fn new(display_name: impl Into<String>, strategy: Box<dyn ParityStrategy>) -> Self {
        let display_name = display_name.into();
        let strategy_name = strategy.name();
        info!(%display_name, strategy = %strategy_name, "player state initialized");
        Self {
            display_name,
            strategy_name,
            state: Mutex::new(PlayerState {
                strategy,
                stats: PlayerStats::default(),
                history: vec![],
                invitations: HashMap::new(),
                choices: HashMap::new(),
            }),
            methods: MethodTable::new()
                .with_method("handle_game_invitation", PlayerMethod::HandleGameInvitation)
                .with_method("parity_choose", PlayerMethod::ParityChoose)
                .with_alias("choose_parity", "parity_choose")
                .with_method("notify_match_result", PlayerMethod::NotifyMatchResult)
                .with_method("ping", PlayerMethod::Ping),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[allow(missing_docs)]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[allow(missing_docs)]
    pub fn strategy_name(&self) -> &str {
        &self.strategy_name
    }

    /// Current statistics.
    pub fn stats(&self) -> PlayerStats {
        self.lock().stats
    }

    /// Finished games, oldest first.
    pub fn history(&self) -> Vec<GameRecord> {
        self.lock().history.clone()
    }

    /// The invitation received for `game_id`, if any.
    pub fn invitation(&self, game_id: &str) -> Option<Invitation> {
        self.lock().invitations.get(game_id).cloned()
    }

    /// The parity chosen for `game_id`, if any.
    pub fn choice_for(&self, game_id: &str) -> Option<Parity> {
        self.lock().choices.get(game_id).copied()
    }

    #[allow(missing_docs)]
    pub fn health(&self) -> PlayerHealth {
        let stats = self.stats();
        PlayerHealth {
            ok: true,
            display_name: self.display_name.clone(),
            strategy: self.strategy_name.clone(),
            games_played: stats.games_played,
            wins: stats.wins,
            losses: stats.losses,
            draws: stats.draws,
        }
    }

    /// Accept an invitation. Invitations are never refused.
    ///
    /// The ack echoes `game_id` and `invitation_id` when they were sent.
    pub fn accept_invitation(&self, invitation: Invitation) -> Value {
        let mut ack = json!({
            "type": "GAME_JOIN_ACK",
            "accepted": true,
        });
        if let Some(game_id) = invitation.game_id.as_deref().filter(|id| !id.is_empty()) {
            ack["game_id"] = json!(game_id);
        }
        if !invitation.invitation_id.is_null() {
            ack["invitation_id"] = invitation.invitation_id.clone();
        }
        let key = invitation.game_id.clone().unwrap_or_default();
        let mut state = self.lock();
        state.stats.games_invited += 1;
        debug!(
            game_id = %key,
            from = ?invitation.from_player,
            total_invited = state.stats.games_invited,
            "invitation recorded"
        );
        state.invitations.insert(key, invitation);
        ack
    }

    /// Run the strategy for `game_id` and remember the answer.
    pub fn choose(&self, game_id: &str) -> Parity {
        let mut guard = self.lock();
        let state = &mut *guard;
        let choice = state.strategy.choose(game_id, &state.history, &state.stats);
        state.choices.insert(game_id.to_string(), choice);
        debug!(game_id, %choice, "parity chosen");
        choice
    }

    /// Record the outcome of `game_id` as reported by the referee.
    ///
    /// `details` is read leniently: missing or mistyped fields are ignored.
    pub fn record_result(&self, game_id: &str, winner: Option<&str>, details: &Value) -> GameRecord {
        let is_draw = details.get("is_draw").and_then(Value::as_bool) == Some(true);
        let outcome = match winner.filter(|w| !w.is_empty()) {
            _ if is_draw => GameOutcome::Draw,
            None => GameOutcome::Draw,
            Some(name) if name == self.display_name => GameOutcome::Win,
            Some(_) => GameOutcome::Loss,
        };

        let field = |key: &str| details.get(key).and_then(Value::as_str);
        let parity = |key: &str| field(key).and_then(|s| s.parse::<Parity>().ok());
        let (own_side, other_side) = if field("player_b") == Some(self.display_name.as_str()) {
            ("player_b", "player_a")
        } else {
            ("player_a", "player_b")
        };
        let opponent = field("your_opponent")
            .or_else(|| field(other_side).filter(|name| *name != self.display_name))
            .map(str::to_string);
        let dice_roll = details
            .get("dice_roll")
            .and_then(Value::as_u64)
            .and_then(|roll| u32::try_from(roll).ok());

        let mut state = self.lock();
        let own_choice = state
            .choices
            .get(game_id)
            .copied()
            .or_else(|| parity(format!("{own_side}_choice").as_str()));
        let record = GameRecord {
            game_id: game_id.to_string(),
            opponent,
            own_choice,
            opponent_choice: parity(format!("{other_side}_choice").as_str()),
            dice_roll,
            won: outcome == GameOutcome::Win,
            outcome,
        };
        state.stats.record(outcome);
        state.history.push(record.clone());
        info!(
            game_id,
            ?outcome,
            played = state.stats.games_played,
            wins = state.stats.wins,
            "match result recorded"
        );
        record
    }
}

#[async_trait]
impl RpcHandler for PlayerAgent {
    type Method = PlayerMethod;

    fn methods(&self) -> &MethodTable<PlayerMethod> {
        &self.methods
    }

    async fn handle(&self, method: PlayerMethod, params: Params) -> Result<Value, RpcError> {
        match method {
            PlayerMethod::HandleGameInvitation => Ok(self.accept_invitation(params.parse()?)),
            PlayerMethod::ParityChoose => {
                let params: ChooseParams = params.parse()?;
                let game_id = params.game_id.unwrap_or_default();
                let choice = self.choose(&game_id);
                let mut answer = json!({
                    "type": "RESPONSE_PARITY_CHOOSE",
                    "choice": choice,
                });
                if !game_id.is_empty() {
                    answer["game_id"] = json!(game_id);
                }
                Ok(answer)
            }
            PlayerMethod::NotifyMatchResult => {
                let params: NotifyParams = params.parse()?;
                let game_id = params.game_id.unwrap_or_default();
                self.record_result(&game_id, params.winner.as_str(), &params.details);
                Ok(json!({ "ok": true }))
            }
            PlayerMethod::Ping => Ok(json!({
                "ok": true,
                "message": "pong",
                "display_name": self.display_name,
            })),
        }
    }
}

#[cfg(test)]
mod player_tests {
    use std::sync::Arc;

    use crate::{jsonrpc::dispatch, strategy::Constant};

    use super::*;

    fn player(name: &str, parity: Parity) -> PlayerAgent {
        PlayerAgent::new(name, Box::new(Constant(parity)))
    }

    async fn call(player: &PlayerAgent, method: &str, params: Value) -> Result<Value, RpcError> {
        let body = json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params});
        dispatch(player, body.to_string().as_bytes())
            .await
            .into_result()
    }

    #[tokio::test]
    async fn invitation_is_always_accepted() {
        let alice = player("alice", Parity::Even);
        let ack = call(
            &alice,
            "handle_game_invitation",
            json!({"game_id": "g1", "invitation_id": "inv-1", "from_player": "ref", "round": 2}),
        )
        .await
        .unwrap();
        assert_eq!(
            ack,
            json!({"type": "GAME_JOIN_ACK", "accepted": true, "game_id": "g1", "invitation_id": "inv-1"})
        );
        assert_eq!(alice.stats().games_invited, 1);
        assert_eq!(alice.invitation("g1").unwrap().extra["round"], json!(2));
    }

    #[tokio::test]
    async fn choose_via_alias_records_choice() {
        let alice = player("alice", Parity::Odd);
        for method in ["parity_choose", "choose_parity"] {
            let answer = call(&alice, method, json!({"game_id": "g1"})).await.unwrap();
            assert_eq!(answer["type"], "RESPONSE_PARITY_CHOOSE");
            assert_eq!(answer["choice"], "odd");
            assert_eq!(answer["game_id"], "g1");
        }
        assert_eq!(alice.choice_for("g1"), Some(Parity::Odd));
    }

    #[tokio::test]
    async fn missing_game_id_is_tolerated() {
        let alice = player("alice", Parity::Odd);
        let ack = call(&alice, "handle_game_invitation", json!({})).await.unwrap();
        assert_eq!(ack, json!({"type": "GAME_JOIN_ACK", "accepted": true}));
        assert_eq!(alice.stats().games_invited, 1);

        let answer = call(&alice, "parity_choose", json!({})).await.unwrap();
        assert_eq!(answer["choice"], "odd");
        assert!(answer.get("game_id").is_none());

        call(&alice, "notify_match_result", json!({"winner": "alice"}))
            .await
            .unwrap();
        assert_eq!(alice.stats().wins, 1);
    }

    #[tokio::test]
    async fn non_object_params_are_invalid() {
        let alice = player("alice", Parity::Odd);
        let err = call(&alice, "notify_match_result", json!(["g1"])).await.unwrap_err();
        assert_eq!(err.code, -32602);
        let err = call(&alice, "handle_game_invitation", json!([])).await.unwrap_err();
        assert_eq!(err.code, -32602);
    }

    #[tokio::test]
    async fn outcomes_follow_winner_and_draw_flag() {
        let alice = player("alice", Parity::Even);
        call(&alice, "parity_choose", json!({"game_id": "g1"})).await.unwrap();
        let details = json!({
            "dice_roll": 42, "dice_parity": "even", "your_opponent": "bob",
            "player_a": "alice", "player_b": "bob",
            "player_a_choice": "even", "player_b_choice": "odd", "is_draw": false,
        });
        let ok = call(
            &alice,
            "notify_match_result",
            json!({"game_id": "g1", "winner": "alice", "details": details}),
        )
        .await
        .unwrap();
        assert_eq!(ok, json!({"ok": true}));

        call(&alice, "notify_match_result", json!({"game_id": "g2", "winner": "bob"}))
            .await
            .unwrap();
        call(&alice, "notify_match_result", json!({"game_id": "g3", "winner": null}))
            .await
            .unwrap();
        call(
            &alice,
            "notify_match_result",
            json!({"game_id": "g4", "winner": "", "details": "garbage"}),
        )
        .await
        .unwrap();

        let stats = alice.stats();
        assert_eq!(
            (stats.games_played, stats.wins, stats.losses, stats.draws),
            (4, 1, 1, 2)
        );
        let history = alice.history();
        assert_eq!(history[0].opponent.as_deref(), Some("bob"));
        assert_eq!(history[0].own_choice, Some(Parity::Even));
        assert_eq!(history[0].opponent_choice, Some(Parity::Odd));
        assert_eq!(history[0].dice_roll, Some(42));
        assert!(history[0].won);
        assert_eq!(history[1].outcome, GameOutcome::Loss);
    }

    #[tokio::test]
    async fn own_choice_read_from_details_when_not_recorded() {
        let bob = player("bob", Parity::Odd);
        let details = json!({"player_a": "alice", "player_b": "bob",
            "player_a_choice": "even", "player_b_choice": "odd", "is_draw": true});
        call(
            &bob,
            "notify_match_result",
            json!({"game_id": "g9", "winner": null, "details": details}),
        )
        .await
        .unwrap();
        let record = &bob.history()[0];
        assert_eq!(record.own_choice, Some(Parity::Odd));
        assert_eq!(record.opponent_choice, Some(Parity::Even));
        assert_eq!(record.opponent.as_deref(), Some("alice"));
        assert_eq!(record.outcome, GameOutcome::Draw);
    }

    #[tokio::test]
    async fn ping_names_the_player() {
        let alice = player("alice", Parity::Even);
        let pong = call(&alice, "ping", Value::Null).await.unwrap();
        assert_eq!(pong, json!({"ok": true, "message": "pong", "display_name": "alice"}));
    }

    #[tokio::test]
    async fn concurrent_notifications_keep_counts_consistent() {
        let alice = Arc::new(player("alice", Parity::Even));
        let tasks = (0..40)
            .map(|i| {
                let alice = alice.clone();
                tokio::spawn(async move {
                    let winner = if i % 2 == 0 { "alice" } else { "bob" };
                    alice.record_result(&format!("g{i}"), Some(winner), &Value::Null);
                })
            })
            .collect::<Vec<_>>();
        for task in tasks {
            task.await.unwrap();
        }
        let stats = alice.stats();
        assert_eq!(stats.games_played, 40);
        assert_eq!(stats.wins + stats.losses + stats.draws, 40);
        assert_eq!(alice.history().len(), 40);
    }
}
