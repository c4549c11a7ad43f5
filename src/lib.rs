//! # Parity League
//!
//! A league of independent HTTP agents playing the parity game.
//!
//! Three kinds of processes take part:
//! - a **league manager** ([`League`](crate::league::League)) that registers agents, builds a
//!   round-robin schedule, hands matches to a referee and keeps the standings,
//! - **players** ([`PlayerAgent`](crate::player::PlayerAgent)) that bet on the parity of a dice
//!   roll using a [`ParityStrategy`](crate::strategy::ParityStrategy),
//! - optionally, standalone **referees** ([`RefereeService`](crate::match_runner::RefereeService));
//!   by default the league manager referees matches itself.
//!
//! Agents talk JSON-RPC 2.0 over `POST /mcp`; the league manager exposes a small REST API.
//!
//! # Documentation Overview
//!
//! - The wire envelope and its error codes: [`jsonrpc`].
//! - How one match is played and decided: [`match_runner`].
//! - League lifecycle, scheduling and scoring: [`league`], [`tournament_strategy`],
//!   [`standings`].
//! - HTTP routes of each role: [`server`].
//! - Configuration and environment variables: [`configuration`].
//!
//! # Usage Example
//!
//! A league and two players in one process:
//!
//! ```no_run
//! use std::sync::Arc;
//! use parity_league::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let strategies = StrategyRegistry::builtin();
//!
//!     for (name, strategy, port) in [("alice", "always_even", 8001), ("bob", "counter", 8002)] {
//!         let player = Arc::new(PlayerAgent::new(name, strategies.create(strategy)?));
//!         let listener = bind(&format!("127.0.0.1:{port}")).await?;
//!         tokio::spawn(serve(listener, player_router(player)));
//!     }
//!
//!     let league = Arc::new(League::new(LeagueConfig::new().with_rounds(2)));
//!     league.register(AgentRecord::new("alice", "1.0.0", "http://127.0.0.1:8001/mcp"));
//!     league.register(AgentRecord::new("bob", "1.0.0", "http://127.0.0.1:8002/mcp"));
//!
//!     league.start()?;
//!     league.wait_until_completed().await;
//!     for row in league.standings().standings {
//!         println!("{}. {} {} pts", row.rank, row.agent, row.points);
//!     }
//!     Ok(())
//! }
//! ```
#![warn(missing_docs)]

pub use anyhow;
pub mod agent;
pub mod client;
pub mod configuration;
pub mod error;
pub mod game;
pub mod jsonrpc;
pub mod league;
pub mod logger;
pub mod match_runner;
pub mod persistence;
pub mod player;
pub mod registration;
pub mod registry;
pub mod server;
pub mod standings;
pub mod strategy;
mod tournament_scheduler;
pub mod tournament_strategy;

/// Commonly used types and traits for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use parity_league::prelude::*;
/// ```
pub mod prelude {
    pub use crate::agent::{AgentRecord, AgentRole};
    pub use crate::configuration::{LeagueConfig, LogConfig, MatchTimeouts, PlayerConfig, RefereeConfig};
    pub use crate::game::{Choice, Parity};
    pub use crate::league::{League, LeaguePhase};
    pub use crate::match_runner::{MatchReferee, MatchResult, Referee, RefereeService, RemoteReferee};
    pub use crate::player::PlayerAgent;
    pub use crate::server::{bind, league_router, player_router, referee_router, serve};
    pub use crate::strategy::{ParityStrategy, StrategyRegistry};
    pub use crate::tournament_strategy::*;
}
