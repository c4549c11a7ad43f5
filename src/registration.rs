//! Background registration of players and referees with the league manager.
//!
//! The first attempt is immediate. After a failure the next attempt waits 1 s, then 2, 4, 8,
//! 16, and 30 s for every attempt after that, until the league acknowledges.

use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::{agent::AgentRecord, client::RpcClient, registry::RegisterAck};

/// Exponential backoff state: doubles from `initial` up to `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    /// Starts at 1 s, capped at 30 s.
    pub fn new() -> Self {
        Self::with_bounds(Duration::from_secs(1), Duration::from_secs(30))
    }

    #[allow(missing_docs)]
    pub fn with_bounds(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial.min(max),
            max,
        }
    }

    /// Delay before the next attempt; doubles the following one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Registers one agent with the league at `league_url`.
#[derive(Debug, Clone)]
pub struct Registration {
    client: RpcClient,
    url: String,
    record: AgentRecord,
    backoff: Backoff,
}

impl Registration {
    const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

    /// `league_url` is the base URL of the league (e.g. `http://127.0.0.1:9000`).
    pub fn new(client: RpcClient, league_url: &str, record: AgentRecord) -> Self {
        Self {
            client,
            url: format!("{}/register", league_url.trim_end_matches('/')),
            record,
            backoff: Backoff::new(),
        }
    }

    /// Use another backoff schedule.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// One attempt.
    pub async fn register_once(&self) -> anyhow::Result<RegisterAck> {
        let response = self
            .client
            .http()
            .post(&self.url)
            .json(&self.record)
            .timeout(Self::ATTEMPT_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("could not reach {}", self.url))?
            .error_for_status()?;
        let ack = response
            .json::<RegisterAck>()
            .await
            .context("malformed registration acknowledgment")?;
        Ok(ack)
    }

    /// Retry until the league acknowledges.
    #[instrument(skip_all, fields(agent = %self.record.display_name, url = %self.url))]
    pub async fn run(mut self) -> RegisterAck {
        let mut attempt = 1u32;
        loop {
            match self.register_once().await {
                Ok(ack) => {
                    info!(agent_id = %ack.agent_id, attempt, "registered with the league");
                    return ack;
                }
                Err(err) => {
                    let delay = self.backoff.next_delay();
                    warn!(attempt, "registration failed: {err:#}; retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Run in the background.
    pub fn spawn(self) -> JoinHandle<RegisterAck> {
        tokio::spawn(self.run())
    }
}
