//! Config for the league, player and referee processes
//!
//! Each role has its own configuration type, created programmatically with `new()` (defaults)
//! or read from environment variables with `from_env()`, then adjusted with the `with_*`
//! builders. The CLI applies its flags on top of `from_env()`.
//!
//! # Environment Variables
//!
//! All values are optional. Flags are case-insensitive; set them to `"true"` to enable.
//! Values that fail to parse fall back to the default.
//!
//! League:
//! - `LEAGUE_HOST` — Bind address (default: `127.0.0.1`)
//! - `LEAGUE_PORT` — Port (default: `9000`)
//! - `ROUNDS` — Number of round-robin rounds (default: `3`)
//! - `USE_EXTERNAL_REFEREE` — Delegate matches to a registered referee (default: `false`)
//! - `MAX_CONCURRENT_MATCHES` — Matches running at the same time (default: `4`)
//! - `LEAGUE_VERBOSE` — Print one line per finished match (default: `false`)
//! - `LEAGUE_DATA_DIR` — Directory for match results and standings (default: none)
//!
//! Match timeouts, in seconds (league and referee):
//! - `INVITATION_TIMEOUT_SECS` (default: `5`)
//! - `CHOICE_TIMEOUT_SECS` (default: `30`)
//! - `NOTIFICATION_TIMEOUT_SECS` (default: `10`)
//!
//! Player and referee:
//! - `HOST` — Bind address (default: `127.0.0.1`)
//! - `PORT` — Player port (default: `8001`)
//! - `REFEREE_PORT` — Referee port (default: `8100`)
//! - `DISPLAY_NAME` — Name used in the league
//! - `LEAGUE_URL` — Base URL of the league manager (default: `http://127.0.0.1:9000`)
//! - `VERSION` — Advertised version (default: `1.0.0`)
//! - `STRATEGY` — Player strategy name (default: `random`)
//!
//! Logging:
//! - `LOG_LEVEL` — Default level when `RUST_LOG` is unset (default: `info`)
//! - `LOG_TO_FILE` — Write logs to a timestamped file instead of stdout (default: `false`)

use std::{path::PathBuf, str::FromStr, time::Duration};

use tracing::warn;

use crate::agent::AgentRecord;

fn get_env_flag(var: &str, default: bool) -> bool {
    match std::env::var(var) {
        Ok(val) => val.eq_ignore_ascii_case("true"),
        Err(_) => default,
    }
}

fn get_env<T: FromStr>(var: &str, default: T) -> T {
    match std::env::var(var) {
        Ok(val) => val.trim().parse().unwrap_or_else(|_| {
            warn!("ignoring invalid value '{val}' for {var}");
            default
        }),
        Err(_) => default,
    }
}

fn get_env_string(var: &str, default: &str) -> String {
    std::env::var(var)
        .ok()
        .filter(|val| !val.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

const DEFAULT_LEAGUE_URL: &str = "http://127.0.0.1:9000";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_VERSION: &str = "1.0.0";

/// Host to advertise to peers for a server bound on `host`.
fn advertised_host(host: &str) -> &str {
    match host {
        "0.0.0.0" | "::" | "[::]" => DEFAULT_HOST,
        other => other,
    }
}

/// Per-call timeouts used by referees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchTimeouts {
    pub(crate) invitation: Duration,
    pub(crate) choice: Duration,
    pub(crate) notification: Duration,
}

impl MatchTimeouts {
    const REMOTE_SLACK: Duration = Duration::from_secs(5);

    /// 5 s for invitations, 30 s for choices, 10 s for notifications.
    pub fn new() -> Self {
        Self {
            invitation: Duration::from_secs(5),
            choice: Duration::from_secs(30),
            notification: Duration::from_secs(10),
        }
    }

    /// The same timeout for every call.
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            invitation: timeout,
            choice: timeout,
            notification: timeout,
        }
    }

    /// Read `INVITATION_TIMEOUT_SECS`, `CHOICE_TIMEOUT_SECS` and `NOTIFICATION_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let defaults = Self::new();
        Self {
            invitation: Duration::from_secs(get_env(
                "INVITATION_TIMEOUT_SECS",
                defaults.invitation.as_secs(),
            )),
            choice: Duration::from_secs(get_env("CHOICE_TIMEOUT_SECS", defaults.choice.as_secs())),
            notification: Duration::from_secs(get_env(
                "NOTIFICATION_TIMEOUT_SECS",
                defaults.notification.as_secs(),
            )),
        }
    }

    #[allow(missing_docs)]
    pub fn with_invitation(mut self, value: Duration) -> Self {
        self.invitation = value;
        self
    }

    #[allow(missing_docs)]
    pub fn with_choice(mut self, value: Duration) -> Self {
        self.choice = value;
        self
    }

    #[allow(missing_docs)]
    pub fn with_notification(mut self, value: Duration) -> Self {
        self.notification = value;
        self
    }

    #[allow(missing_docs)]
    pub fn invitation(&self) -> Duration {
        self.invitation
    }

    #[allow(missing_docs)]
    pub fn choice(&self) -> Duration {
        self.choice
    }

    #[allow(missing_docs)]
    pub fn notification(&self) -> Duration {
        self.notification
    }

    /// Upper bound for a whole match run by a remote referee: two calls of each kind plus
    /// some slack.
    pub fn match_budget(&self) -> Duration {
        (self.invitation + self.choice + self.notification) * 2 + Self::REMOTE_SLACK
    }
}

impl Default for MatchTimeouts {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration of the league manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeagueConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) rounds: u32,
    pub(crate) use_external_referee: bool,
    pub(crate) max_concurrent_matches: usize,
    pub(crate) verbose: bool,
    pub(crate) data_dir: Option<PathBuf>,
    pub(crate) timeouts: MatchTimeouts,
}

impl LeagueConfig {
    /// Create a configuration with default parameters.
    ///
    /// By default:
    /// - The league listens on `127.0.0.1:9000`.
    /// - Each pair of players meets 3 times.
    /// - Matches are run by the embedded referee, at most 4 at a time.
    /// - Nothing is printed per match and nothing is written to disk.
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: 9000,
            rounds: 3,
            use_external_referee: false,
            max_concurrent_matches: 4,
            verbose: false,
            data_dir: None,
            timeouts: MatchTimeouts::new(),
        }
    }

    /// Create configuration from environment variables (see module documentation).
    pub fn from_env() -> Self {
        let defaults = Self::new();
        Self {
            host: get_env_string("LEAGUE_HOST", &defaults.host),
            port: get_env("LEAGUE_PORT", defaults.port),
            rounds: get_env("ROUNDS", defaults.rounds),
            use_external_referee: get_env_flag("USE_EXTERNAL_REFEREE", false),
            max_concurrent_matches: get_env(
                "MAX_CONCURRENT_MATCHES",
                defaults.max_concurrent_matches,
            ),
            verbose: get_env_flag("LEAGUE_VERBOSE", false),
            data_dir: std::env::var_os("LEAGUE_DATA_DIR").map(PathBuf::from),
            timeouts: MatchTimeouts::from_env(),
        }
    }

    #[allow(missing_docs)]
    pub fn with_host(mut self, value: impl Into<String>) -> Self {
        self.host = value.into();
        self
    }

    #[allow(missing_docs)]
    pub fn with_port(mut self, value: u16) -> Self {
        self.port = value;
        self
    }

    /// Number of times each pair of players meets.
    pub fn with_rounds(mut self, value: u32) -> Self {
        self.rounds = value;
        self
    }

    /// Delegate matches to the registered referee, when there is one at start time.
    pub fn with_use_external_referee(mut self, value: bool) -> Self {
        self.use_external_referee = value;
        self
    }

    /// Zero is treated as one.
    pub fn with_max_concurrent_matches(mut self, value: usize) -> Self {
        self.max_concurrent_matches = value;
        self
    }

    /// Print one colored line per finished match.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Write every result and the standings under `dir`.
    pub fn with_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.data_dir = dir;
        self
    }

    #[allow(missing_docs)]
    pub fn with_timeouts(mut self, value: MatchTimeouts) -> Self {
        self.timeouts = value;
        self
    }

    /// `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[allow(missing_docs)]
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    #[allow(missing_docs)]
    pub fn max_concurrent_matches(&self) -> usize {
        self.max_concurrent_matches.max(1)
    }

    #[allow(missing_docs)]
    pub fn data_dir(&self) -> Option<&PathBuf> {
        self.data_dir.as_ref()
    }

    #[allow(missing_docs)]
    pub fn timeouts(&self) -> MatchTimeouts {
        self.timeouts
    }
}

impl Default for LeagueConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration of a player process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) display_name: String,
    pub(crate) league_url: String,
    pub(crate) version: String,
    pub(crate) strategy: String,
    pub(crate) register: bool,
}

impl PlayerConfig {
    /// A player on `127.0.0.1:8001` named after its port, using the `random` strategy and
    /// registering with a league on `127.0.0.1:9000`.
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: 8001,
            display_name: "Player-8001".to_string(),
            league_url: DEFAULT_LEAGUE_URL.to_string(),
            version: DEFAULT_VERSION.to_string(),
            strategy: "random".to_string(),
            register: true,
        }
    }

    /// Create configuration from environment variables (see module documentation).
    pub fn from_env() -> Self {
        let defaults = Self::new();
        let port = get_env("PORT", defaults.port);
        Self {
            host: get_env_string("HOST", &defaults.host),
            port,
            display_name: get_env_string("DISPLAY_NAME", &format!("Player-{port}")),
            league_url: get_env_string("LEAGUE_URL", &defaults.league_url),
            version: get_env_string("VERSION", &defaults.version),
            strategy: get_env_string("STRATEGY", &defaults.strategy),
            register: true,
        }
    }

    #[allow(missing_docs)]
    pub fn with_host(mut self, value: impl Into<String>) -> Self {
        self.host = value.into();
        self
    }

    #[allow(missing_docs)]
    pub fn with_port(mut self, value: u16) -> Self {
        self.port = value;
        self
    }

    #[allow(missing_docs)]
    pub fn with_display_name(mut self, value: impl Into<String>) -> Self {
        self.display_name = value.into();
        self
    }

    #[allow(missing_docs)]
    pub fn with_league_url(mut self, value: impl Into<String>) -> Self {
        self.league_url = value.into();
        self
    }

    #[allow(missing_docs)]
    pub fn with_version(mut self, value: impl Into<String>) -> Self {
        self.version = value.into();
        self
    }

    #[allow(missing_docs)]
    pub fn with_strategy(mut self, value: impl Into<String>) -> Self {
        self.strategy = value.into();
        self
    }

    /// Register with the league in the background after startup.
    pub fn with_register(mut self, value: bool) -> Self {
        self.register = value;
        self
    }

    /// `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[allow(missing_docs)]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL under which other agents reach this player.
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}/mcp", advertised_host(&self.host), self.port)
    }

    #[allow(missing_docs)]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[allow(missing_docs)]
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    #[allow(missing_docs)]
    pub fn league_url(&self) -> &str {
        &self.league_url
    }

    #[allow(missing_docs)]
    pub fn should_register(&self) -> bool {
        self.register
    }

    /// How this player registers with the league.
    pub fn record(&self) -> AgentRecord {
        AgentRecord::new(&self.display_name, &self.version, self.endpoint())
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration of a standalone referee process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefereeConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) display_name: String,
    pub(crate) league_url: String,
    pub(crate) version: String,
    pub(crate) register: bool,
    pub(crate) timeouts: MatchTimeouts,
}

impl RefereeConfig {
    /// A referee named `Referee` on `127.0.0.1:8100`.
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: 8100,
            display_name: "Referee".to_string(),
            league_url: DEFAULT_LEAGUE_URL.to_string(),
            version: DEFAULT_VERSION.to_string(),
            register: true,
            timeouts: MatchTimeouts::new(),
        }
    }

    /// Create configuration from environment variables (see module documentation).
    pub fn from_env() -> Self {
        let defaults = Self::new();
        Self {
            host: get_env_string("HOST", &defaults.host),
            port: get_env("REFEREE_PORT", defaults.port),
            display_name: get_env_string("DISPLAY_NAME", &defaults.display_name),
            league_url: get_env_string("LEAGUE_URL", &defaults.league_url),
            version: get_env_string("VERSION", &defaults.version),
            register: true,
            timeouts: MatchTimeouts::from_env(),
        }
    }

    #[allow(missing_docs)]
    pub fn with_host(mut self, value: impl Into<String>) -> Self {
        self.host = value.into();
        self
    }

    #[allow(missing_docs)]
    pub fn with_port(mut self, value: u16) -> Self {
        self.port = value;
        self
    }

    #[allow(missing_docs)]
    pub fn with_display_name(mut self, value: impl Into<String>) -> Self {
        self.display_name = value.into();
        self
    }

    #[allow(missing_docs)]
    pub fn with_league_url(mut self, value: impl Into<String>) -> Self {
        self.league_url = value.into();
        self
    }

    /// Register with the league in the background after startup.
    pub fn with_register(mut self, value: bool) -> Self {
        self.register = value;
        self
    }

    #[allow(missing_docs)]
    pub fn with_timeouts(mut self, value: MatchTimeouts) -> Self {
        self.timeouts = value;
        self
    }

    /// `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// URL under which the league reaches this referee.
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}/mcp", advertised_host(&self.host), self.port)
    }

    #[allow(missing_docs)]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[allow(missing_docs)]
    pub fn league_url(&self) -> &str {
        &self.league_url
    }

    #[allow(missing_docs)]
    pub fn should_register(&self) -> bool {
        self.register
    }

    #[allow(missing_docs)]
    pub fn timeouts(&self) -> MatchTimeouts {
        self.timeouts
    }

    /// How this referee registers with the league.
    pub fn record(&self) -> AgentRecord {
        AgentRecord::referee(&self.display_name, &self.version, self.endpoint())
    }
}

impl Default for RefereeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging options shared by every role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub(crate) level: String,
    pub(crate) to_file: bool,
}

impl LogConfig {
    /// `info` level, to stdout.
    pub fn new() -> Self {
        Self {
            level: "info".to_string(),
            to_file: false,
        }
    }

    /// Read `LOG_LEVEL` and `LOG_TO_FILE`.
    pub fn from_env() -> Self {
        Self {
            level: get_env_string("LOG_LEVEL", "info").to_ascii_lowercase(),
            to_file: get_env_flag("LOG_TO_FILE", false),
        }
    }

    /// Level used when `RUST_LOG` is not set.
    pub fn with_level(mut self, value: impl Into<String>) -> Self {
        self.level = value.into();
        self
    }

    /// Enable or disable logging to file.
    pub fn with_to_file(mut self, value: bool) -> Self {
        self.to_file = value;
        self
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod configuration_tests {
    use super::*;

    #[test]
    fn defaults() {
        let league = LeagueConfig::new();
        assert_eq!(league.bind_addr(), "127.0.0.1:9000");
        assert_eq!(league.rounds(), 3);
        assert_eq!(league.max_concurrent_matches(), 4);
        assert_eq!(league.timeouts().choice(), Duration::from_secs(30));

        let player = PlayerConfig::new().with_host("0.0.0.0").with_port(8123);
        assert_eq!(player.bind_addr(), "0.0.0.0:8123");
        assert_eq!(player.endpoint(), "http://127.0.0.1:8123/mcp");

        assert_eq!(player.record().endpoint_url, player.endpoint());

        let referee = RefereeConfig::new();
        assert_eq!(referee.endpoint(), "http://127.0.0.1:8100/mcp");
        assert!(!referee.record().is_player());
    }

    #[test]
    fn zero_concurrency_means_one() {
        assert_eq!(
            LeagueConfig::new()
                .with_max_concurrent_matches(0)
                .max_concurrent_matches(),
            1
        );
    }

    #[test]
    fn remote_budget_covers_every_call() {
        let timeouts = MatchTimeouts::uniform(Duration::from_secs(1));
        assert_eq!(timeouts.match_budget(), Duration::from_secs(11));
    }
}
