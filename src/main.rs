//! `parity-league` command line: run a league manager, a player or a standalone referee.
//!
//! Every option falls back to its environment variable (see `configuration`), flags win.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use parity_league::{
    client::RpcClient,
    logger::init_logger,
    persistence::JsonFileSink,
    prelude::*,
    registration::Registration,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "parity-league", version)]
#[command(about = "League of HTTP agents playing the parity game")]
struct Cli {
    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Write logs to a timestamped file instead of stdout
    #[arg(long, global = true)]
    log_to_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the league manager
    League(LeagueArgs),
    /// Run a player
    Player(PlayerArgs),
    /// Run a standalone referee
    Referee(RefereeArgs),
}

impl Command {
    fn role(&self) -> &'static str {
        match self {
            Command::League(_) => "league",
            Command::Player(_) => "player",
            Command::Referee(_) => "referee",
        }
    }
}

#[derive(Args, Debug)]
struct LeagueArgs {
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    /// Number of times each pair of players meets
    #[arg(long)]
    rounds: Option<u32>,
    /// Delegate matches to a registered referee
    #[arg(long)]
    use_external_referee: bool,
    #[arg(long)]
    max_concurrent: Option<usize>,
    /// Print one line per finished match
    #[arg(long)]
    verbose: bool,
    /// Directory for match results and standings
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Start automatically once this many players are registered
    #[arg(long)]
    wait_for: Option<usize>,
}

#[derive(Args, Debug)]
struct PlayerArgs {
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    display_name: Option<String>,
    #[arg(long)]
    league_url: Option<String>,
    /// Version advertised on registration
    #[arg(long = "agent-version")]
    agent_version: Option<String>,
    /// Strategy name, see --list-strategies
    #[arg(long)]
    strategy: Option<String>,
    /// Do not register with the league
    #[arg(long)]
    no_register: bool,
    /// Print the available strategies and exit
    #[arg(long)]
    list_strategies: bool,
}

#[derive(Args, Debug)]
struct RefereeArgs {
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    display_name: Option<String>,
    #[arg(long)]
    league_url: Option<String>,
    #[arg(long)]
    no_register: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env();
    if let Some(level) = &cli.log_level {
        log_config = log_config.with_level(level);
    }
    if cli.log_to_file {
        log_config = log_config.with_to_file(true);
    }
    init_logger(&log_config, cli.command.role())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("could not start the async runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Command::League(args) => run_league(args).await,
            Command::Player(args) => run_player(args).await,
            Command::Referee(args) => run_referee(args).await,
        }
    })
}

async fn run_league(args: LeagueArgs) -> anyhow::Result<()> {
    let mut config = LeagueConfig::from_env();
    if let Some(host) = args.host {
        config = config.with_host(host);
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }
    if let Some(rounds) = args.rounds {
        config = config.with_rounds(rounds);
    }
    if let Some(max) = args.max_concurrent {
        config = config.with_max_concurrent_matches(max);
    }
    if args.use_external_referee {
        config = config.with_use_external_referee(true);
    }
    if args.verbose {
        config = config.with_verbose(true);
    }
    if args.data_dir.is_some() {
        config = config.with_data_dir(args.data_dir);
    }

    let bind_addr = config.bind_addr();
    let data_dir = config.data_dir().cloned();
    let mut league = League::new(config);
    if let Some(dir) = data_dir {
        let sink = JsonFileSink::create(dir).await?;
        info!("recording results under {}", sink.dir().display());
        league = league.with_sink(Arc::new(sink));
    }
    let league = Arc::new(league);

    if let Some(min_players) = args.wait_for {
        tokio::spawn(league.clone().auto_start(min_players, Duration::from_millis(500)));
    }

    let listener = bind(&bind_addr).await?;
    info!("league manager listening on {bind_addr}");
    serve(listener, league_router(league)).await
}

async fn run_player(args: PlayerArgs) -> anyhow::Result<()> {
    let strategies = StrategyRegistry::builtin();
    if args.list_strategies {
        for name in strategies.names() {
            println!("{name}");
        }
        return Ok(());
    }

    let mut config = PlayerConfig::from_env();
    if let Some(host) = args.host {
        config = config.with_host(host);
    }
    if let Some(port) = args.port {
        let renamed = config.display_name() == format!("Player-{}", config.port());
        config = config.with_port(port);
        if renamed {
            config = config.with_display_name(format!("Player-{port}"));
        }
    }
    if let Some(name) = args.display_name {
        config = config.with_display_name(name);
    }
    if let Some(url) = args.league_url {
        config = config.with_league_url(url);
    }
    if let Some(version) = args.agent_version {
        config = config.with_version(version);
    }
    if let Some(strategy) = args.strategy {
        config = config.with_strategy(strategy);
    }
    if args.no_register {
        config = config.with_register(false);
    }

    let strategy = strategies.create(config.strategy())?;
    let player = Arc::new(PlayerAgent::new(config.display_name(), strategy));

    let listener = bind(&config.bind_addr()).await?;
    info!(
        "player {} ({}) listening on {}",
        config.display_name(),
        player.strategy_name(),
        config.endpoint()
    );
    if config.should_register() {
        Registration::new(RpcClient::new(), config.league_url(), config.record()).spawn();
    }
    serve(listener, player_router(player)).await
}

async fn run_referee(args: RefereeArgs) -> anyhow::Result<()> {
    let mut config = RefereeConfig::from_env();
    if let Some(host) = args.host {
        config = config.with_host(host);
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }
    if let Some(name) = args.display_name {
        config = config.with_display_name(name);
    }
    if let Some(url) = args.league_url {
        config = config.with_league_url(url);
    }
    if args.no_register {
        config = config.with_register(false);
    }

    let referee = Referee::new(config.display_name(), RpcClient::new(), config.timeouts());
    let service = Arc::new(RefereeService::new(referee));

    let listener = bind(&config.bind_addr()).await?;
    info!("referee {} listening on {}", config.display_name(), config.endpoint());
    if config.should_register() {
        Registration::new(RpcClient::new(), config.league_url(), config.record()).spawn();
    }
    serve(listener, referee_router(service)).await
}
