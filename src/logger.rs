//! Logging setup.

use std::{fs::File, sync::Arc};

use anyhow::{anyhow, Context};
use time::{
    format_description::{self, parse},
    OffsetDateTime, UtcOffset,
};
use tracing::subscriber::set_global_default;
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter, FmtSubscriber};

use crate::configuration::LogConfig;

/// Install the global subscriber for a process playing `role` (`league`, `player`, ...).
///
/// `RUST_LOG` takes precedence over the configured level. With `to_file`, events go to a
/// timestamped `<date>_<time>_<role>_log.txt` in the current directory instead of stdout.
pub fn init_logger(config: &LogConfig, role: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("invalid log level '{}'", config.level))?;

    let local_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let timer = tracing_subscriber::fmt::time::OffsetTime::new(
        local_offset,
        format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]")?,
    );

    let (writer, ansi) = if config.to_file {
        let file_name = get_log_file_name(role)?;
        let file = File::create(&file_name)
            .with_context(|| format!("could not create log file {file_name}"))?;
        (BoxMakeWriter::new(Arc::new(file)), false)
    } else {
        (BoxMakeWriter::new(std::io::stdout), true)
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_timer(timer)
        .with_writer(writer)
        .finish();

    set_global_default(subscriber).map_err(|_| {
        anyhow!("Could not set global default tracing subscriber. Consider disabling logs if you are already setting a subscriber.")
    })
}

fn get_log_file_name(role: &str) -> anyhow::Result<String> {
    let format = parse("[year]-[month]-[day]_[hour]-[minute]-[second]")?;
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    Ok(format!("{}_{role}_log.txt", now.format(&format)?))
}
