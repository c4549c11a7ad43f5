//! Write-through copy of the league results.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;

use crate::{match_runner::MatchResult, standings::RankedEntry};

/// Receives every recorded result with the standings that follow it.
///
/// Errors are logged by the league and otherwise ignored.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Called once per result, in recording order.
    async fn record(&self, result: &MatchResult, standings: &[RankedEntry]) -> anyhow::Result<()>;
}

/// Appends results to `matches.jsonl` and rewrites `standings.json` in a directory.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    /// File holding one JSON result per line.
    pub const MATCHES_FILE: &'static str = "matches.jsonl";
    /// File holding the latest standings.
    pub const STANDINGS_FILE: &'static str = "standings.json";

    /// Create `dir` if needed.
    pub async fn create(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("could not create data directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    #[allow(missing_docs)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ResultSink for JsonFileSink {
    async fn record(&self, result: &MatchResult, standings: &[RankedEntry]) -> anyhow::Result<()> {
        let matches = self.dir.join(Self::MATCHES_FILE);
        let mut line = serde_json::to_vec(result)?;
        line.push(b'\n');
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&matches)
            .await
            .with_context(|| format!("could not open {}", matches.display()))?;
        file.write_all(&line).await?;
        file.flush().await?;

        // write then rename, so readers never see a partial table
        let target = self.dir.join(Self::STANDINGS_FILE);
        let tmp = self.dir.join(format!("{}.tmp", Self::STANDINGS_FILE));
        let body = serde_json::to_vec_pretty(&json!({ "standings": standings }))?;
        fs::write(&tmp, body)
            .await
            .with_context(|| format!("could not write {}", tmp.display()))?;
        fs::rename(&tmp, &target)
            .await
            .with_context(|| format!("could not replace {}", target.display()))?;

        debug!(match_id = %result.match_id, dir = %self.dir.display(), "result persisted");
        Ok(())
    }
}

#[cfg(test)]
mod persistence_tests {
    use crate::{game::Choice, standings::StandingsTable};

    use super::*;

    #[tokio::test]
    async fn appends_results_and_replaces_standings() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::create(tmp.path().join("data")).await.unwrap();
        let mut table = StandingsTable::new();

        for (i, roll) in [2, 3].into_iter().enumerate() {
            let result = MatchResult::decide(
                format!("r1-m{}", i + 1),
                "g",
                ("alice", Choice::Even),
                ("bob", Choice::Odd),
                roll,
            );
            table.record(&result);
            sink.record(&result, &table.ranked()).await.unwrap();
        }

        let lines = std::fs::read_to_string(sink.dir().join(JsonFileSink::MATCHES_FILE)).unwrap();
        let results = lines
            .lines()
            .map(|l| serde_json::from_str::<MatchResult>(l).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].winner.as_deref(), Some("bob"));

        let standings: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(sink.dir().join(JsonFileSink::STANDINGS_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(standings["standings"][0]["points"], 3);
        assert_eq!(standings["standings"][0]["games_played"], 2);
        assert!(!sink.dir().join("standings.json.tmp").exists());
    }
}
