use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};

use crate::equity::{PercentileEvaluator, PreflopRange, RangeError};
use crate::intention::{IntentionError, IntentionTable};
use crate::materialize::Materializer;
use crate::rules::{RuleError, RuleSet};
use crate::scheduler::SchedulerConfig;
use crate::scorer::DecisionScorer;
use crate::source::{HandSource, JsonDirSource, SyntheticSource};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported config extension for {0} (expected .yaml, .yml or .json)")]
    Format(PathBuf),
}

/// Where raw hands come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Synthetic { seed: u64, hands_per_cycle: usize },
    JsonDir { path: PathBuf },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Synthetic {
            seed: 42,
            hands_per_cycle: 100,
        }
    }
}

impl SourceConfig {
    pub fn build(&self) -> Arc<dyn HandSource> {
        match self {
            SourceConfig::Synthetic {
                seed,
                hands_per_cycle,
            } => Arc::new(SyntheticSource::new(*seed, *hands_per_cycle)),
            SourceConfig::JsonDir { path } => Arc::new(JsonDirSource::new(path.clone())),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Pause between the end of one cycle and the start of the next.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub interval: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub failure_backoff: Duration,
    pub leaderboard_size: usize,
    /// Players need more hands than this to appear on the leaderboard.
    pub leaderboard_min_hands: u64,
    /// Rule file; the built-in rules when unset.
    pub rules_path: Option<PathBuf>,
    /// Intention table; the built-in table when unset.
    pub intentions_path: Option<PathBuf>,
    /// Starting hands strongest first; preflop strength falls back to the
    /// Chen formula for hands it does not list, or when unset.
    pub preflop_range_path: Option<PathBuf>,
    /// JSON file each published snapshot is written to.
    pub snapshot_path: Option<PathBuf>,
    /// Classification threads; rayon's default when unset.
    pub workers: Option<usize>,
    pub source: SourceConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            failure_backoff: Duration::from_secs(30),
            leaderboard_size: 25,
            leaderboard_min_hands: 10,
            rules_path: None,
            intentions_path: None,
            preflop_range_path: None,
            snapshot_path: None,
            workers: None,
            source: SourceConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Reads a `.yaml`/`.yml` or `.json` file. Missing fields keep defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Ok(serde_yaml::from_str(&text)?),
            Some("json") => Ok(serde_json::from_str(&text)?),
            _ => Err(ConfigError::Format(path.to_path_buf())),
        }
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: self.interval,
            failure_backoff: self.failure_backoff,
            run_immediately: true,
        }
    }

    pub fn materializer(&self) -> Materializer {
        Materializer::new(self.leaderboard_size, self.leaderboard_min_hands)
    }

    pub fn rules(&self) -> Result<RuleSet, RuleError> {
        match &self.rules_path {
            Some(path) => RuleSet::load(path),
            None => RuleSet::embedded(),
        }
    }

    pub fn scorer(&self) -> Result<DecisionScorer, RangeError> {
        let evaluator = match &self.preflop_range_path {
            Some(path) => PercentileEvaluator::with_range(PreflopRange::load(path)?),
            None => PercentileEvaluator::new(),
        };
        Ok(DecisionScorer::new(Arc::new(evaluator)))
    }

    pub fn intentions(&self) -> Result<IntentionTable, IntentionError> {
        match &self.intentions_path {
            Some(path) => IntentionTable::load(path),
            None => IntentionTable::embedded(),
        }
    }
}
