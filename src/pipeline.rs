//! One ingest → classify → score → materialize cycle.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::{ClassifiedAction, HandAnalysis, analyze_hand};
use crate::hand::HandRecord;
use crate::ingest::{IngestError, ingest};
use crate::intention::IntentionTable;
use crate::materialize::{Materializer, SnapshotBuilder, SnapshotStore};
use crate::rules::RuleSet;
use crate::scorer::DecisionScorer;
use crate::shutdown::Shutdown;
use crate::source::{HandSource, SourceError};
use crate::store::{ActionStore, MemoryStore, NullSink, SnapshotSink, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("fetching hands failed: {0}")]
    Source(#[from] SourceError),
    #[error("persistence failed: {0}")]
    Store(#[from] StoreError),
    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
    #[error("could not build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("cycle cancelled after {stage}")]
    Cancelled { stage: &'static str },
}

/// What one completed cycle did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub fetched: usize,
    pub duplicates: usize,
    pub ingestion_errors: usize,
    pub hands_added: usize,
    pub actions: usize,
    pub classified: usize,
    pub unscored: usize,
    pub classification_gaps: usize,
    pub hands_stored: usize,
    pub generation: u64,
    pub elapsed_ms: u64,
}

enum HandOutcome {
    Analyzed(HandAnalysis),
    Malformed { hand_id: String, error: IngestError },
    Skipped,
}

struct BatchOutcome {
    analyses: Vec<HandAnalysis>,
    malformed: usize,
    cancelled: bool,
}

/// Owns the collaborators of a cycle. Rules, intentions, scorer and stores
/// are shared read-only with the worker threads.
pub struct Pipeline {
    source: Arc<dyn HandSource>,
    rules: Arc<RuleSet>,
    intentions: Arc<IntentionTable>,
    scorer: DecisionScorer,
    materializer: Materializer,
    store: Arc<dyn ActionStore>,
    sink: Arc<dyn SnapshotSink>,
    snapshots: Arc<SnapshotStore>,
    workers: Option<Arc<rayon::ThreadPool>>,
    watermark: Mutex<Option<DateTime<Utc>>>,
}

impl Pipeline {
    pub fn new(source: Arc<dyn HandSource>, rules: Arc<RuleSet>) -> Self {
        Self {
            source,
            rules,
            intentions: Arc::new(IntentionTable::default()),
            scorer: DecisionScorer::default(),
            materializer: Materializer::default(),
            store: Arc::new(MemoryStore::new()),
            sink: Arc::new(NullSink),
            snapshots: Arc::new(SnapshotStore::new()),
            workers: None,
            watermark: Mutex::new(None),
        }
    }

    /// Intention lookup; without one every bet and raise gets the
    /// `{label}-{band}-{size}` fallback.
    pub fn with_intentions(mut self, intentions: Arc<IntentionTable>) -> Self {
        self.intentions = intentions;
        self
    }

    pub fn with_scorer(mut self, scorer: DecisionScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_materializer(mut self, materializer: Materializer) -> Self {
        self.materializer = materializer;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ActionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_snapshots(mut self, snapshots: Arc<SnapshotStore>) -> Self {
        self.snapshots = snapshots;
        self
    }

    /// Dedicated rayon pool for classification; the global pool otherwise.
    pub fn with_workers(mut self, threads: usize) -> Result<Self, PipelineError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("classify-{i}"))
            .build()?;
        self.workers = Some(Arc::new(pool));
        Ok(self)
    }

    pub fn snapshots(&self) -> Arc<SnapshotStore> {
        Arc::clone(&self.snapshots)
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Runs one cycle. The snapshot is swapped only after the new one has
    /// been built and persisted; any error leaves the previous one in place.
    pub async fn run_cycle(&self, shutdown: &Shutdown) -> Result<CycleReport, PipelineError> {
        let started = Instant::now();
        let cycle_id = Uuid::new_v4();
        let since = *self.watermark.lock();

        let batch = self.source.fetch_since(since).await?;
        checkpoint(shutdown, "fetch")?;
        let fetched = batch.records.len();
        let newest = batch.records.iter().map(|r| r.timestamp).max();
        debug!(%cycle_id, source = self.source.name(), fetched, "fetched hands");

        let mut seen = HashSet::new();
        let mut fresh = Vec::with_capacity(fetched);
        let mut duplicates = 0;
        for record in batch.records {
            if !seen.insert(record.hand_id.clone()) || self.store.contains_hand(&record.hand_id)? {
                duplicates += 1;
            } else {
                fresh.push(record);
            }
        }

        let outcome = {
            let rules = Arc::clone(&self.rules);
            let intentions = Arc::clone(&self.intentions);
            let scorer = self.scorer.clone();
            let workers = self.workers.clone();
            let shutdown = shutdown.clone();
            tokio::task::spawn_blocking(move || {
                analyze_batch(fresh, &rules, &intentions, &scorer, workers.as_deref(), &shutdown)
            })
            .await?
        };
        if outcome.cancelled {
            return Err(PipelineError::Cancelled { stage: "classify" });
        }

        let ingestion_errors = batch.malformed + outcome.malformed;
        let actions: usize = outcome.analyses.iter().map(|h| h.actions.len()).sum();
        let classified = outcome
            .analyses
            .iter()
            .flat_map(|h| &h.actions)
            .filter(|a| a.label.is_some())
            .count();
        let unscored = outcome
            .analyses
            .iter()
            .flat_map(|h| &h.actions)
            .filter(|a| !a.score.is_scored())
            .count();
        let classification_gaps = outcome.analyses.iter().map(|h| h.gaps).sum();

        let hands_added = self.store.commit(outcome.analyses)?;
        checkpoint(shutdown, "commit")?;

        let snapshot = {
            let store = Arc::clone(&self.store);
            let materializer = self.materializer;
            tokio::task::spawn_blocking(move || -> Result<_, StoreError> {
                let mut builder = SnapshotBuilder::new();
                store.for_each(&mut |action: &ClassifiedAction| builder.push(action))?;
                Ok(builder.finish(materializer.leaderboard_size, materializer.min_hands))
            })
            .await??
        };
        checkpoint(shutdown, "materialize")?;

        self.sink.persist(&snapshot).await?;
        let generation = self.snapshots.publish(snapshot);

        if let Some(newest) = newest {
            let mut watermark = self.watermark.lock();
            *watermark = Some(watermark.map_or(newest, |w| w.max(newest)));
        }

        let report = CycleReport {
            cycle_id,
            fetched,
            duplicates,
            ingestion_errors,
            hands_added,
            actions,
            classified,
            unscored,
            classification_gaps,
            hands_stored: self.store.hand_count()?,
            generation,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            %cycle_id,
            fetched,
            hands_added,
            ingestion_errors,
            classification_gaps,
            generation,
            elapsed_ms = report.elapsed_ms,
            "cycle complete"
        );
        Ok(report)
    }
}

fn checkpoint(shutdown: &Shutdown, stage: &'static str) -> Result<(), PipelineError> {
    if shutdown.is_triggered() {
        info!(stage, "shutdown requested, stopping cycle");
        return Err(PipelineError::Cancelled { stage });
    }
    Ok(())
}

fn analyze_batch(
    records: Vec<HandRecord>,
    rules: &RuleSet,
    intentions: &IntentionTable,
    scorer: &DecisionScorer,
    workers: Option<&rayon::ThreadPool>,
    shutdown: &Shutdown,
) -> BatchOutcome {
    let run = || -> Vec<HandOutcome> {
        records
            .par_iter()
            .map(|record| {
                if shutdown.is_triggered() {
                    return HandOutcome::Skipped;
                }
                match ingest(record) {
                    Ok(hand) => HandOutcome::Analyzed(analyze_hand(&hand, rules, scorer, intentions)),
                    Err(error) => HandOutcome::Malformed {
                        hand_id: record.hand_id.clone(),
                        error,
                    },
                }
            })
            .collect()
    };
    let outcomes = match workers {
        Some(pool) => pool.install(run),
        None => run(),
    };

    let mut batch = BatchOutcome {
        analyses: Vec::with_capacity(outcomes.len()),
        malformed: 0,
        cancelled: false,
    };
    for outcome in outcomes {
        match outcome {
            HandOutcome::Analyzed(analysis) => batch.analyses.push(analysis),
            HandOutcome::Malformed { hand_id, error } => {
                warn!(%hand_id, %error, "skipping malformed hand");
                batch.malformed += 1;
            }
            HandOutcome::Skipped => batch.cancelled = true,
        }
    }
    batch
}
