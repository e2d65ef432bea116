mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{three_handed, ts};
use hand_pipeline::hand::{HandRecord, Street};
use hand_pipeline::materialize::AggregateSnapshot;
use hand_pipeline::source::{FetchBatch, HandSource, JsonDirSource, SourceError, SyntheticSource};
use hand_pipeline::store::{JsonFileSink, SnapshotSink, StoreError};
use hand_pipeline::{Pipeline, PipelineError, RuleSet, Shutdown};
use parking_lot::Mutex;

/// Returns the same batch on every fetch and records the watermark it was given.
struct FixedSource {
    batch: FetchBatch,
    seen_since: Mutex<Vec<Option<DateTime<Utc>>>>,
}

impl FixedSource {
    fn new(records: Vec<HandRecord>, malformed: usize) -> Self {
        Self {
            batch: FetchBatch { records, malformed },
            seen_since: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl HandSource for FixedSource {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn fetch_since(&self, since: Option<DateTime<Utc>>) -> Result<FetchBatch, SourceError> {
        self.seen_since.lock().push(since);
        Ok(self.batch.clone())
    }
}

/// Accepts the first `ok` snapshots, then fails.
struct FlakySink {
    ok: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl SnapshotSink for FlakySink {
    async fn persist(&self, _snapshot: &AggregateSnapshot) -> Result<(), StoreError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.ok {
            Ok(())
        } else {
            Err(StoreError::Backend("disk full".into()))
        }
    }
}

fn rules() -> Arc<RuleSet> {
    Arc::new(RuleSet::embedded().unwrap())
}

fn hands(count: i64) -> Vec<HandRecord> {
    (1..=count)
        .map(|i| {
            let mut hand = three_handed(
                &format!("h{i}"),
                &[
                    (Street::Preflop, "", &["r250", "f", "c"]),
                    (Street::Flop, "9d8c3s", &["x", "b200", "f"]),
                ],
            );
            hand.timestamp = ts(i);
            hand
        })
        .collect()
}

#[tokio::test]
async fn synthetic_cycle_materializes_every_hand() {
    let pipeline = Pipeline::new(Arc::new(SyntheticSource::new(42, 100)), rules());
    let report = pipeline.run_cycle(&Shutdown::new()).await.unwrap();

    assert_eq!(report.fetched, 100);
    assert_eq!(report.hands_added, 100);
    assert_eq!(report.hands_stored, 100);
    assert_eq!(report.ingestion_errors, 0);
    assert_eq!(report.classification_gaps, 0);
    assert_eq!(report.unscored, 0);
    assert_eq!(report.generation, 1);
    assert!(report.classified > 0 && report.classified < report.actions);

    let current = pipeline.snapshots().current();
    let summary = &current.snapshot.summary;
    assert_eq!(summary.distinct_hands, 100);
    assert_eq!(summary.total_actions, report.actions as u64);
    assert_eq!(
        summary.total_hands,
        current.snapshot.players.values().map(|p| p.hands).sum::<u64>()
    );

    let next = pipeline.run_cycle(&Shutdown::new()).await.unwrap();
    assert_eq!(next.hands_added, 100);
    assert_eq!(next.hands_stored, 200);
    assert_eq!(pipeline.snapshots().global_summary().distinct_hands, 200);
}

#[tokio::test]
async fn dedicated_worker_pool_gives_the_same_snapshot() {
    let shared = Pipeline::new(Arc::new(SyntheticSource::new(9, 60)), rules());
    let pooled = Pipeline::new(Arc::new(SyntheticSource::new(9, 60)), rules())
        .with_workers(2)
        .unwrap();
    shared.run_cycle(&Shutdown::new()).await.unwrap();
    pooled.run_cycle(&Shutdown::new()).await.unwrap();

    assert_eq!(
        serde_json::to_string(&shared.snapshots().current().snapshot).unwrap(),
        serde_json::to_string(&pooled.snapshots().current().snapshot).unwrap()
    );
}

#[tokio::test]
async fn already_seen_hands_are_skipped() {
    let mut records = hands(3);
    records.push(records[0].clone());
    let source = Arc::new(FixedSource::new(records, 0));
    let pipeline = Pipeline::new(source.clone(), rules());

    let first = pipeline.run_cycle(&Shutdown::new()).await.unwrap();
    assert_eq!((first.fetched, first.duplicates, first.hands_added), (4, 1, 3));
    let before = pipeline.snapshots().current();

    let second = pipeline.run_cycle(&Shutdown::new()).await.unwrap();
    assert_eq!((second.duplicates, second.hands_added, second.actions), (4, 0, 0));
    assert_eq!(second.hands_stored, 3);
    assert_eq!(second.generation, 2);
    assert_eq!(pipeline.snapshots().current().snapshot, before.snapshot);

    assert_eq!(*source.seen_since.lock(), [None, Some(ts(3))]);
}

#[tokio::test]
async fn late_files_with_older_hands_are_picked_up() {
    let dir = tempfile::tempdir().unwrap();
    let write = |file: &str, hand_id: &str, at: i64| {
        let mut hand = three_handed(hand_id, &[(Street::Preflop, "", &["r250", "f", "c"])]);
        hand.timestamp = ts(at);
        std::fs::write(dir.path().join(file), serde_json::to_string(&hand).unwrap()).unwrap();
    };
    let pipeline = Pipeline::new(Arc::new(JsonDirSource::new(dir.path())), rules());

    write("a.json", "a", 100);
    let first = pipeline.run_cycle(&Shutdown::new()).await.unwrap();
    assert_eq!(first.hands_added, 1);

    write("b.json", "b", 100);
    write("c.json", "c", 50);
    let second = pipeline.run_cycle(&Shutdown::new()).await.unwrap();
    assert_eq!(
        (second.fetched, second.duplicates, second.hands_added, second.hands_stored),
        (3, 1, 2, 3)
    );
    assert_eq!(pipeline.snapshots().global_summary().distinct_hands, 3);
}

#[tokio::test]
async fn malformed_hands_are_counted_and_skipped() {
    let mut records = hands(2);
    records[1].blinds = None;
    let pipeline = Pipeline::new(Arc::new(FixedSource::new(records, 2)), rules());

    let report = pipeline.run_cycle(&Shutdown::new()).await.unwrap();
    assert_eq!(report.ingestion_errors, 3);
    assert_eq!(report.hands_added, 1);
    assert_eq!(pipeline.snapshots().global_summary().distinct_hands, 1);
}

#[tokio::test]
async fn failed_persist_keeps_the_previous_snapshot() {
    let source = Arc::new(FixedSource::new(hands(2), 0));
    let pipeline = Pipeline::new(source.clone(), rules()).with_sink(Arc::new(FlakySink {
        ok: 1,
        calls: AtomicUsize::new(0),
    }));

    pipeline.run_cycle(&Shutdown::new()).await.unwrap();
    let published = pipeline.snapshots().current();

    let err = pipeline.run_cycle(&Shutdown::new()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Store(StoreError::Backend(_))));
    assert_eq!(pipeline.snapshots().generation(), 1);
    assert!(Arc::ptr_eq(&published, &pipeline.snapshots().current()));

    let _ = pipeline.run_cycle(&Shutdown::new()).await;
    assert_eq!(*source.seen_since.lock(), [None, Some(ts(2)), Some(ts(2))]);
}

#[tokio::test]
async fn cancelled_cycle_does_not_publish() {
    let shutdown = Shutdown::new();
    shutdown.trigger();
    let pipeline = Pipeline::new(Arc::new(FixedSource::new(hands(2), 0)), rules());

    let err = pipeline.run_cycle(&shutdown).await.unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled { stage: "fetch" }));
    assert_eq!(pipeline.snapshots().generation(), 0);

    let report = pipeline.run_cycle(&Shutdown::new()).await.unwrap();
    assert_eq!(report.hands_added, 2);
}

#[tokio::test]
async fn json_sink_persists_each_published_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("snapshot.json");
    let sink = JsonFileSink::new(&path);
    assert!(sink.load().await.unwrap().is_none());

    let pipeline = Pipeline::new(Arc::new(FixedSource::new(hands(4), 0)), rules())
        .with_sink(Arc::new(sink.clone()));
    pipeline.run_cycle(&Shutdown::new()).await.unwrap();

    let stored = sink.load().await.unwrap().unwrap();
    let current = pipeline.snapshots().current();
    assert_eq!(stored.summary.distinct_hands, 4);
    assert_eq!(stored.summary.total_hands, current.snapshot.summary.total_hands);
    assert_eq!(
        stored.players.keys().collect::<Vec<_>>(),
        current.snapshot.players.keys().collect::<Vec<_>>()
    );
    assert!(!path.with_extension("json.tmp").exists());
}
