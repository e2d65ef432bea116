mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::three_handed;
use hand_pipeline::hand::Street;
use hand_pipeline::source::SyntheticSource;
use hand_pipeline::web::{self, AppState};
use hand_pipeline::{
    Materializer, Pipeline, RuleSet, Scheduler, SchedulerConfig, SnapshotStore,
};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

async fn spawn(state: AppState) -> anyhow::Result<(String, tokio::task::JoinHandle<()>)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;
    let app = web::router(state);
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Ok((format!("http://{addr}"), server))
}

fn published_store() -> Arc<SnapshotStore> {
    let actions: Vec<_> = [
        three_handed("h1", &[(Street::Preflop, "", &["r250", "f", "c"])]),
        three_handed("h2", &[(Street::Preflop, "", &["f", "r300", "c"])]),
    ]
    .iter()
    .flat_map(common::classify_record)
    .collect();
    let store = Arc::new(SnapshotStore::new());
    store.publish(Materializer::new(25, 0).rebuild(&actions));
    store
}

#[tokio::test]
async fn read_endpoints_serve_the_current_snapshot() -> anyhow::Result<()> {
    let (base, server) = spawn(AppState::new(published_store())).await?;
    let client = Client::new();

    let health = client.get(format!("{base}/healthz")).send().await?;
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(health.text().await?, "ok");

    let summary: Value = client
        .get(format!("{base}/api/summary"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(summary["generation"], 1);
    assert_eq!(summary["summary"]["distinct_hands"], 2);
    assert_eq!(summary["summary"]["total_players"], 3);

    let board: Value = client
        .get(format!("{base}/api/leaderboard?limit=2"))
        .send()
        .await?
        .json()
        .await?;
    let board = board.as_array().unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0]["rank"], 1);

    let player: Value = client
        .get(format!("{base}/api/players/btn"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(player["name"], "Name btn");
    assert_eq!(player["hands"], 2);
    assert_eq!(player["labels"]["open"], 1);

    let missing = client.get(format!("{base}/api/players/nobody")).send().await?;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(missing.json::<Value>().await?, json!({ "error": "player not found" }));

    server.abort();
    let _ = server.await;
    Ok(())
}

#[tokio::test]
async fn scheduler_endpoints_need_a_scheduler() -> anyhow::Result<()> {
    let (base, server) = spawn(AppState::new(Arc::new(SnapshotStore::new()))).await?;
    let client = Client::new();

    let status = client.get(format!("{base}/api/status")).send().await?;
    assert_eq!(status.status(), StatusCode::SERVICE_UNAVAILABLE);
    let trigger = client.post(format!("{base}/api/cycles")).send().await?;
    assert_eq!(trigger.status(), StatusCode::SERVICE_UNAVAILABLE);

    server.abort();
    let _ = server.await;
    Ok(())
}

#[tokio::test]
async fn triggering_runs_a_cycle() -> anyhow::Result<()> {
    let pipeline = Arc::new(Pipeline::new(
        Arc::new(SyntheticSource::new(4, 10)),
        Arc::new(RuleSet::embedded()?),
    ));
    let snapshots = pipeline.snapshots();
    let scheduler = Arc::new(Scheduler::new(
        pipeline,
        SchedulerConfig {
            interval: Duration::from_secs(3600),
            failure_backoff: Duration::from_secs(3600),
            run_immediately: false,
        },
    ));
    assert!(scheduler.start());
    let state = AppState::new(Arc::clone(&snapshots)).with_scheduler(Arc::clone(&scheduler));
    let (base, server) = spawn(state).await?;
    let client = Client::new();

    let mut updates = scheduler.subscribe();
    let trigger = client.post(format!("{base}/api/cycles")).send().await?;
    assert_eq!(trigger.status(), StatusCode::ACCEPTED);
    assert_eq!(trigger.json::<Value>().await?, json!({ "status": "triggered" }));

    tokio::time::timeout(
        Duration::from_secs(10),
        updates.wait_for(|s| s.cycles_completed == 1),
    )
    .await??;

    let status: Value = client
        .get(format!("{base}/api/status"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(status["cycles_completed"], 1);
    assert_eq!(status["last_report"]["hands_added"], 10);

    let summary: Value = client
        .get(format!("{base}/api/summary"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(summary["generation"], 1);
    assert_eq!(summary["summary"]["distinct_hands"], 10);

    scheduler.stop().await;
    server.abort();
    let _ = server.await;
    Ok(())
}
