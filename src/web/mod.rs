//! Read-only JSON surface over the current snapshot.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::materialize::{GlobalSummary, LeaderboardEntry, PlayerSummary, SnapshotStore};
use crate::scheduler::{Scheduler, SchedulerStatus};
use crate::shutdown::Shutdown;

#[derive(Clone)]
pub struct AppState {
    snapshots: Arc<SnapshotStore>,
    scheduler: Option<Arc<Scheduler>>,
}

impl AppState {
    pub fn new(snapshots: Arc<SnapshotStore>) -> Self {
        Self {
            snapshots,
            scheduler: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SummaryResponse {
    generation: u64,
    published_at: DateTime<Utc>,
    summary: GlobalSummary,
}

#[derive(Debug, Serialize)]
struct TriggerResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, thiserror::Error)]
enum ApiError {
    #[error("player not found")]
    PlayerNotFound,
    #[error("no scheduler attached")]
    NoScheduler,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::PlayerNotFound => StatusCode::NOT_FOUND,
            ApiError::NoScheduler => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

/// Serves until `shutdown` fires.
pub async fn serve(addr: SocketAddr, state: AppState, shutdown: Shutdown) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "serving read api");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.triggered().await })
        .await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/summary", get(summary))
        .route("/leaderboard", get(leaderboard))
        .route("/players/:id", get(player))
        .route("/status", get(status))
        .route("/cycles", post(trigger_cycle));

    Router::new()
        .route("/healthz", get(health))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn summary(State(state): State<AppState>) -> Json<SummaryResponse> {
    let current = state.snapshots.current();
    Json(SummaryResponse {
        generation: current.generation,
        published_at: current.published_at,
        summary: current.snapshot.summary.clone(),
    })
}

async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Json<Vec<LeaderboardEntry>> {
    Json(state.snapshots.leaderboard(query.limit.unwrap_or(usize::MAX)))
}

async fn player(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PlayerSummary>, ApiError> {
    state
        .snapshots
        .player_summary(&id)
        .map(Json)
        .ok_or(ApiError::PlayerNotFound)
}

async fn status(State(state): State<AppState>) -> Result<Json<SchedulerStatus>, ApiError> {
    let scheduler = state.scheduler.as_ref().ok_or(ApiError::NoScheduler)?;
    Ok(Json(scheduler.status()))
}

async fn trigger_cycle(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<TriggerResponse>), ApiError> {
    let scheduler = state.scheduler.as_ref().ok_or(ApiError::NoScheduler)?;
    scheduler.trigger_now();
    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            status: "triggered",
        }),
    ))
}
