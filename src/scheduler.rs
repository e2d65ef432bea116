//! Drives pipeline cycles: one at a time, spaced from the previous cycle's
//! completion, surviving any failure inside a cycle.
//!
//! ```text
//! Idle -> Running -> Completed --(interval)--> Idle -> Running ...
//!                 \-> Failed ----(backoff)---> Idle -> Running ...
//! any state --stop()--> Stopped
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::pipeline::{CycleReport, Pipeline, PipelineError};
use crate::shutdown::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
    Stopped,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub ingestion_errors: u64,
    pub classification_gaps: u64,
    pub last_error: Option<String>,
    pub last_report: Option<CycleReport>,
    pub next_cycle_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Delay between a completed cycle and the next start.
    pub interval: Duration,
    /// Delay after a failed cycle.
    pub failure_backoff: Duration,
    /// Start the first cycle right away instead of after one interval.
    pub run_immediately: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            failure_backoff: Duration::from_secs(30),
            run_immediately: true,
        }
    }
}

pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    config: SchedulerConfig,
    shutdown: Shutdown,
    trigger: Arc<Notify>,
    status: Arc<watch::Sender<SchedulerStatus>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, config: SchedulerConfig) -> Self {
        let (status, _rx) = watch::channel(SchedulerStatus::default());
        Self {
            pipeline,
            config,
            shutdown: Shutdown::new(),
            trigger: Arc::new(Notify::new()),
            status: Arc::new(status),
            task: Mutex::new(None),
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Spawns the scheduling loop on the current tokio runtime. Returns
    /// `false` if it is already running or was stopped.
    pub fn start(&self) -> bool {
        let mut task = self.task.lock();
        if task.is_some() || self.shutdown.is_triggered() {
            return false;
        }
        let worker = CycleLoop {
            pipeline: Arc::clone(&self.pipeline),
            config: self.config,
            shutdown: self.shutdown.clone(),
            trigger: Arc::clone(&self.trigger),
            status: Arc::clone(&self.status),
        };
        *task = Some(tokio::spawn(worker.run()));
        info!(
            source = self.pipeline.source_name(),
            interval_secs = self.config.interval.as_secs(),
            "scheduler started"
        );
        true
    }

    /// Stops starting new cycles and waits for the in-flight one to reach its
    /// next checkpoint.
    pub async fn stop(&self) {
        self.shutdown.trigger();
        let task = self.task.lock().take();
        if let Some(task) = task
            && let Err(err) = task.await
        {
            error!(error = %err, "scheduler task ended abnormally");
        }
        self.status.send_modify(|s| s.state = SchedulerState::Stopped);
        info!("scheduler stopped");
    }

    /// Requests a cycle now. A request made while a cycle runs starts the
    /// next cycle as soon as the current one finishes.
    pub fn trigger_now(&self) {
        self.trigger.notify_one();
    }

    pub fn status(&self) -> SchedulerStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.subscribe()
    }
}

struct CycleLoop {
    pipeline: Arc<Pipeline>,
    config: SchedulerConfig,
    shutdown: Shutdown,
    trigger: Arc<Notify>,
    status: Arc<watch::Sender<SchedulerStatus>>,
}

impl CycleLoop {
    async fn run(self) {
        let mut delay = if self.config.run_immediately {
            Duration::ZERO
        } else {
            self.config.interval
        };

        loop {
            let next = chrono::Duration::from_std(delay).ok().map(|d| Utc::now() + d);
            self.status.send_modify(|s| s.next_cycle_at = next);

            tokio::select! {
                biased;
                _ = self.shutdown.triggered() => break,
                _ = self.trigger.notified() => debug!("cycle triggered"),
                _ = tokio::time::sleep(delay) => {}
            }

            self.status.send_modify(|s| {
                s.state = SchedulerState::Idle;
                s.next_cycle_at = None;
            });
            if self.shutdown.is_triggered() {
                break;
            }
            self.status.send_modify(|s| s.state = SchedulerState::Running);

            let outcome = AssertUnwindSafe(self.pipeline.run_cycle(&self.shutdown))
                .catch_unwind()
                .await;
            delay = match outcome {
                Ok(Ok(report)) => {
                    self.status.send_modify(|s| {
                        s.state = SchedulerState::Completed;
                        s.cycles_completed += 1;
                        s.ingestion_errors += report.ingestion_errors as u64;
                        s.classification_gaps += report.classification_gaps as u64;
                        s.last_report = Some(report);
                    });
                    self.config.interval
                }
                Ok(Err(PipelineError::Cancelled { stage })) => {
                    info!(stage, "cycle cancelled by shutdown");
                    break;
                }
                Ok(Err(err)) => {
                    error!(error = %err, "cycle failed");
                    self.fail(err.to_string());
                    self.config.failure_backoff
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(panic = %message, "cycle panicked");
                    self.fail(format!("panic: {message}"));
                    self.config.failure_backoff
                }
            };
        }

        self.status.send_modify(|s| {
            s.state = SchedulerState::Stopped;
            s.next_cycle_at = None;
        });
    }

    fn fail(&self, message: String) {
        self.status.send_modify(|s| {
            s.state = SchedulerState::Failed;
            s.cycles_failed += 1;
            s.last_error = Some(message);
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
