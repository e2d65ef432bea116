pub mod analysis;
pub mod cards;
pub mod config;
pub mod context;
pub mod equity;
pub mod hand;
pub mod ingest;
pub mod intention;
pub mod label;
pub mod materialize;
pub mod pipeline;
pub mod report;
pub mod rules;
pub mod scheduler;
pub mod scorer;
pub mod shutdown;
pub mod source;
pub mod store;
pub mod web;

pub use analysis::{ClassifiedAction, analyze_hand};
pub use config::PipelineConfig;
pub use intention::IntentionTable;
pub use label::ActionLabel;
pub use materialize::{AggregateSnapshot, Materializer, SnapshotStore};
pub use pipeline::{CycleReport, Pipeline, PipelineError};
pub use rules::RuleSet;
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerState, SchedulerStatus};
pub use shutdown::Shutdown;
