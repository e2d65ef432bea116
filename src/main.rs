use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hand_pipeline::config::SourceConfig;
use hand_pipeline::report::Reporter;
use hand_pipeline::store::JsonFileSink;
use hand_pipeline::web::{self, AppState};
use hand_pipeline::{Pipeline, PipelineConfig, RuleSet, Scheduler, Shutdown, SnapshotStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "hand-pipeline",
    version,
    about = "Hand history ingestion, action classification and materialized stats",
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pipeline config file (.yaml, .yml or .json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Rule file to use instead of the built-in rules
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Disable ANSI colors in CLI output
    #[arg(long = "no-color", global = true, default_value_t = false)]
    no_color: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run cycles on a schedule until interrupted
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Seconds between the end of a cycle and the next one
        #[arg(long)]
        interval: Option<u64>,

        /// Also serve the read API on this address (HOST:PORT)
        #[arg(long)]
        serve: Option<SocketAddr>,
    },
    /// Run a single cycle and print the results
    Once {
        #[command(flatten)]
        source: SourceArgs,

        /// Leaderboard rows to print
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Validate a rule file and list its rules in evaluation order
    Rules,
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// Directory of JSON hand records
    #[arg(long, conflicts_with = "synthetic")]
    hands_dir: Option<PathBuf>,

    /// Generate this many synthetic hands per cycle
    #[arg(long)]
    synthetic: Option<usize>,

    /// Seed for synthetic hands
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

impl SourceArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(path) = &self.hands_dir {
            config.source = SourceConfig::JsonDir { path: path.clone() };
        } else if let Some(hands) = self.synthetic {
            config.source = SourceConfig::Synthetic {
                seed: self.seed,
                hands_per_cycle: hands,
            };
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = color_eyre::install();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(rules) = &cli.rules {
        config.rules_path = Some(rules.clone());
    }
    let reporter = Reporter::new(cli.no_color);

    match cli.command {
        Commands::Run {
            source,
            interval,
            serve,
        } => {
            source.apply(&mut config);
            if let Some(secs) = interval {
                config.interval = Duration::from_secs(secs);
            }
            run_scheduler(config, serve).await
        }
        Commands::Once { source, top } => {
            source.apply(&mut config);
            run_once(config, reporter, top).await
        }
        Commands::Rules => {
            let rules = config.rules().context("loading rule set")?;
            reporter.print_rules(&rules);
            Ok(())
        }
    }
}

async fn build_pipeline(config: &PipelineConfig) -> Result<Pipeline> {
    let rules: RuleSet = config.rules().context("loading rule set")?;
    let intentions = config.intentions().context("loading intention table")?;
    let scorer = config.scorer().context("loading preflop range")?;
    let snapshots = Arc::new(SnapshotStore::new());
    let mut pipeline = Pipeline::new(config.source.build(), Arc::new(rules))
        .with_intentions(Arc::new(intentions))
        .with_scorer(scorer)
        .with_materializer(config.materializer())
        .with_snapshots(Arc::clone(&snapshots));

    if let Some(path) = &config.snapshot_path {
        let sink = JsonFileSink::new(path);
        if let Some(previous) = sink
            .load()
            .await
            .with_context(|| format!("reading snapshot {}", path.display()))?
        {
            let generation = snapshots.publish(previous);
            info!(path = %path.display(), generation, "restored previous snapshot");
        }
        pipeline = pipeline.with_sink(Arc::new(sink));
    }
    if let Some(workers) = config.workers {
        pipeline = pipeline.with_workers(workers)?;
    }
    Ok(pipeline)
}

async fn run_once(config: PipelineConfig, reporter: Reporter, top: usize) -> Result<()> {
    let pipeline = build_pipeline(&config).await?;
    let report = pipeline.run_cycle(&Shutdown::new()).await?;
    let snapshots = pipeline.snapshots();
    reporter.print_cycle(&report);
    reporter.print_summary(&snapshots.global_summary());
    reporter.print_leaderboard(&snapshots.leaderboard(top));
    Ok(())
}

async fn run_scheduler(config: PipelineConfig, serve: Option<SocketAddr>) -> Result<()> {
    let pipeline = Arc::new(build_pipeline(&config).await?);
    let snapshots = pipeline.snapshots();
    let scheduler = Arc::new(Scheduler::new(pipeline, config.scheduler()));
    scheduler.start();

    let server_stop = Shutdown::new();
    let server = serve.map(|addr| {
        let state = AppState::new(snapshots).with_scheduler(Arc::clone(&scheduler));
        tokio::spawn(web::serve(addr, state, server_stop.clone()))
    });

    tokio::signal::ctrl_c()
        .await
        .context("waiting for interrupt signal")?;
    info!("interrupt received, stopping");
    scheduler.stop().await;
    server_stop.trigger();
    if let Some(server) = server {
        server.await.context("web server task")??;
    }
    Ok(())
}
