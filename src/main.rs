//! Command-line interface for db-mirror
//!
//! # Usage Examples
//!
//! ## Mirroring
//! ```bash
//! # Show whether mirroring and resync are configured (and try connecting)
//! db-mirror status --check
//!
//! # Apply one job payload
//! db-mirror apply --event '{"entity_name":"Account","record_id":{"kind":"text","value":"id-1"},"operation":"destroy"}'
//!
//! # Run a worker over a JSON-lines job file
//! db-mirror worker --input jobs.jsonl --concurrency 8
//! ```
//!
//! ## Full Resync
//! ```bash
//! # One-off
//! db-mirror resync once
//!
//! # Every night at 02:30 until Ctrl+C
//! db-mirror resync schedule --cron "30 2 * * *"
//! ```
//!
//! ## Environment
//! - Mirror target: `DATABASE_MIRROR_URL`, or `MIRROR_DB_HOST` with
//!   `MIRROR_DB_PORT`, `MIRROR_DB_USER`, `MIRROR_DB_PASSWORD`,
//!   `MIRROR_DB_NAME`, `MIRROR_DB_SSLMODE`, `MIRROR_DB_CONNECT_TIMEOUT`
//! - Resync source: `EXTERNAL_DB_URL`
//! - Resync destination: `DATABASE_URL`, or the local config file with
//!   `POSTGRES_USER`, `POSTGRES_PASSWORD`, `DB_HOST`, `DB_PORT`, `POSTGRES_DB`
//! - Resync schedule: `DB_SYNC_SCHEDULE`

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use db_mirror::{MirrorOpts, ResyncOpts};
use db_mirror_postgresql::{JobOutcome, MirrorWorker};
use db_mirror_resync::{ResyncSchedule, ResyncScheduler, SyncOutcome, DEFAULT_SCHEDULE};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "db-mirror")]
#[command(about = "Mirror committed writes to a secondary PostgreSQL database")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report whether mirroring and full resync are configured
    Status {
        /// Also try to connect to the mirror database
        #[arg(long)]
        check: bool,

        #[command(flatten)]
        mirror: MirrorOpts,

        #[command(flatten)]
        resync: ResyncOpts,
    },

    /// Run a single mirror job
    #[command(group(ArgGroup::new("payload").required(true).args(["event", "event_file"])))]
    Apply {
        /// Job payload as JSON
        #[arg(long)]
        event: Option<String>,

        /// File containing the job payload
        #[arg(long, value_name = "PATH")]
        event_file: Option<PathBuf>,

        #[command(flatten)]
        mirror: MirrorOpts,
    },

    /// Consume JSON-lines mirror jobs from a file or stdin
    Worker {
        /// Job file (default: stdin)
        #[arg(long, value_name = "PATH")]
        input: Option<PathBuf>,

        /// Maximum number of jobs in flight
        #[arg(long, default_value = "4", env = "DB_MIRROR_CONCURRENCY")]
        concurrency: usize,

        /// Jobs buffered between the reader and the worker
        #[arg(long, default_value = "1024")]
        queue_capacity: usize,

        #[command(flatten)]
        mirror: MirrorOpts,
    },

    /// Replace the local database with a dump of EXTERNAL_DB_URL
    Resync {
        #[command(subcommand)]
        command: ResyncCommand,
    },
}

#[derive(Subcommand)]
enum ResyncCommand {
    /// Run one full resync
    Once {
        #[command(flatten)]
        opts: ResyncOpts,
    },

    /// Run full resyncs on a cron schedule until Ctrl+C
    Schedule {
        /// Cron expression (5 fields, or 6/7 with seconds/year)
        #[arg(long, default_value = DEFAULT_SCHEDULE, env = "DB_SYNC_SCHEDULE")]
        cron: String,

        /// Stop after this many runs
        #[arg(long)]
        max_runs: Option<u64>,

        #[command(flatten)]
        opts: ResyncOpts,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Status {
            check,
            mirror,
            resync,
        } => run_status(check, mirror, resync).await,
        Commands::Apply {
            event,
            event_file,
            mirror,
        } => {
            let payload = match (event, event_file) {
                (Some(event), _) => event,
                (None, Some(path)) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read job payload from {path:?}"))?,
                (None, None) => anyhow::bail!("Either --event or --event-file is required"),
            };
            run_apply(&payload, mirror).await
        }
        Commands::Worker {
            input,
            concurrency,
            queue_capacity,
            mirror,
        } => run_worker(input, concurrency, queue_capacity, mirror).await,
        Commands::Resync { command } => match command {
            ResyncCommand::Once { opts } => run_resync_once(opts).await,
            ResyncCommand::Schedule {
                cron,
                max_runs,
                opts,
            } => run_resync_schedule(&cron, max_runs, opts).await,
        },
    }
}

async fn run_status(check: bool, mirror: MirrorOpts, resync: ResyncOpts) -> anyhow::Result<()> {
    let connections = mirror.connection_manager()?;
    match connections.target() {
        Some(target) => {
            let tls = target
                .tls_mode()
                .context("Invalid mirror database configuration")?;
            info!("Mirroring enabled: {} (tls: {tls:?})", target.describe());
            if check {
                match connections.connection().await {
                    Some(_) => info!("Mirror database reachable"),
                    None => anyhow::bail!("Mirror database is not reachable"),
                }
            }
        }
        None => info!("Mirroring disabled (DATABASE_MIRROR_URL / MIRROR_DB_HOST not set)"),
    }

    let service = resync.service()?;
    match service.command()? {
        Some(command) => info!("Full resync enabled: {command:?}"),
        None => info!("Full resync disabled (EXTERNAL_DB_URL not set)"),
    }
    Ok(())
}

async fn run_apply(payload: &str, mirror: MirrorOpts) -> anyhow::Result<()> {
    let runner = mirror.job_runner()?;
    match runner.perform(payload).await {
        JobOutcome::Completed(outcome) => {
            info!("Mirror job finished: {outcome:?}");
            Ok(())
        }
        JobOutcome::Discarded(e) => Err(e).context("Mirror job discarded"),
        JobOutcome::Swallowed(e) => Err(e).context("Mirror job failed"),
        JobOutcome::Exhausted { attempts, error } => {
            Err(error).with_context(|| format!("Mirror job failed after {attempts} attempts"))
        }
    }
}

async fn run_worker(
    input: Option<PathBuf>,
    concurrency: usize,
    queue_capacity: usize,
    mirror: MirrorOpts,
) -> anyhow::Result<()> {
    let runner = Arc::new(mirror.job_runner()?);
    let (tx, rx) = mpsc::channel(queue_capacity.max(1));
    let shutdown = setup_shutdown_handler();

    let feeder = match input {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open job file {path:?}"))?;
            tokio::spawn(feed_jobs(BufReader::new(file), tx, shutdown))
        }
        None => tokio::spawn(feed_jobs(BufReader::new(tokio::io::stdin()), tx, shutdown)),
    };

    let stats = MirrorWorker::new(runner)
        .with_concurrency(concurrency)
        .run(rx)
        .await;
    let read = feeder.await.context("Job reader task failed")??;

    info!(
        "Processed {read} jobs: {} completed, {} discarded, {} swallowed, {} exhausted, {} panicked",
        stats.completed, stats.discarded, stats.swallowed, stats.exhausted, stats.panicked
    );
    Ok(())
}

/// Forwards non-empty lines to the worker until EOF or shutdown.
async fn feed_jobs<R>(
    reader: R,
    jobs: mpsc::Sender<String>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut read = 0;
    loop {
        let line = tokio::select! {
            _ = shutdown.recv() => {
                info!("Received shutdown signal, draining in-flight jobs");
                break;
            }
            line = lines.next_line() => line.context("Failed to read job input")?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        read += 1;
        if jobs.send(line).await.is_err() {
            warn!("Worker stopped, no longer reading jobs");
            break;
        }
    }
    Ok(read)
}

async fn run_resync_once(opts: ResyncOpts) -> anyhow::Result<()> {
    let service = Arc::new(opts.service()?);
    match service.sync_blocking().await? {
        SyncOutcome::Completed { elapsed } => info!("Full resync finished in {elapsed:?}"),
        SyncOutcome::Skipped => {}
    }
    Ok(())
}

async fn run_resync_schedule(
    cron: &str,
    max_runs: Option<u64>,
    opts: ResyncOpts,
) -> anyhow::Result<()> {
    let schedule = ResyncSchedule::parse(cron)?;
    let service = Arc::new(opts.service()?);
    if !service.config().enabled() {
        warn!("EXTERNAL_DB_URL is not set; scheduled syncs will be skipped");
    }

    let mut scheduler = ResyncScheduler::new(service, schedule);
    if let Some(runs) = max_runs {
        scheduler = scheduler.with_max_runs(runs);
    }

    let stats = scheduler.run(setup_shutdown_handler()).await;
    info!(
        "Resync scheduler stopped after {} runs ({} failed)",
        stats.runs, stats.failures
    );
    Ok(())
}

/// Sets up a shutdown signal handler
fn setup_shutdown_handler() -> broadcast::Receiver<()> {
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            // Dropping the sender would read as a shutdown.
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received interrupt signal (Ctrl+C)");
        let _ = shutdown_tx.send(());
    });

    shutdown_rx
}
