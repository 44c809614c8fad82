//! db-mirror Library
//!
//! Keeps a secondary PostgreSQL database in step with a primary application
//! database.
//!
//! # Features
//!
//! - Incremental mirroring: each committed create/update/destroy becomes a
//!   job that replays the write on the mirror
//! - Best-effort: an unconfigured or unreachable mirror never fails the
//!   writer; transient database errors are retried with backoff
//! - Full resync: `pg_dump | psql` from an external database, on demand or on
//!   a cron schedule
//!
//! # Crates
//!
//! - `mirror_core` - events, scalar values, the producer interface
//! - `db_mirror_postgresql` - connection manager, statement builder,
//!   executor, job runner and worker
//! - `db_mirror_resync` - full resync service and scheduler
//!
//! # CLI Usage
//!
//! ```bash
//! # Mirror one job
//! DATABASE_MIRROR_URL=postgres://... db-mirror apply --event-file job.json
//!
//! # Consume JSON-lines jobs from stdin
//! db-mirror worker --concurrency 8 < jobs.jsonl
//!
//! # Hourly full resync
//! EXTERNAL_DB_URL=postgres://... db-mirror resync schedule --cron "0 * * * *"
//! ```

use anyhow::Context;
use clap::Parser;
use db_mirror_postgresql::{
    ConnectionManager, EnvMirrorConfig, JobRunner, MirrorExecutor, RetryPolicy, TableResolver,
};
use db_mirror_resync::{LocalDbConfig, ResyncConfig, ResyncService};
use std::path::PathBuf;
use std::sync::Arc;

pub mod config;

pub use config::parse_duration;

// Re-export the pipeline crates for convenience
pub use db_mirror_postgresql as postgresql;
pub use db_mirror_resync as resync;
pub use mirror_core;

#[derive(Parser, Clone, Debug)]
pub struct MirrorOpts {
    /// Fallback connect timeout for the mirror database
    #[arg(long, default_value = "10s", env = "DB_MIRROR_CONNECT_TIMEOUT")]
    pub connect_timeout: String,

    /// Upper bound on a single mirrored statement
    #[arg(long, default_value = "30s", env = "DB_MIRROR_STATEMENT_TIMEOUT")]
    pub statement_timeout: String,

    /// Explicit entity to table mapping (format: 'Entity=table')
    #[arg(
        long = "table",
        value_name = "ENTITY=TABLE",
        env = "DB_MIRROR_TABLES",
        value_delimiter = ','
    )]
    pub tables: Vec<String>,

    /// Attempts per job before giving up on a retryable failure
    #[arg(long, default_value = "10", env = "DB_MIRROR_MAX_ATTEMPTS")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles per attempt
    #[arg(long, default_value = "1s")]
    pub retry_initial_delay: String,

    /// Cap on the delay between retries
    #[arg(long, default_value = "5m")]
    pub retry_max_delay: String,
}

impl MirrorOpts {
    pub fn retry_policy(&self) -> anyhow::Result<RetryPolicy> {
        Ok(RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_delay: parse_duration(&self.retry_initial_delay)
                .context("Invalid --retry-initial-delay")?,
            max_delay: parse_duration(&self.retry_max_delay)
                .context("Invalid --retry-max-delay")?,
            ..RetryPolicy::default()
        })
    }

    /// Connection manager reading `DATABASE_MIRROR_URL` / `MIRROR_DB_*`.
    pub fn connection_manager(&self) -> anyhow::Result<ConnectionManager> {
        let connect_timeout =
            parse_duration(&self.connect_timeout).context("Invalid --connect-timeout")?;
        Ok(
            ConnectionManager::postgres(Arc::new(EnvMirrorConfig::from_process_env()))
                .with_connect_timeout(connect_timeout),
        )
    }

    pub fn executor(&self) -> anyhow::Result<MirrorExecutor> {
        let statement_timeout =
            parse_duration(&self.statement_timeout).context("Invalid --statement-timeout")?;
        let tables = TableResolver::from_pairs(&self.tables)?;
        Ok(
            MirrorExecutor::new(Arc::new(self.connection_manager()?), tables)
                .with_statement_timeout(statement_timeout),
        )
    }

    pub fn job_runner(&self) -> anyhow::Result<JobRunner> {
        Ok(JobRunner::new(
            Arc::new(self.executor()?),
            self.retry_policy()?,
        ))
    }
}

#[derive(Parser, Clone, Debug)]
pub struct ResyncOpts {
    /// YAML file with the local database settings (username, password, host, port, database)
    #[arg(long, value_name = "PATH", env = "DB_MIRROR_LOCAL_CONFIG")]
    pub local_config: Option<PathBuf>,

    /// pg_dump executable
    #[arg(long, default_value = "pg_dump", env = "PG_DUMP_PATH")]
    pub pg_dump: String,

    /// psql executable
    #[arg(long, default_value = "psql", env = "PSQL_PATH")]
    pub psql: String,
}

impl ResyncOpts {
    pub fn local_db_config(&self) -> anyhow::Result<LocalDbConfig> {
        match &self.local_config {
            Some(path) => LocalDbConfig::from_yaml_file(path)
                .with_context(|| format!("Failed to load local database config from {path:?}")),
            None => Ok(LocalDbConfig::default()),
        }
    }

    pub fn service(&self) -> anyhow::Result<ResyncService> {
        let config = ResyncConfig::from_process_env(self.local_db_config()?);
        Ok(ResyncService::with_processes(config).with_programs(&self.pg_dump, &self.psql))
    }
}
