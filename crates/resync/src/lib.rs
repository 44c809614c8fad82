//! Full resync of the local database from an external PostgreSQL.
//!
//! [`ResyncService::sync`] pipes `pg_dump` of `EXTERNAL_DB_URL` into `psql`
//! against the local database, replacing its contents. Without
//! `EXTERNAL_DB_URL` it logs a warning and does nothing. [`ResyncScheduler`]
//! repeats the sync on a cron schedule (`DB_SYNC_SCHEDULE`, hourly by
//! default).

pub mod config;
pub mod error;
pub mod pipeline;
pub mod scheduler;
pub mod service;

pub use config::{compose_url, redact_url, LocalDbConfig, ResyncConfig};
pub use error::{ResyncError, Result};
pub use pipeline::{DumpRestoreCommand, PipelineRunner, ProcessRunner};
pub use scheduler::{ResyncSchedule, ResyncScheduler, SchedulerStats, DEFAULT_SCHEDULE};
pub use service::{ResyncService, SyncOutcome};
