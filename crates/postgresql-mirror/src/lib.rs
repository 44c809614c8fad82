//! Incremental write mirroring to a secondary PostgreSQL database.
//!
//! ```text
//! MirrorEvent (JSON job)
//!     │
//!     ▼
//! JobRunner ── retry/discard/swallow ──► RetryPolicy
//!     │
//!     ▼
//! MirrorExecutor ── TableResolver ──► statement::build_*
//!     │
//!     ▼
//! ConnectionManager ── MirrorConfigSource (env)
//!     │
//!     ▼
//! tokio-postgres (parameters bound via SqlValue)
//! ```
//!
//! Mirroring is best-effort: when no mirror target is configured every
//! operation is a silent no-op, and an unreachable mirror is logged and
//! skipped. Only database failures during a statement are retried.

pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod job;
pub mod quote;
pub mod retry;
pub mod statement;
pub mod table;
pub mod tls;
pub mod value;
pub mod worker;

pub use config::{
    ConnectionParams, EnvMirrorConfig, MirrorConfigSource, MirrorTarget, StaticMirrorConfig, TlsMode,
};
pub use connection::{ConnectionManager, Connector, MirrorConnection, MirrorSession, PostgresConnector};
pub use error::{Disposition, MirrorError, Result};
pub use executor::{ExecOutcome, MirrorExecutor, SkipReason};
pub use job::{JobOutcome, JobRunner};
pub use quote::quote_identifier;
pub use retry::RetryPolicy;
pub use statement::Statement;
pub use table::TableResolver;
pub use value::SqlValue;
pub use worker::{queue, MirrorWorker, QueueSink, WorkerStats};
