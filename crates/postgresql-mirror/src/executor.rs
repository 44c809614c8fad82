//! Mirror executor: applies one [`MirrorEvent`] to the mirror database.

use crate::connection::ConnectionManager;
use crate::error::{MirrorError, Result};
use crate::statement::{self, Statement};
use crate::table::TableResolver;
use mirror_core::{MirrorEvent, Operation};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default upper bound on a single mirrored statement.
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Why an event produced no statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Create/update without attributes.
    EmptyAttributes,
    /// Update whose only attribute is the primary key.
    NothingToUpdate,
    UnknownOperation(String),
}

/// Result of a successful [`MirrorExecutor::execute`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Mirroring is not configured.
    Disabled,
    /// No connection could be established for this attempt.
    Unavailable,
    Skipped(SkipReason),
    Applied { rows: u64 },
}

pub struct MirrorExecutor {
    connections: Arc<ConnectionManager>,
    tables: TableResolver,
    statement_timeout: Duration,
}

impl MirrorExecutor {
    pub fn new(connections: Arc<ConnectionManager>, tables: TableResolver) -> Self {
        Self {
            connections,
            tables,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        }
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    /// Mirror one committed write.
    ///
    /// Disabled mirroring, a missing connection, empty attributes and unknown
    /// operations all return `Ok`. Errors are either database failures
    /// (retryable) or events that can never be applied.
    pub async fn execute(&self, event: &MirrorEvent) -> Result<ExecOutcome> {
        if !self.connections.enabled() {
            debug!("[MirrorExecutor] Mirroring disabled, skipping {}", event.label());
            return Ok(ExecOutcome::Disabled);
        }

        let Some(mut session) = self.connections.connection().await else {
            warn!(
                "[MirrorExecutor] Mirror connection unavailable, skipping {}",
                event.label()
            );
            return Ok(ExecOutcome::Unavailable);
        };

        if let Operation::Unknown(op) = &event.operation {
            warn!("[MirrorExecutor] Unknown operation: {op}");
            return Ok(ExecOutcome::Skipped(SkipReason::UnknownOperation(op.clone())));
        }

        let table = self.tables.resolve(&event.entity_name)?;
        let Some(statement) = self.build(&table, event)? else {
            let reason = if event.attributes.is_empty() {
                SkipReason::EmptyAttributes
            } else {
                SkipReason::NothingToUpdate
            };
            debug!("[MirrorExecutor] Nothing to mirror for {} ({reason:?})", event.label());
            return Ok(ExecOutcome::Skipped(reason));
        };

        let result =
            tokio::time::timeout(self.statement_timeout, session.execute(&statement)).await;
        match result {
            Ok(Ok(rows)) => {
                debug!(
                    "[MirrorExecutor] Applied {} for {} to {table} ({rows} rows)",
                    event.operation,
                    event.label()
                );
                Ok(ExecOutcome::Applied { rows })
            }
            Ok(Err(e)) => {
                if session.is_closed() {
                    session.reset();
                }
                Err(e)
            }
            Err(_) => {
                // The connection may be wedged mid-statement.
                session.reset();
                Err(MirrorError::StatementTimeout(self.statement_timeout))
            }
        }
    }

    fn build(&self, table: &str, event: &MirrorEvent) -> Result<Option<Statement>> {
        match &event.operation {
            Operation::Create => statement::build_insert(table, &event.attributes),
            Operation::Update => {
                statement::build_update(table, event.record_id.as_ref(), &event.attributes)
            }
            Operation::Destroy => {
                statement::build_delete(table, event.record_id.as_ref()).map(Some)
            }
            Operation::Unknown(_) => Ok(None),
        }
    }
}
