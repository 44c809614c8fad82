//! Mirror job: payload in, executor call with retries, outcome out.
//!
//! | Failure | Handling |
//! |---------|----------|
//! | payload does not deserialize | discarded, never retried |
//! | [`Disposition::Retry`] | retried per [`RetryPolicy`], then exhausted |
//! | [`Disposition::Discard`] | discarded |
//! | [`Disposition::Swallow`] | logged and dropped |

use crate::error::{Disposition, MirrorError};
use crate::executor::{ExecOutcome, MirrorExecutor};
use crate::retry::RetryPolicy;
use mirror_core::MirrorEvent;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, warn};

/// Final state of a mirror job.
#[derive(Debug)]
pub enum JobOutcome {
    Completed(ExecOutcome),
    /// The job can never succeed and was dropped.
    Discarded(MirrorError),
    /// Unexpected failure, logged and dropped.
    Swallowed(MirrorError),
    /// Retryable failure that persisted through every attempt.
    Exhausted { attempts: u32, error: MirrorError },
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed(_))
    }
}

pub struct JobRunner {
    executor: Arc<MirrorExecutor>,
    policy: RetryPolicy,
}

impl JobRunner {
    pub fn new(executor: Arc<MirrorExecutor>, policy: RetryPolicy) -> Self {
        Self { executor, policy }
    }

    /// Run a serialized job payload.
    pub async fn perform(&self, payload: &str) -> JobOutcome {
        match MirrorEvent::from_json(payload) {
            Ok(event) => self.perform_event(&event).await,
            Err(e) => {
                let e = MirrorError::from(e);
                error!("[MirrorJob] Discarding undecodable job: {e}");
                JobOutcome::Discarded(e)
            }
        }
    }

    pub async fn perform_event(&self, event: &MirrorEvent) -> JobOutcome {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let e = match self.executor.execute(event).await {
                Ok(outcome) => return JobOutcome::Completed(outcome),
                Err(e) => e,
            };

            match e.disposition() {
                Disposition::Discard => {
                    error!("[MirrorJob] Discarding {}: {e}", event.label());
                    return JobOutcome::Discarded(e);
                }
                Disposition::Swallow => {
                    error!("[MirrorJob] Failed to mirror {}: {e}", event.label());
                    return JobOutcome::Swallowed(e);
                }
                Disposition::Retry if !self.policy.should_retry(attempt) => {
                    error!(
                        "[MirrorJob] Giving up on {} after {attempt} attempts: {e}",
                        event.label()
                    );
                    return JobOutcome::Exhausted { attempts: attempt, error: e };
                }
                Disposition::Retry => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        "[MirrorJob] Mirror failed for {} (attempt {attempt}/{}), retrying in {delay:?}: {e}",
                        event.label(),
                        self.policy.max_attempts
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
