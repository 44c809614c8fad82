//! Producer side of the mirror pipeline.
//!
//! The application calls [`MirrorProducer::on_commit`] after a write has been
//! committed on the primary. The producer turns the record into a
//! [`MirrorEvent`] and hands it to an [`EventSink`] (normally a job queue).
//! Failures here are logged and never returned to the writer.

use crate::attributes::Attributes;
use crate::event::{MirrorEvent, Operation};
use crate::values::MirrorValue;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// A record whose committed writes are mirrored.
pub trait Mirrorable {
    /// Logical record type, e.g. `Account`.
    fn entity_name(&self) -> &str;

    fn record_id(&self) -> MirrorValue;

    /// Current attributes, already converted to mirror scalars.
    fn mirror_attributes(&self) -> Attributes;
}

/// Which commit callback fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    Created,
    Updated,
    Destroyed,
}

impl From<CommitKind> for Operation {
    fn from(kind: CommitKind) -> Self {
        match kind {
            CommitKind::Created => Operation::Create,
            CommitKind::Updated => Operation::Update,
            CommitKind::Destroyed => Operation::Destroy,
        }
    }
}

impl MirrorEvent {
    pub fn created<R: Mirrorable + ?Sized>(record: &R) -> Self {
        Self::new(
            record.entity_name(),
            record.record_id(),
            Operation::Create,
            record.mirror_attributes(),
        )
    }

    pub fn updated<R: Mirrorable + ?Sized>(record: &R) -> Self {
        Self::new(
            record.entity_name(),
            record.record_id(),
            Operation::Update,
            record.mirror_attributes(),
        )
    }

    /// Destroy events never carry attributes.
    pub fn destroyed<R: Mirrorable + ?Sized>(record: &R) -> Self {
        Self::new(
            record.entity_name(),
            record.record_id(),
            Operation::Destroy,
            Attributes::new(),
        )
    }

    pub fn for_commit<R: Mirrorable + ?Sized>(kind: CommitKind, record: &R) -> Self {
        match kind {
            CommitKind::Created => Self::created(record),
            CommitKind::Updated => Self::updated(record),
            CommitKind::Destroyed => Self::destroyed(record),
        }
    }
}

/// Errors raised while enqueueing a mirror event.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The queue consumer has gone away.
    #[error("Mirror queue is closed")]
    Closed,

    #[error("Failed to serialize mirror event: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Destination for mirror events (a job queue).
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn enqueue(&self, event: MirrorEvent) -> Result<(), SinkError>;
}

/// Reports whether mirroring is currently configured.
pub trait MirrorSwitch: Send + Sync {
    fn enabled(&self) -> bool;
}

/// Emits mirror events from commit callbacks.
pub struct MirrorProducer {
    sink: Arc<dyn EventSink>,
    switch: Arc<dyn MirrorSwitch>,
}

impl MirrorProducer {
    pub fn new(sink: Arc<dyn EventSink>, switch: Arc<dyn MirrorSwitch>) -> Self {
        Self { sink, switch }
    }

    /// Enqueue a mirror event for `record`.
    ///
    /// Returns `true` when an event was enqueued. Nothing is emitted while
    /// mirroring is disabled, and sink failures are logged rather than
    /// surfaced to the caller.
    pub async fn on_commit<R: Mirrorable + ?Sized + Sync>(
        &self,
        kind: CommitKind,
        record: &R,
    ) -> bool {
        if !self.switch.enabled() {
            return false;
        }

        let event = MirrorEvent::for_commit(kind, record);
        let label = event.label();
        match self.sink.enqueue(event).await {
            Ok(()) => {
                tracing::debug!("[MirrorProducer] Enqueued {kind:?} for {label}");
                true
            }
            Err(e) => {
                tracing::error!("[MirrorProducer] Failed to enqueue {kind:?} for {label}: {e}");
                false
            }
        }
    }
}
