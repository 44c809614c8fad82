//! Core types for the db-mirror pipeline.
//!
//! This crate provides the types shared by the producer and the executor:
//!
//! - [`MirrorValue`] - Closed set of pre-serialized scalar kinds
//! - [`Attributes`] - Ordered column → value mapping
//! - [`MirrorEvent`] / [`Operation`] - One committed write on the primary
//! - [`MirrorProducer`] - On-commit hook that enqueues events
//!
//! # Architecture
//!
//! ```text
//! mirror-core (this crate)
//!    │
//!    ├─── postgresql-mirror   (statement builder, connection manager, executor)
//!    └─── db-mirror           (CLI, worker wiring)
//! ```
//!
//! # Example
//!
//! ```rust
//! use mirror_core::{Attributes, MirrorEvent, Operation};
//!
//! let event = MirrorEvent::new(
//!     "Account",
//!     "id-1",
//!     Operation::Create,
//!     Attributes::new().with("id", "id-1").with("name", "Test"),
//! );
//! assert_eq!(event.label(), "Account#id-1");
//! ```

pub mod attributes;
pub mod event;
pub mod producer;
pub mod values;

pub use attributes::{Attributes, PRIMARY_KEY};
pub use event::{MirrorEvent, Operation};
pub use producer::{CommitKind, EventSink, MirrorProducer, MirrorSwitch, Mirrorable, SinkError};
pub use values::MirrorValue;
