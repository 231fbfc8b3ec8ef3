//! `oac-jobs` - job system for oac-tree procedures.
//!
//! A job pairs a procedure item with a running domain procedure. Domain
//! callbacks are pushed onto a per-job FIFO queue from the job thread and
//! consumed on the caller's thread, where they update the item model.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Runner configuration loaded from TOML.
pub mod config;
/// Job errors.
pub mod error;
/// Domain events.
pub mod events;
/// Per-job event handling and item updates.
pub mod handler;
/// Timestamped job log.
pub mod log;
/// Job ownership and lifecycle.
pub mod manager;
/// Event queue and dispatcher.
pub mod queue;
/// Remote automation clients.
pub mod remote;
/// Domain runners.
pub mod runner;
/// Item workspace ⇄ domain workspace synchronisation.
pub mod synchronizer;

pub use config::RunnerConfig;
pub use error::JobError;
pub use events::DomainEvent;
pub use handler::JobHandler;
pub use log::{JobLog, JobLogEntry};
pub use manager::{JobContext, JobManager};
pub use queue::{event_channel, DomainEventDispatcher, DomainEventHandler, EventSender, Notifier};
pub use remote::{AutomationClient, RemoteConnectionService};
pub use runner::{AbstractDomainRunner, DomainRunner};
pub use synchronizer::{VariableUpdate, WorkspaceSynchronizer};
