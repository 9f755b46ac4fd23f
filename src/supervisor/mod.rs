//! Worker spawning and termination observation.
//!
//! The registry needs two things from the outside world: a way to start a
//! batcher for a project, and a way to find out how a running batcher ended.
//! [`WorkerSupervisor`] covers the first; [`WorkerHandle`] carries the second
//! as a watchable exit channel, so the registry can arrange a linked watcher
//! at registration time without knowing anything about the worker's internals.
//!
//! Restart and backoff policy is deliberately not part of this contract; a
//! crashed worker is only replaced when something asks the registry for the
//! project again.

mod handle;
mod task;

use std::future::Future;

use thiserror::Error;

use crate::types::ProjectId;

pub use handle::{ExitSignal, ExitStatus, WorkerHandle};
pub use task::{TaskSupervisor, WorkerOutcome};

/// A worker could not be spawned.
///
/// Propagated to whoever asked the registry for the worker; the registry does
/// not recover from it locally.
#[derive(Debug, Clone, Error)]
#[error("could not spawn batcher for {project}: {message}")]
pub struct SpawnError {
    pub project: ProjectId,
    pub message: String,
}

impl SpawnError {
    pub fn new(project: ProjectId, message: impl Into<String>) -> Self {
        SpawnError {
            project,
            message: message.into(),
        }
    }
}

/// Spawns batcher workers on demand.
pub trait WorkerSupervisor: Send + Sync {
    /// Starts a new batcher for the project and returns its handle.
    ///
    /// The spawned worker is expected to announce itself via
    /// [`Registry::monitor`](crate::registry::Registry::monitor) once its
    /// startup is complete; `start` itself must not block on that.
    fn start(
        &self,
        project: ProjectId,
    ) -> impl Future<Output = Result<WorkerHandle, SpawnError>> + Send;
}
