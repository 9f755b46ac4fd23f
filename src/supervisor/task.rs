//! Tokio-task-based worker supervisor.
//!
//! Spawns each batcher as a tokio task and pairs it with a watcher task that
//! classifies the join outcome and reports it through the worker's exit
//! channel: a clean return is a normal exit, anything else (error, panic,
//! abort) is a crash.

use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::task::JoinHandle;
use tracing::debug;

use crate::types::{ProjectId, WorkerId};

use super::handle::{ExitSignal, ExitStatus, WorkerHandle};
use super::{SpawnError, WorkerSupervisor};

/// What a batcher's main future resolves to.
pub type WorkerOutcome = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Spawns batcher workers as tokio tasks.
///
/// The factory receives the project id and the worker's own handle; the
/// worker is expected to register that handle with the registry once it is
/// ready to accept work.
pub struct TaskSupervisor<F> {
    factory: F,
    next_id: AtomicU64,
}

impl<F, Fut> TaskSupervisor<F>
where
    F: Fn(ProjectId, WorkerHandle) -> Fut + Send + Sync,
    Fut: Future<Output = WorkerOutcome> + Send + 'static,
{
    pub fn new(factory: F) -> Self {
        TaskSupervisor {
            factory,
            next_id: AtomicU64::new(1),
        }
    }
}

impl<F, Fut> WorkerSupervisor for TaskSupervisor<F>
where
    F: Fn(ProjectId, WorkerHandle) -> Fut + Send + Sync,
    Fut: Future<Output = WorkerOutcome> + Send + 'static,
{
    async fn start(&self, project: ProjectId) -> Result<WorkerHandle, SpawnError> {
        let id = WorkerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (handle, exit) = WorkerHandle::new(id);

        debug!(project = %project, worker = %id, "spawning batcher task");
        let task = tokio::spawn((self.factory)(project, handle.clone()));
        tokio::spawn(watch_worker(project, id, task, exit));

        Ok(handle)
    }
}

/// Awaits the worker task and reports its classified exit status.
async fn watch_worker(
    project: ProjectId,
    id: WorkerId,
    task: JoinHandle<WorkerOutcome>,
    exit: ExitSignal,
) {
    let status = match task.await {
        Ok(Ok(())) => ExitStatus::Normal,
        Ok(Err(error)) => ExitStatus::Crashed(error.to_string()),
        Err(join_error) if join_error.is_panic() => {
            ExitStatus::Crashed(panic_reason(join_error.into_panic()))
        }
        Err(_) => ExitStatus::Crashed("worker task aborted".to_string()),
    };

    debug!(project = %project, worker = %id, status = %status, "batcher task finished");
    exit.report(status);
}

/// Renders a panic payload as a crash reason.
fn panic_reason(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
