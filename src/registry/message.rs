//! Messages consumed by the registry actor.
//!
//! Everything that touches the directory (lookups, registrations, termination
//! signals) flows through one `tokio::sync::mpsc` channel and is processed
//! strictly in arrival order, so the directory never observes a torn state.

use tokio::sync::oneshot;

use crate::supervisor::{ExitStatus, WorkerHandle};
use crate::types::{MonitorToken, ProjectId};

/// Messages processed serially by the registry actor.
#[derive(Debug)]
pub(crate) enum RegistryMessage {
    /// Directory lookup on behalf of `get`; replies with the registered
    /// handle, if any. The caller does its own retry pacing.
    Lookup {
        project: ProjectId,
        reply: oneshot::Sender<Option<WorkerHandle>>,
    },

    /// Self-announcement from a freshly started worker.
    Register {
        project: ProjectId,
        handle: WorkerHandle,
        reply: oneshot::Sender<()>,
    },

    /// Posted by a linked watcher when a monitored worker terminates.
    WorkerExited {
        token: MonitorToken,
        handle: WorkerHandle,
        status: ExitStatus,
    },

    /// Number of registered workers, for introspection.
    Count { reply: oneshot::Sender<usize> },
}
