//! Worker handles and exit reporting.

use std::fmt;

use tokio::sync::watch;

use crate::types::WorkerId;

/// How a worker's run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    /// The worker stopped on its own terms (queue drained, shutdown request).
    Normal,
    /// Anything else: an error, a panic, or an abort. Triggers crash recovery.
    Crashed(String),
}

impl ExitStatus {
    pub fn is_normal(&self) -> bool {
        matches!(self, ExitStatus::Normal)
    }

    /// The failure reason as free text.
    pub fn reason(&self) -> &str {
        match self {
            ExitStatus::Normal => "normal exit",
            ExitStatus::Crashed(reason) => reason,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Normal => write!(f, "normal exit"),
            ExitStatus::Crashed(reason) => write!(f, "crashed: {}", reason),
        }
    }
}

/// Opaque reference to a running batcher worker.
///
/// Cloneable and cheap; all clones refer to the same worker. Equality is by
/// [`WorkerId`], which is unique per spawn. Handles are only meaningful within
/// the lifetime of the process that spawned the worker; they are never
/// persisted.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    id: WorkerId,
    exit: watch::Receiver<Option<ExitStatus>>,
}

impl WorkerHandle {
    /// Creates a handle and the worker-side reporting half.
    ///
    /// Whoever runs the worker keeps the [`ExitSignal`] and reports through it
    /// when the worker ends. Dropping the signal without reporting counts as a
    /// crash: a worker that vanishes silently must still trigger recovery.
    pub fn new(id: WorkerId) -> (WorkerHandle, ExitSignal) {
        let (tx, rx) = watch::channel(None);
        (WorkerHandle { id, exit: rx }, ExitSignal { tx })
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Waits until the worker has terminated and returns how it ended.
    pub async fn terminated(&self) -> ExitStatus {
        let mut rx = self.exit.clone();
        loop {
            let reported = rx.borrow_and_update().clone();
            if let Some(status) = reported {
                return status;
            }
            if rx.changed().await.is_err() {
                // Reporting half dropped without a status.
                return ExitStatus::Crashed("worker exited without reporting a status".to_string());
            }
        }
    }
}

impl PartialEq for WorkerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WorkerHandle {}

impl fmt::Display for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Worker-side half of the exit channel.
///
/// Held by whatever runs the worker (see
/// [`TaskSupervisor`](super::TaskSupervisor)); consumed by reporting the final
/// status exactly once.
#[derive(Debug)]
pub struct ExitSignal {
    tx: watch::Sender<Option<ExitStatus>>,
}

impl ExitSignal {
    /// Reports the worker's final status to every handle clone.
    pub fn report(self, status: ExitStatus) {
        // Receivers may all be gone (nobody monitored this worker); fine.
        let _ = self.tx.send(Some(status));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn terminated_resolves_after_report() {
        let (handle, exit) = WorkerHandle::new(WorkerId(1));

        let waiter = tokio::spawn({
            let handle = handle.clone();
            async move { handle.terminated().await }
        });

        exit.report(ExitStatus::Normal);
        let status = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(status.is_normal());
    }

    #[tokio::test]
    async fn report_before_wait_is_not_lost() {
        let (handle, exit) = WorkerHandle::new(WorkerId(2));
        exit.report(ExitStatus::Crashed("boom".to_string()));

        let status = handle.terminated().await;
        assert_eq!(status, ExitStatus::Crashed("boom".to_string()));
    }

    #[tokio::test]
    async fn dropped_signal_counts_as_crash() {
        let (handle, exit) = WorkerHandle::new(WorkerId(3));
        drop(exit);

        let status = handle.terminated().await;
        assert!(!status.is_normal());
        assert!(status.reason().contains("without reporting"));
    }

    #[test]
    fn equality_is_by_id() {
        let (a1, _exit_a) = WorkerHandle::new(WorkerId(7));
        let a2 = a1.clone();
        let (b, _exit_b) = WorkerHandle::new(WorkerId(8));

        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }
}
