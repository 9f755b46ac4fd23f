//! Crash-recovery pipeline.
//!
//! Runs when a monitored worker terminates abnormally, after the directory
//! entry has been cleared:
//!
//! 1. Build the crash report (falling back to a minimal report if the
//!    builder itself fails).
//! 2. Delete every `waiting` batch of the project; they never started CI.
//! 3. Cancel every `running` batch.
//! 4. Insert one crash record with the full report text.
//! 5. Dispatch the report sections to the notifier on a detached task.
//!
//! Error handling is deliberately asymmetric: report construction and
//! notifier delivery are best-effort, but a storage failure during cleanup or
//! record insertion aborts the invocation, since skipping batch cleanup
//! silently would leave the queue inconsistent.
//!
//! The crashed worker is not relaunched here; the next `get` for the project
//! creates a replacement through the normal lookup protocol.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::notify::Notifier;
use crate::storage::{Storage, StorageError};
use crate::supervisor::WorkerHandle;
use crate::types::{BatchState, ProjectId};

use super::report::{CRASH_ALARM, CrashReport, CrashReportBuilder};

/// Component tag written to every crash record produced by this subsystem.
pub const CRASH_COMPONENT: &str = "batcher";

/// Reconciles batch state and records the incident for one crashed worker.
pub(crate) async fn run_crash_recovery<S, N>(
    storage: &S,
    notifier: &Arc<N>,
    config: &RegistryConfig,
    project: ProjectId,
    worker: &WorkerHandle,
    reason: &str,
) -> Result<(), StorageError>
where
    S: Storage,
    N: Notifier + 'static,
{
    // Capture the report before mutating anything; the builder is read-only,
    // so the report describes the batches as the worker left them.
    let report = match CrashReportBuilder::new(storage, config)
        .build(project, worker, reason)
        .await
    {
        Ok(report) => report,
        Err(error) => {
            warn!(
                project = %project,
                error = %error,
                "crash report construction failed; falling back to minimal report"
            );
            CrashReport::fallback(project, reason, &error)
        }
    };

    let waiting = storage
        .batches_for_project(project, BatchState::Waiting)
        .await?;
    for batch in &waiting {
        debug!(project = %project, batch = %batch.id, "deleting waiting batch");
        storage.delete_batch(batch.id).await?;
    }

    let running = storage
        .batches_for_project(project, BatchState::Running)
        .await?;
    for batch in &running {
        debug!(project = %project, batch = %batch.id, "canceling running batch");
        storage.set_batch_state(batch.id, BatchState::Canceled).await?;
    }

    storage
        .insert_crash(project, CRASH_COMPONENT, &report.full_text())
        .await?;

    info!(
        project = %project,
        worker = %worker.id(),
        deleted = waiting.len(),
        canceled = running.len(),
        "crash recovery complete"
    );

    dispatch_report(Arc::clone(notifier), report);
    Ok(())
}

/// Sends the report sections in order on a detached task.
///
/// Notifier latency or failure must not hold up the registry actor, so this
/// returns as soon as the task is spawned; delivery failures are logged only.
fn dispatch_report<N: Notifier + 'static>(notifier: Arc<N>, report: CrashReport) {
    tokio::spawn(async move {
        let mut sections = report.into_sections().into_iter();
        if let Some(header) = sections.next() {
            deliver(notifier.as_ref(), format!("{} {}", CRASH_ALARM, header)).await;
        }
        for section in sections {
            deliver(notifier.as_ref(), section).await;
        }
    });
}

async fn deliver<N: Notifier>(notifier: &N, text: String) {
    if let Err(error) = notifier.send(text).await {
        warn!(error = %error, "crash notification dropped");
    }
}
