//! Crash report construction.
//!
//! A crash report is an ordered sequence of text sections: a header naming
//! the project, the terminated worker and the failure reason, then one
//! section per affected batch group (waiting, running). Empty groups are
//! omitted entirely. The same sections are persisted as one crash record and
//! dispatched as a sequence of notifier messages.
//!
//! The builder only reads from storage; batch mutation belongs to the
//! recovery pipeline, which captures the report text first.

use std::fmt::Write as _;

use crate::config::RegistryConfig;
use crate::storage::{Storage, StorageError};
use crate::supervisor::WorkerHandle;
use crate::types::{Batch, BatchState, PrNumber, ProjectId};

/// Alarm prefix carried by the first message of a dispatched report.
pub const CRASH_ALARM: &str = ":rotating_light:";

/// An ordered, possibly multi-section crash report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashReport {
    sections: Vec<String>,
}

impl CrashReport {
    fn new(sections: Vec<String>) -> Self {
        CrashReport { sections }
    }

    /// Minimal single-section report used when report construction itself
    /// failed: the raw termination reason plus the construction error. A
    /// reporting failure must never suppress the incident.
    pub(crate) fn fallback(project: ProjectId, reason: &str, error: &StorageError) -> Self {
        CrashReport::new(vec![format!(
            "Batcher for {} crashed.\nreason: {}\n(crash report construction failed: {})",
            project, reason, error
        )])
    }

    /// Sections in dispatch order: header first, waiting, then running.
    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    pub fn into_sections(self) -> Vec<String> {
        self.sections
    }

    /// The whole report as one text, for persistence.
    pub fn full_text(&self) -> String {
        self.sections.join("\n\n")
    }
}

/// Builds crash reports from storage data.
pub struct CrashReportBuilder<'a, S> {
    storage: &'a S,
    config: &'a RegistryConfig,
}

impl<'a, S: Storage> CrashReportBuilder<'a, S> {
    pub fn new(storage: &'a S, config: &'a RegistryConfig) -> Self {
        CrashReportBuilder { storage, config }
    }

    /// Composes the report for one abnormal termination.
    ///
    /// Read-only with respect to storage. Errors from the storage queries are
    /// returned to the caller, which substitutes a fallback report.
    pub async fn build(
        &self,
        project: ProjectId,
        worker: &WorkerHandle,
        reason: &str,
    ) -> Result<CrashReport, StorageError> {
        let record = self.storage.project(project).await?;
        let mut sections = vec![header_section(&record.name, worker, reason)];

        let waiting = self
            .storage
            .batches_for_project(project, BatchState::Waiting)
            .await?;
        if !waiting.is_empty() {
            sections.push(batch_section(
                &self.config.pr_base_url,
                &record.name,
                &waiting,
                BatchState::Waiting,
                "deleted",
            ));
        }

        let running = self
            .storage
            .batches_for_project(project, BatchState::Running)
            .await?;
        if !running.is_empty() {
            sections.push(batch_section(
                &self.config.pr_base_url,
                &record.name,
                &running,
                BatchState::Running,
                "canceled",
            ));
        }

        Ok(CrashReport::new(sections))
    }
}

/// Header: project display name, terminated worker (for operator
/// correlation), and the failure reason.
fn header_section(project_name: &str, worker: &WorkerHandle, reason: &str) -> String {
    format!(
        "Batcher for {} crashed.\nworker: {}\nreason: {}",
        project_name, worker, reason
    )
}

/// One section per batch group: an announcement line, then every batch with
/// its 1-indexed position and every contained PR as a link.
fn batch_section(
    base_url: &str,
    project_name: &str,
    batches: &[Batch],
    state: BatchState,
    action: &str,
) -> String {
    let total = batches.len();
    let mut section = format!("{} {} batch(es) will be {}:", total, state, action);

    for (index, batch) in batches.iter().enumerate() {
        let _ = write!(section, "\n({}/{}) {}", index + 1, total, batch.id);
        let pr_total = batch.prs.len();
        for (pr_index, pr) in batch.prs.iter().enumerate() {
            let _ = write!(
                section,
                "\n  ({}/{}) {}",
                pr_index + 1,
                pr_total,
                pr_link(base_url, project_name, *pr)
            );
        }
    }

    section
}

/// Renders a PR link from the configured base URL, the project name, and the
/// PR number: `<base>/<project>/pull/<number>`.
fn pr_link(base_url: &str, project_name: &str, pr: PrNumber) -> String {
    format!(
        "{}/{}/pull/{}",
        base_url.trim_end_matches('/'),
        project_name,
        pr.0
    )
}
