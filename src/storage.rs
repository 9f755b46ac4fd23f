//! Storage abstraction consumed by the registry.
//!
//! The database schema and query layer live elsewhere in the orchestrator;
//! the registry only needs the handful of operations below. The trait-based
//! design enables in-memory implementations for testing.
//!
//! The registry treats every call as independent: it does not retry storage
//! operations itself, and a failure during crash recovery aborts that
//! recovery invocation rather than being masked.

use std::future::Future;

use thiserror::Error;

use crate::types::{Batch, BatchId, BatchState, ProjectId, ProjectRecord};

/// Errors surfaced by a storage backend.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The referenced project does not exist.
    #[error("project {0} not found")]
    ProjectNotFound(ProjectId),

    /// Backend-specific failure (connection, constraint, ...).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Persistence operations the registry depends on.
///
/// Implementations provide their own consistency guarantees per call; the
/// registry never holds its directory lock across a storage call.
pub trait Storage: Send + Sync {
    /// All projects currently managed by the orchestrator.
    fn active_projects(&self) -> impl Future<Output = Result<Vec<ProjectId>, StorageError>> + Send;

    /// Looks up a single project.
    fn project(
        &self,
        project: ProjectId,
    ) -> impl Future<Output = Result<ProjectRecord, StorageError>> + Send;

    /// All of a project's batches in the given state, in queue order.
    fn batches_for_project(
        &self,
        project: ProjectId,
        state: BatchState,
    ) -> impl Future<Output = Result<Vec<Batch>, StorageError>> + Send;

    /// Deletes a batch outright. Used for batches that never started CI.
    fn delete_batch(&self, batch: BatchId)
    -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Transitions a batch to a new state.
    fn set_batch_state(
        &self,
        batch: BatchId,
        state: BatchState,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Persists an incident record for an abnormal worker termination.
    fn insert_crash(
        &self,
        project: ProjectId,
        component: &str,
        report: &str,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}
