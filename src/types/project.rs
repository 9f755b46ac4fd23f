//! Project and crash-record types.

use serde::{Deserialize, Serialize};

use super::ids::ProjectId;

/// A project as stored by the orchestrator.
///
/// Only the fields the registry needs: the display name feeds crash reports
/// and PR links. The rest of the project row (permissions, CI settings, ...)
/// belongs to other parts of the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: ProjectId,

    /// Human-facing name, e.g. `acme/widgets`.
    pub name: String,
}

impl ProjectRecord {
    pub fn new(id: impl Into<ProjectId>, name: impl Into<String>) -> Self {
        ProjectRecord {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Persisted incident log entry for a worker's abnormal termination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashRecord {
    /// The project whose worker crashed.
    pub project: ProjectId,

    /// Which subsystem crashed. The registry always writes `"batcher"`.
    pub component: String,

    /// Full human-readable crash report text.
    pub report: String,
}
