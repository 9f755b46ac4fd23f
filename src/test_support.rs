//! Shared test doubles for registry and report tests.
//!
//! In-memory stand-ins for the external collaborators: storage, the
//! notification channel, and the worker supervisor. All of them record what
//! was asked of them so tests can assert on the side effects of recovery.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::notify::{Notifier, NotifyError};
use crate::storage::{Storage, StorageError};
use crate::supervisor::{ExitSignal, SpawnError, WorkerHandle, WorkerSupervisor};
use crate::types::{Batch, BatchId, BatchState, CrashRecord, ProjectId, ProjectRecord, WorkerId};

/// In-memory storage backend.
pub(crate) struct MemStorage {
    projects: Mutex<HashMap<ProjectId, ProjectRecord>>,
    batches: Mutex<Vec<Batch>>,
    crashes: Mutex<Vec<CrashRecord>>,
    fail_project_lookup: AtomicBool,
    fail_batch_mutations: AtomicBool,
}

impl MemStorage {
    pub fn new() -> Self {
        MemStorage {
            projects: Mutex::new(HashMap::new()),
            batches: Mutex::new(Vec::new()),
            crashes: Mutex::new(Vec::new()),
            fail_project_lookup: AtomicBool::new(false),
            fail_batch_mutations: AtomicBool::new(false),
        }
    }

    pub fn with_project(self, id: u64, name: &str) -> Self {
        self.projects
            .lock()
            .unwrap()
            .insert(ProjectId(id), ProjectRecord::new(id, name));
        self
    }

    pub fn add_batch(&self, batch: Batch) {
        self.batches.lock().unwrap().push(batch);
    }

    pub fn batches(&self) -> Vec<Batch> {
        self.batches.lock().unwrap().clone()
    }

    pub fn crashes(&self) -> Vec<CrashRecord> {
        self.crashes.lock().unwrap().clone()
    }

    /// Makes `project` lookups fail, simulating a backend outage during
    /// report construction.
    pub fn fail_project_lookups(&self) {
        self.fail_project_lookup.store(true, Ordering::SeqCst);
    }

    /// Makes batch deletes and state transitions fail.
    pub fn fail_batch_mutations(&self) {
        self.fail_batch_mutations.store(true, Ordering::SeqCst);
    }
}

impl Storage for MemStorage {
    async fn active_projects(&self) -> Result<Vec<ProjectId>, StorageError> {
        Ok(self.projects.lock().unwrap().keys().copied().collect())
    }

    async fn project(&self, project: ProjectId) -> Result<ProjectRecord, StorageError> {
        if self.fail_project_lookup.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(
                "simulated project lookup failure".to_string(),
            ));
        }
        self.projects
            .lock()
            .unwrap()
            .get(&project)
            .cloned()
            .ok_or(StorageError::ProjectNotFound(project))
    }

    async fn batches_for_project(
        &self,
        project: ProjectId,
        state: BatchState,
    ) -> Result<Vec<Batch>, StorageError> {
        Ok(self
            .batches
            .lock()
            .unwrap()
            .iter()
            .filter(|batch| batch.project == project && batch.state == state)
            .cloned()
            .collect())
    }

    async fn delete_batch(&self, batch: BatchId) -> Result<(), StorageError> {
        if self.fail_batch_mutations.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(
                "simulated batch mutation failure".to_string(),
            ));
        }
        self.batches.lock().unwrap().retain(|b| b.id != batch);
        Ok(())
    }

    async fn set_batch_state(&self, batch: BatchId, state: BatchState) -> Result<(), StorageError> {
        if self.fail_batch_mutations.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(
                "simulated batch mutation failure".to_string(),
            ));
        }
        for b in self.batches.lock().unwrap().iter_mut() {
            if b.id == batch {
                b.state = state;
            }
        }
        Ok(())
    }

    async fn insert_crash(
        &self,
        project: ProjectId,
        component: &str,
        report: &str,
    ) -> Result<(), StorageError> {
        self.crashes.lock().unwrap().push(CrashRecord {
            project,
            component: component.to_string(),
            report: report.to_string(),
        });
        Ok(())
    }
}

/// Notifier that records every delivered message in order.
pub(crate) struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        RecordingNotifier {
            messages: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn fail_sends(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, text: String) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError("simulated delivery failure".to_string()));
        }
        self.messages.lock().unwrap().push(text);
        Ok(())
    }
}

/// Supervisor that hands out fresh handles without running any worker.
///
/// The exit halves are retained so the handles stay un-terminated until a
/// test decides otherwise.
pub(crate) struct MockSupervisor {
    next_id: AtomicU64,
    started: Mutex<Vec<ProjectId>>,
    exits: Mutex<Vec<ExitSignal>>,
    last_id: Mutex<Option<WorkerId>>,
    fail: AtomicBool,
}

impl MockSupervisor {
    pub fn new() -> Self {
        MockSupervisor {
            next_id: AtomicU64::new(100),
            started: Mutex::new(Vec::new()),
            exits: Mutex::new(Vec::new()),
            last_id: Mutex::new(None),
            fail: AtomicBool::new(false),
        }
    }

    /// Projects `start` was called for, in call order.
    pub fn started(&self) -> Vec<ProjectId> {
        self.started.lock().unwrap().clone()
    }

    pub fn last_spawned_id(&self) -> Option<WorkerId> {
        *self.last_id.lock().unwrap()
    }

    pub fn fail_spawns(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl WorkerSupervisor for MockSupervisor {
    async fn start(&self, project: ProjectId) -> Result<WorkerHandle, SpawnError> {
        self.started.lock().unwrap().push(project);
        if self.fail.load(Ordering::SeqCst) {
            return Err(SpawnError::new(project, "simulated spawn failure"));
        }
        let id = WorkerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (handle, exit) = WorkerHandle::new(id);
        self.exits.lock().unwrap().push(exit);
        *self.last_id.lock().unwrap() = Some(id);
        Ok(handle)
    }
}

/// Polls an async condition until it holds, panicking after ~1s.
///
/// Detached work (watcher tasks, notifier dispatch) has no completion handle
/// to await, so tests converge on its observable effects instead.
pub(crate) async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 1s");
}
